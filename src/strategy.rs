//! The three ways of putting a tiled background on the canvas.
//!
//! * [`StretchedSingleDraw`]: one tile scaled to the whole canvas.
//! * [`GridRepeat`]: one draw per cell of a fixed rows x columns grid.
//! * [`PrebakedAtlas`]: tiles baked once into a canvas-sized atlas, then one blit per frame.

use std::time::Duration;

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::error_codes::CodedError;
use crate::geometry::TileGeometry;
use crate::render_target::{PixmapTarget, RenderTarget};
use crate::surface::{Surface, SurfaceOrigin};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StrategyKind {
    Stretched,
    Grid,
    Atlas,
}

impl StrategyKind {
    pub const ALL: [StrategyKind; 3] = [Self::Stretched, Self::Grid, Self::Atlas];

    pub fn from_keyword(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "stretched" | "a" => Ok(Self::Stretched),
            "grid" | "b" => Ok(Self::Grid),
            "atlas" | "c" => Ok(Self::Atlas),
            _ => Err(anyhow!(CodedError::usage(
                "INVALID_STRATEGY",
                format!("invalid strategy '{value}'"),
            )
            .with_details(json!({
                "provided": value,
                "allowed": ["stretched", "grid", "atlas"]
            })))),
        }
    }

    pub fn keyword(self) -> &'static str {
        match self {
            Self::Stretched => "stretched",
            Self::Grid => "grid",
            Self::Atlas => "atlas",
        }
    }
}

/// Logical grid drawn by [`GridRepeat`]. It is fixed, not derived from the
/// canvas: a canvas larger than `columns x rows` tiles is left partly bare and
/// a smaller one is overdrawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GridDims {
    pub rows: u32,
    pub columns: u32,
}

impl GridDims {
    pub fn cells(&self) -> u32 {
        self.rows.saturating_mul(self.columns)
    }
}

impl Default for GridDims {
    fn default() -> Self {
        DEFAULT_GRID
    }
}

pub const DEFAULT_GRID: GridDims = GridDims {
    rows: 7,
    columns: 14,
};

pub trait TileRenderStrategy {
    fn kind(&self) -> StrategyKind;

    /// Draws one frame of background and returns the number of draw calls issued.
    ///
    /// `delta` is the time since the previous frame. No strategy uses it yet.
    fn draw(
        &mut self,
        target: &mut dyn RenderTarget,
        geometry: &TileGeometry,
        delta: Duration,
    ) -> u32;
}

pub struct StretchedSingleDraw {
    tile: Surface,
}

impl StretchedSingleDraw {
    pub fn new(tile: Surface) -> Self {
        Self { tile }
    }
}

impl TileRenderStrategy for StretchedSingleDraw {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Stretched
    }

    fn draw(
        &mut self,
        target: &mut dyn RenderTarget,
        geometry: &TileGeometry,
        _delta: Duration,
    ) -> u32 {
        target.blit(&self.tile, geometry.canvas_rect());
        1
    }
}

pub struct GridRepeat {
    tile: Surface,
    grid: GridDims,
}

impl GridRepeat {
    pub fn new(tile: Surface, grid: GridDims) -> Self {
        Self { tile, grid }
    }
}

impl TileRenderStrategy for GridRepeat {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Grid
    }

    fn draw(
        &mut self,
        target: &mut dyn RenderTarget,
        geometry: &TileGeometry,
        _delta: Duration,
    ) -> u32 {
        let (mut x, mut y) = (0_i32, 0_i32);
        for _ in 0..self.grid.rows {
            for _ in 0..self.grid.columns {
                target.blit(&self.tile, geometry.tile_rect_at(x, y));
                x = x.saturating_add_unsigned(geometry.tile_width());
            }
            y = y.saturating_add_unsigned(geometry.tile_height());
            x = 0;
        }
        self.grid.cells()
    }
}

pub struct PrebakedAtlas {
    atlas: Surface,
    bake_draws: u32,
}

impl PrebakedAtlas {
    /// Bakes `tile` into a canvas-sized atlas and releases the tile.
    ///
    /// Only whole tiles are baked: when the canvas is not an exact multiple of
    /// the tile, the right and bottom remainder stays transparent.
    pub fn bake(tile: Surface, geometry: &TileGeometry) -> Result<Self> {
        if !geometry.is_exact_multiple() {
            eprintln!(
                "[TILEBENCH] atlas: canvas {}x{} is not a multiple of tile {}x{}; edge remainder left blank",
                geometry.canvas_width(),
                geometry.canvas_height(),
                geometry.tile_width(),
                geometry.tile_height()
            );
        }

        let mut offscreen = PixmapTarget::new(geometry.canvas_width(), geometry.canvas_height())?;
        let bake_draws = prebake_pass(&tile, geometry, &mut offscreen);
        drop(tile);

        Ok(Self {
            atlas: offscreen.into_surface(SurfaceOrigin::Offscreen),
            bake_draws,
        })
    }

    pub fn atlas(&self) -> &Surface {
        &self.atlas
    }

    pub fn bake_draws(&self) -> u32 {
        self.bake_draws
    }
}

impl TileRenderStrategy for PrebakedAtlas {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Atlas
    }

    fn draw(
        &mut self,
        target: &mut dyn RenderTarget,
        geometry: &TileGeometry,
        _delta: Duration,
    ) -> u32 {
        target.blit(&self.atlas, geometry.canvas_rect());
        1
    }
}

/// Fills `target` with whole tiles, column by column, top to bottom within each column.
/// Returns the number of tiles drawn.
pub fn prebake_pass(
    tile: &Surface,
    geometry: &TileGeometry,
    target: &mut dyn RenderTarget,
) -> u32 {
    let mut draws = 0;
    let mut x = 0_i32;
    for _ in 0..geometry.whole_columns() {
        let mut y = 0_i32;
        for _ in 0..geometry.whole_rows() {
            target.blit(tile, geometry.tile_rect_at(x, y));
            y = y.saturating_add_unsigned(geometry.tile_height());
            draws += 1;
        }
        x = x.saturating_add_unsigned(geometry.tile_width());
    }
    draws
}

/// Builds the strategy for a run. The atlas variant bakes here, outside any timed frame.
pub fn build_strategy(
    kind: StrategyKind,
    tile: Surface,
    geometry: &TileGeometry,
    grid: GridDims,
) -> Result<Box<dyn TileRenderStrategy>> {
    let strategy: Box<dyn TileRenderStrategy> = match kind {
        StrategyKind::Stretched => Box::new(StretchedSingleDraw::new(tile)),
        StrategyKind::Grid => Box::new(GridRepeat::new(tile, grid)),
        StrategyKind::Atlas => Box::new(PrebakedAtlas::bake(tile, geometry)?),
    };
    Ok(strategy)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::decoding::PixelBuffer;
    use crate::error_codes::find_coded_error;
    use crate::geometry::DrawRect;
    use crate::render_target::RecordingTarget;
    use crate::surface::SurfaceBuilder;

    fn patterned_tile(width: u32, height: u32) -> Surface {
        let mut packed = Vec::with_capacity((width * height * 3) as usize);
        for y in 0..height {
            for x in 0..width {
                packed.extend_from_slice(&[(x * 5) as u8, (y * 5) as u8, 200]);
            }
        }
        SurfaceBuilder::native()
            .try_build(&PixelBuffer::from_packed(width, height, 3, &packed))
            .expect("tile should build")
    }

    fn draw_once(strategy: &mut dyn TileRenderStrategy, geometry: &TileGeometry) -> Vec<DrawRect> {
        let (width, height) = geometry.canvas_size();
        let mut target = RecordingTarget::new(width, height);
        let reported = strategy.draw(&mut target, geometry, Duration::ZERO);
        let calls = target.take_calls();
        assert_eq!(reported as usize, calls.len());
        calls.into_iter().map(|call| call.dst).collect()
    }

    #[test]
    fn stretched_covers_canvas_with_one_draw() {
        let geometry = TileGeometry::new((50, 50), (500, 300));
        let mut strategy = StretchedSingleDraw::new(patterned_tile(50, 50));
        assert_eq!(
            draw_once(&mut strategy, &geometry),
            vec![DrawRect::at_origin(500, 300)]
        );
    }

    #[test]
    fn grid_draw_count_ignores_canvas_size() {
        let mut strategy = GridRepeat::new(patterned_tile(50, 50), DEFAULT_GRID);
        for canvas in [(100, 100), (500, 500), (1920, 1080)] {
            let geometry = TileGeometry::new((50, 50), canvas);
            assert_eq!(draw_once(&mut strategy, &geometry).len(), 98, "{canvas:?}");
        }
    }

    #[test]
    fn grid_walks_rows_left_to_right_and_resets_each_row() {
        let geometry = TileGeometry::new((10, 20), (500, 500));
        let grid = GridDims {
            rows: 2,
            columns: 3,
        };
        let mut strategy = GridRepeat::new(patterned_tile(10, 20), grid);
        let rects = draw_once(&mut strategy, &geometry);
        let origins = rects.iter().map(|rect| (rect.x, rect.y)).collect::<Vec<_>>();
        assert_eq!(
            origins,
            vec![(0, 0), (10, 0), (20, 0), (0, 20), (10, 20), (20, 20)]
        );
        assert!(rects.iter().all(|rect| (rect.width, rect.height) == (10, 20)));
    }

    #[test]
    fn prebake_covers_exact_multiple_canvas_once_per_cell() {
        let geometry = TileGeometry::new((50, 50), (500, 500));
        let tile = patterned_tile(50, 50);
        let mut target = RecordingTarget::new(500, 500);

        let draws = prebake_pass(&tile, &geometry, &mut target);
        assert_eq!(draws, 100);

        let mut hits: HashMap<(i32, i32), u32> = HashMap::new();
        for call in target.calls() {
            assert_eq!((call.dst.width, call.dst.height), (50, 50));
            assert_eq!(call.dst.x % 50, 0);
            assert_eq!(call.dst.y % 50, 0);
            *hits.entry((call.dst.x / 50, call.dst.y / 50)).or_default() += 1;
        }
        for column in 0..10 {
            for row in 0..10 {
                assert_eq!(hits.get(&(column, row)), Some(&1), "cell ({column}, {row})");
            }
        }
    }

    #[test]
    fn prebake_is_column_major() {
        let geometry = TileGeometry::new((50, 50), (100, 150));
        let mut target = RecordingTarget::new(100, 150);
        prebake_pass(&patterned_tile(50, 50), &geometry, &mut target);
        let origins = target
            .calls()
            .iter()
            .map(|call| (call.dst.x, call.dst.y))
            .collect::<Vec<_>>();
        assert_eq!(
            origins,
            vec![(0, 0), (0, 50), (0, 100), (50, 0), (50, 50), (50, 100)]
        );
    }

    #[test]
    fn prebake_leaves_partial_edge_uncovered() {
        let geometry = TileGeometry::new((50, 50), (520, 510));
        let mut target = RecordingTarget::new(520, 510);
        let draws = prebake_pass(&patterned_tile(50, 50), &geometry, &mut target);
        assert_eq!(draws, 100);
        let right_edge = target
            .calls()
            .iter()
            .map(|call| call.dst.x + call.dst.width as i32)
            .max();
        assert_eq!(right_edge, Some(500));
    }

    #[test]
    fn atlas_bakes_canvas_sized_surface_and_blits_it_once() {
        let geometry = TileGeometry::new((50, 50), (500, 500));
        let mut atlas =
            PrebakedAtlas::bake(patterned_tile(50, 50), &geometry).expect("atlas should bake");
        assert_eq!(atlas.atlas().size(), (500, 500));
        assert_eq!(atlas.atlas().origin(), SurfaceOrigin::Offscreen);
        assert_eq!(atlas.bake_draws(), 100);

        let mut target = RecordingTarget::new(500, 500);
        assert_eq!(atlas.draw(&mut target, &geometry, Duration::ZERO), 1);
        assert_eq!(target.calls()[0].source_size, (500, 500));
        assert_eq!(target.calls()[0].dst, DrawRect::at_origin(500, 500));
    }

    #[test]
    fn atlas_and_grid_render_identical_pixels_when_grid_fits_canvas() {
        let geometry = TileGeometry::new((10, 10), (140, 70));
        let tile = patterned_tile(10, 10);

        let mut grid = GridRepeat::new(tile.clone(), DEFAULT_GRID);
        let mut grid_target = PixmapTarget::new(140, 70).expect("canvas should allocate");
        grid.draw(&mut grid_target, &geometry, Duration::ZERO);

        let mut atlas = PrebakedAtlas::bake(tile, &geometry).expect("atlas should bake");
        let mut atlas_target = PixmapTarget::new(140, 70).expect("canvas should allocate");
        atlas.draw(&mut atlas_target, &geometry, Duration::ZERO);

        assert_eq!(grid_target.rgba_frame(), atlas_target.rgba_frame());
        assert_eq!(atlas.atlas().pixel(13, 7), Some([15, 35, 200, 255]));
    }

    #[test]
    fn resized_geometry_is_used_by_the_next_draw() {
        let mut geometry = TileGeometry::new((50, 50), (500, 500));
        let mut stretched = StretchedSingleDraw::new(patterned_tile(50, 50));
        let mut atlas =
            PrebakedAtlas::bake(patterned_tile(50, 50), &geometry).expect("atlas should bake");

        geometry.resize_canvas(800, 600);
        assert_eq!(
            draw_once(&mut stretched, &geometry),
            vec![DrawRect::at_origin(800, 600)]
        );
        assert_eq!(
            draw_once(&mut atlas, &geometry),
            vec![DrawRect::at_origin(800, 600)]
        );
    }

    #[test]
    fn build_strategy_selects_each_kind() {
        let geometry = TileGeometry::new((50, 50), (500, 500));
        for kind in StrategyKind::ALL {
            let strategy = build_strategy(kind, patterned_tile(50, 50), &geometry, DEFAULT_GRID)
                .expect("strategy should build");
            assert_eq!(strategy.kind(), kind);
        }
    }

    #[test]
    fn strategy_keywords_parse_and_reject_unknowns() {
        assert_eq!(StrategyKind::from_keyword(" Grid ").unwrap(), StrategyKind::Grid);
        assert_eq!(StrategyKind::from_keyword("c").unwrap(), StrategyKind::Atlas);

        let error = StrategyKind::from_keyword("mosaic").expect_err("unknown keyword");
        let coded = find_coded_error(&error).expect("error should be coded");
        assert_eq!(coded.code, "INVALID_STRATEGY");
    }
}
