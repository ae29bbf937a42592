use std::path::Path;

use anyhow::{anyhow, Context, Result};
use image::RgbaImage;
use serde::Serialize;
use tiny_skia::{Color, FilterQuality, Paint, Pattern, Pixmap, Rect, SpreadMode, Transform};

use crate::geometry::DrawRect;
use crate::surface::{Surface, SurfaceOrigin};

/// Straight RGBA, one byte per channel.
pub type Rgba8 = [u8; 4];

/// Something a strategy can blit surfaces onto: the window canvas, an offscreen
/// atlas, or a recorder in tests.
pub trait RenderTarget {
    fn size(&self) -> (u32, u32);

    fn resize(&mut self, width: u32, height: u32) -> Result<()>;

    fn clear(&mut self, color: Rgba8);

    /// Draws all of `source` scaled into `dst`.
    fn blit(&mut self, source: &Surface, dst: DrawRect);
}

/// Software canvas backed by a tiny-skia pixmap.
pub struct PixmapTarget {
    pixmap: Pixmap,
}

impl PixmapTarget {
    pub fn new(width: u32, height: u32) -> Result<Self> {
        Ok(Self {
            pixmap: allocate(width, height)?,
        })
    }

    pub fn pixmap(&self) -> &Pixmap {
        &self.pixmap
    }

    pub fn into_surface(self, origin: SurfaceOrigin) -> Surface {
        Surface::from_pixmap(self.pixmap, origin)
    }

    /// Current contents as straight RGBA rows.
    pub fn rgba_frame(&self) -> Vec<u8> {
        let mut frame = Vec::with_capacity(self.pixmap.data().len());
        for pixel in self.pixmap.pixels() {
            let color = pixel.demultiply();
            frame.extend_from_slice(&[color.red(), color.green(), color.blue(), color.alpha()]);
        }
        frame
    }

    pub fn save_png(&self, path: &Path) -> Result<()> {
        let (width, height) = self.size();
        let image = RgbaImage::from_raw(width, height, self.rgba_frame())
            .ok_or_else(|| anyhow!("frame buffer does not match canvas size"))?;
        image
            .save(path)
            .with_context(|| format!("failed writing frame to {}", path.display()))
    }
}

impl RenderTarget for PixmapTarget {
    fn size(&self) -> (u32, u32) {
        (self.pixmap.width(), self.pixmap.height())
    }

    fn resize(&mut self, width: u32, height: u32) -> Result<()> {
        if self.size() != (width, height) {
            self.pixmap = allocate(width, height)?;
        }
        Ok(())
    }

    fn clear(&mut self, color: Rgba8) {
        let [r, g, b, a] = color;
        self.pixmap.fill(Color::from_rgba8(r, g, b, a));
    }

    fn blit(&mut self, source: &Surface, dst: DrawRect) {
        if dst.is_empty() {
            return;
        }
        let Some(rect) = Rect::from_xywh(
            dst.x as f32,
            dst.y as f32,
            dst.width as f32,
            dst.height as f32,
        ) else {
            return;
        };

        let scale_x = dst.width as f32 / source.width() as f32;
        let scale_y = dst.height as f32 / source.height() as f32;
        let paint = Paint {
            shader: Pattern::new(
                source.pixmap().as_ref(),
                SpreadMode::Pad,
                FilterQuality::Nearest,
                1.0,
                Transform::from_row(scale_x, 0.0, 0.0, scale_y, dst.x as f32, dst.y as f32),
            ),
            anti_alias: false,
            ..Paint::default()
        };
        self.pixmap.fill_rect(rect, &paint, Transform::identity(), None);
    }
}

fn allocate(width: u32, height: u32) -> Result<Pixmap> {
    Pixmap::new(width, height)
        .ok_or_else(|| anyhow!("failed to allocate {}x{} canvas", width, height))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DrawCall {
    pub source_size: (u32, u32),
    pub source_origin: SurfaceOrigin,
    pub dst: DrawRect,
}

/// Records draw calls instead of rasterizing them.
#[derive(Debug, Clone, Default)]
pub struct RecordingTarget {
    width: u32,
    height: u32,
    calls: Vec<DrawCall>,
    clears: u32,
}

impl RecordingTarget {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            ..Self::default()
        }
    }

    pub fn calls(&self) -> &[DrawCall] {
        &self.calls
    }

    pub fn take_calls(&mut self) -> Vec<DrawCall> {
        std::mem::take(&mut self.calls)
    }

    pub fn clear_count(&self) -> u32 {
        self.clears
    }
}

impl RenderTarget for RecordingTarget {
    fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn resize(&mut self, width: u32, height: u32) -> Result<()> {
        self.width = width;
        self.height = height;
        Ok(())
    }

    fn clear(&mut self, _color: Rgba8) {
        self.clears += 1;
    }

    fn blit(&mut self, source: &Surface, dst: DrawRect) {
        self.calls.push(DrawCall {
            source_size: source.size(),
            source_origin: source.origin(),
            dst,
        });
    }
}
