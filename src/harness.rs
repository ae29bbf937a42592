//! Headless frame loop: one strategy, one canvas, one timer per session.

use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use chrono::Utc;
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::config::{BenchConfig, ScheduledResize};
use crate::geometry::TileGeometry;
use crate::render_target::{PixmapTarget, RecordingTarget, RenderTarget, Rgba8};
use crate::strategy::{build_strategy, prebake_pass, GridDims, StrategyKind, TileRenderStrategy};
use crate::surface::{load_surface, Surface};
use crate::timing::{FrameStats, FrameTimer};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HarnessEvent {
    Resize { width: u32, height: u32 },
    Quit,
}

/// Where window events come from. Polled once per frame, before drawing.
pub trait EventSource {
    fn poll(&mut self, frame_index: u32) -> Vec<HarnessEvent>;
}

/// Replays resizes and a quit at fixed frame indices.
#[derive(Debug, Clone, Default)]
pub struct ScriptedEvents {
    resizes: Vec<ScheduledResize>,
    quit_at_frame: Option<u32>,
}

impl ScriptedEvents {
    pub fn new(resizes: Vec<ScheduledResize>, quit_at_frame: Option<u32>) -> Self {
        Self {
            resizes,
            quit_at_frame,
        }
    }

    pub fn from_config(config: &BenchConfig) -> Self {
        Self::new(config.resizes.clone(), config.quit_at_frame)
    }
}

impl EventSource for ScriptedEvents {
    fn poll(&mut self, frame_index: u32) -> Vec<HarnessEvent> {
        let mut events = self
            .resizes
            .iter()
            .filter(|resize| resize.at_frame == frame_index)
            .map(|resize| HarnessEvent::Resize {
                width: resize.width,
                height: resize.height,
            })
            .collect::<Vec<_>>();
        if self.quit_at_frame == Some(frame_index) {
            events.push(HarnessEvent::Quit);
        }
        events
    }
}

/// Everything one session renders with. Replaces the window, texture and
/// geometry globals of a classic render loop.
pub struct RenderContext<T: RenderTarget> {
    target: T,
    geometry: TileGeometry,
    min_canvas: (u32, u32),
    strategy: Box<dyn TileRenderStrategy>,
    timer: FrameTimer,
    clear_color: Rgba8,
    tile_size: (u32, u32),
    tile_is_placeholder: bool,
    prepare_micros: u64,
    last_draw_calls: Option<u32>,
}

impl<T: RenderTarget> RenderContext<T> {
    /// Builds the strategy against the target's current size. The canvas can
    /// not be resized below this initial size.
    pub fn new(
        target: T,
        tile: Surface,
        kind: StrategyKind,
        grid: GridDims,
        clear_color: Rgba8,
    ) -> Result<Self> {
        let tile_size = tile.size();
        let tile_is_placeholder = tile.is_placeholder();
        let geometry = TileGeometry::new(tile_size, target.size());

        let start = Instant::now();
        let strategy = build_strategy(kind, tile, &geometry, grid)
            .with_context(|| format!("failed to prepare {} strategy", kind.keyword()))?;
        let prepare_micros = u64::try_from(start.elapsed().as_micros()).unwrap_or(u64::MAX);

        Ok(Self {
            min_canvas: target.size(),
            target,
            geometry,
            strategy,
            timer: FrameTimer::new(),
            clear_color,
            tile_size,
            tile_is_placeholder,
            prepare_micros,
            last_draw_calls: None,
        })
    }

    pub fn target(&self) -> &T {
        &self.target
    }

    pub fn geometry(&self) -> &TileGeometry {
        &self.geometry
    }

    pub fn timer(&self) -> &FrameTimer {
        &self.timer
    }

    pub fn kind(&self) -> StrategyKind {
        self.strategy.kind()
    }

    pub fn last_draw_calls(&self) -> Option<u32> {
        self.last_draw_calls
    }

    /// Applies a resize to both the target and the geometry, clamped to the initial size.
    pub fn resize(&mut self, width: u32, height: u32) -> Result<()> {
        let width = width.max(self.min_canvas.0);
        let height = height.max(self.min_canvas.1);
        self.target.resize(width, height)?;
        self.geometry.resize_canvas(width, height);
        Ok(())
    }

    /// Clears, then draws one timed frame. Returns the draw cost in microseconds.
    pub fn frame(&mut self, delta: Duration) -> u64 {
        self.target.clear(self.clear_color);

        let Self {
            target,
            geometry,
            strategy,
            timer,
            ..
        } = self;
        let (micros, draw_calls) = timer.sample(|| strategy.draw(target, geometry, delta));
        self.last_draw_calls = Some(draw_calls);
        micros
    }

    /// Runs up to `frames` frames. Events are applied at the start of each frame;
    /// a quit lets the current frame finish and stops before the next one.
    pub fn run(
        &mut self,
        events: &mut dyn EventSource,
        frames: u32,
        progress_every: u32,
    ) -> Result<u32> {
        let mut running = true;
        let mut drawn = 0;
        let mut last_tick = Instant::now();

        for frame_index in 0..frames {
            if !running {
                break;
            }

            for event in events.poll(frame_index) {
                match event {
                    HarnessEvent::Resize { width, height } => {
                        self.resize(width, height)?;
                        let (width, height) = self.geometry.canvas_size();
                        eprintln!(
                            "[TILEBENCH] resize: canvas {width}x{height} at frame {frame_index}"
                        );
                    }
                    HarnessEvent::Quit => running = false,
                }
            }

            let now = Instant::now();
            let delta = now.duration_since(last_tick);
            last_tick = now;

            let micros = self.frame(delta);
            drawn += 1;

            if progress_every > 0 && drawn % progress_every == 0 {
                eprintln!(
                    "[TILEBENCH] {}: frame {}/{} ({} us)",
                    self.kind().keyword(),
                    drawn,
                    frames,
                    micros
                );
            }
        }

        Ok(drawn)
    }

    pub fn stats(&self) -> FrameStats {
        self.timer.stats()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BenchReport {
    pub ok: bool,
    pub strategy: StrategyKind,
    pub image: String,
    pub placeholder: bool,
    pub tile: (u32, u32),
    pub canvas: (u32, u32),
    pub prepare_micros: u64,
    pub draw_calls_per_frame: Option<u32>,
    pub frames: FrameStats,
    pub frame_sha256: Option<String>,
    pub started_at: String,
    pub build: Option<&'static str>,
}

impl BenchReport {
    pub fn average_label(&self) -> String {
        match self.frames.average_micros {
            Some(average) => format!("{average} us"),
            None => "no data".to_owned(),
        }
    }

    pub fn summary_line(&self) -> String {
        format!(
            "{}: average {} over {} frame(s)",
            self.strategy.keyword(),
            self.average_label(),
            self.frames.samples
        )
    }
}

/// One full session on the software canvas. Returns the report and the final canvas.
pub fn run_bench(config: &BenchConfig, quiet: bool) -> Result<(BenchReport, PixmapTarget)> {
    let started_at = Utc::now().to_rfc3339();
    let tile = load_surface(&config.image);
    let target = PixmapTarget::new(config.canvas.width, config.canvas.height)
        .context("failed to create canvas")?;

    let mut context = RenderContext::new(
        target,
        tile,
        config.strategy,
        config.grid,
        config.clear_color,
    )?;
    let mut events = ScriptedEvents::from_config(config);
    let progress_every = if quiet { 0 } else { config.progress_every };
    context.run(&mut events, config.frames, progress_every)?;

    let stats = context.stats();
    let frame_sha256 = (stats.samples > 0).then(|| sha256_hex(context.target().pixmap().data()));
    let report = BenchReport {
        ok: true,
        strategy: context.kind(),
        image: config.image.display().to_string(),
        placeholder: context.tile_is_placeholder,
        tile: context.tile_size,
        canvas: context.geometry().canvas_size(),
        prepare_micros: context.prepare_micros,
        draw_calls_per_frame: context.last_draw_calls(),
        frames: stats,
        frame_sha256,
        started_at,
        build: option_env!("TILEBENCH_GIT_HASH"),
    };

    Ok((report, context.target))
}

/// Runs every strategy over the same configuration, one after another.
pub fn run_compare(config: &BenchConfig, quiet: bool) -> Result<Vec<BenchReport>> {
    StrategyKind::ALL
        .iter()
        .map(|kind| {
            let mut session = config.clone();
            session.strategy = *kind;
            run_bench(&session, quiet).map(|(report, _)| report)
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DrawPlan {
    pub strategy: StrategyKind,
    pub prepare_draws: u32,
    pub frame_draws: u32,
}

/// Draw calls each strategy issues for `tile` on a canvas, without rasterizing the frame.
pub fn plan_draws(tile: &Surface, canvas: (u32, u32), grid: GridDims) -> Result<Vec<DrawPlan>> {
    let geometry = TileGeometry::new(tile.size(), canvas);
    let mut plans = Vec::with_capacity(StrategyKind::ALL.len());
    for kind in StrategyKind::ALL {
        let prepare_draws = match kind {
            StrategyKind::Atlas => {
                prebake_pass(tile, &geometry, &mut RecordingTarget::new(canvas.0, canvas.1))
            }
            StrategyKind::Stretched | StrategyKind::Grid => 0,
        };
        let target = RecordingTarget::new(canvas.0, canvas.1);
        let mut context = RenderContext::new(target, tile.clone(), kind, grid, [0; 4])?;
        context.frame(Duration::ZERO);
        plans.push(DrawPlan {
            strategy: kind,
            prepare_draws,
            frame_draws: context.last_draw_calls().unwrap_or(0),
        });
    }
    Ok(plans)
}

fn sha256_hex(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    let mut out = String::with_capacity(digest.len() * 2);
    for byte in digest {
        out.push_str(&format!("{byte:02x}"));
    }
    out
}
