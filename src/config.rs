use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::error_codes::CodedError;
use crate::render_target::Rgba8;
use crate::strategy::{GridDims, StrategyKind};

pub const DEFAULT_IMAGE: &str = "background.png";
pub const DEFAULT_CANVAS: CanvasSize = CanvasSize {
    width: 500,
    height: 500,
};
pub const DEFAULT_FRAMES: u32 = 600;
pub const DEFAULT_CLEAR_COLOR: Rgba8 = [35, 35, 35, 255];
pub const DEFAULT_PROGRESS_EVERY: u32 = 120;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CanvasSize {
    pub width: u32,
    pub height: u32,
}

impl CanvasSize {
    pub fn as_tuple(self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn validate(self) -> Result<()> {
        if self.width == 0 || self.height == 0 {
            return Err(invalid(
                "canvas",
                format!(
                    "canvas must be positive, got {}x{}",
                    self.width, self.height
                ),
            ));
        }
        Ok(())
    }
}

/// Canvas resize injected before the draw of frame `at_frame`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScheduledResize {
    pub at_frame: u32,
    pub width: u32,
    pub height: u32,
}

/// A fully resolved benchmark session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BenchConfig {
    pub image: PathBuf,
    pub strategy: StrategyKind,
    pub canvas: CanvasSize,
    pub frames: u32,
    pub grid: GridDims,
    pub clear_color: Rgba8,
    pub progress_every: u32,
    pub resizes: Vec<ScheduledResize>,
    pub quit_at_frame: Option<u32>,
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            image: PathBuf::from(DEFAULT_IMAGE),
            strategy: StrategyKind::Stretched,
            canvas: DEFAULT_CANVAS,
            frames: DEFAULT_FRAMES,
            grid: GridDims::default(),
            clear_color: DEFAULT_CLEAR_COLOR,
            progress_every: DEFAULT_PROGRESS_EVERY,
            resizes: Vec::new(),
            quit_at_frame: None,
        }
    }
}

/// On-disk bench file. Every field is optional and falls back to the defaults.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct BenchFile {
    image: Option<PathBuf>,
    strategy: Option<String>,
    canvas: Option<CanvasSize>,
    frames: Option<u32>,
    grid: Option<GridDims>,
    clear_color: Option<Rgba8>,
    progress_every: Option<u32>,
    #[serde(default)]
    resizes: Vec<ScheduledResize>,
    quit_at_frame: Option<u32>,
}

/// Values given on the command line; they win over the bench file.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub image: Option<PathBuf>,
    pub strategy: Option<StrategyKind>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub frames: Option<u32>,
    pub grid_rows: Option<u32>,
    pub grid_columns: Option<u32>,
}

impl BenchConfig {
    pub fn apply(&mut self, overrides: &ConfigOverrides) {
        if let Some(image) = &overrides.image {
            self.image = image.clone();
        }
        if let Some(strategy) = overrides.strategy {
            self.strategy = strategy;
        }
        if let Some(width) = overrides.width {
            self.canvas.width = width;
        }
        if let Some(height) = overrides.height {
            self.canvas.height = height;
        }
        if let Some(frames) = overrides.frames {
            self.frames = frames;
        }
        if let Some(rows) = overrides.grid_rows {
            self.grid.rows = rows;
        }
        if let Some(columns) = overrides.grid_columns {
            self.grid.columns = columns;
        }
    }

    pub fn validate(&self) -> Result<()> {
        self.canvas.validate()?;
        if self.grid.rows == 0 || self.grid.columns == 0 {
            return Err(invalid(
                "grid",
                format!(
                    "grid must have at least one row and column, got {}x{}",
                    self.grid.rows, self.grid.columns
                ),
            ));
        }
        for resize in &self.resizes {
            if resize.width == 0 || resize.height == 0 {
                return Err(invalid(
                    "resizes",
                    format!(
                        "resize at frame {} must be positive, got {}x{}",
                        resize.at_frame, resize.width, resize.height
                    ),
                ));
            }
        }
        Ok(())
    }
}

fn invalid(field: &str, message: String) -> anyhow::Error {
    anyhow!(CodedError::config("INVALID_CONFIG", message).with_details(json!({ "field": field })))
}

pub fn load_bench_file(path: &Path) -> Result<BenchConfig> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("failed to read bench file {}", path.display()))?;
    let file: BenchFile = serde_yaml::from_str(&contents).map_err(|error| {
        let (line, column) = error
            .location()
            .map_or((None, None), |location| (Some(location.line()), Some(location.column())));
        let location = match (line, column) {
            (Some(line), Some(column)) => format!("line {line}, column {column}"),
            _ => "unknown location".to_owned(),
        };
        anyhow!(CodedError::config(
            "INVALID_CONFIG",
            format!(
                "failed to parse yaml in {} at {}: {}",
                path.display(),
                location,
                error
            ),
        )
        .with_details(json!({
            "path": path.display().to_string(),
            "line": line,
            "column": column,
        })))
    })?;
    let strategy = file
        .strategy
        .as_deref()
        .map(StrategyKind::from_keyword)
        .transpose()
        .with_context(|| format!("invalid strategy in {}", path.display()))?;

    let base_dir = path
        .parent()
        .map_or_else(|| PathBuf::from("."), Path::to_path_buf);
    let defaults = BenchConfig::default();
    let mut resizes = file.resizes;
    resizes.sort_by_key(|resize| resize.at_frame);

    Ok(BenchConfig {
        image: file
            .image
            .map(|image| resolve_relative(&base_dir, &image))
            .unwrap_or(defaults.image),
        strategy: strategy.unwrap_or(defaults.strategy),
        canvas: file.canvas.unwrap_or(defaults.canvas),
        frames: file.frames.unwrap_or(defaults.frames),
        grid: file.grid.unwrap_or(defaults.grid),
        clear_color: file.clear_color.unwrap_or(defaults.clear_color),
        progress_every: file.progress_every.unwrap_or(defaults.progress_every),
        resizes,
        quit_at_frame: file.quit_at_frame,
    })
}

/// Bench file (if any), then command-line overrides, then validation.
pub fn resolve_config(file: Option<&Path>, overrides: &ConfigOverrides) -> Result<BenchConfig> {
    let mut config = match file {
        Some(path) => load_bench_file(path)?,
        None => BenchConfig::default(),
    };
    config.apply(overrides);
    config.validate()?;
    Ok(config)
}

fn resolve_relative(base_dir: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base_dir.join(path)
    }
}
