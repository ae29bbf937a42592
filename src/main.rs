use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use serde_json::json;

use tilebench::config::{resolve_config, CanvasSize, ConfigOverrides, DEFAULT_CANVAS};
use tilebench::decoding::decode;
use tilebench::error_codes::{envelope_for, exit_code_for};
use tilebench::harness::{plan_draws, run_bench, run_compare};
use tilebench::pixel_format::{channel_masks, ByteOrder, ChannelLayout};
use tilebench::strategy::{GridDims, StrategyKind};
use tilebench::surface::SurfaceBuilder;

#[derive(Debug, Parser)]
#[command(name = "tilebench")]
#[command(about = "Per-frame cost of tiled background render strategies")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Run one strategy for a session and report its average draw cost.
    Run {
        #[command(flatten)]
        session: SessionArgs,
        #[arg(long, value_parser = parse_strategy)]
        strategy: Option<StrategyKind>,
        /// Write the final frame as PNG.
        #[arg(long = "save-frame")]
        save_frame: Option<PathBuf>,
    },
    /// Run all three strategies on the same session and compare averages.
    Compare {
        #[command(flatten)]
        session: SessionArgs,
    },
    /// Decode an image and show its pixel layout and per-strategy draw counts.
    Inspect {
        image: PathBuf,
        #[arg(long)]
        width: Option<u32>,
        #[arg(long)]
        height: Option<u32>,
        #[arg(long)]
        json: bool,
    },
}

#[derive(Debug, Args)]
struct SessionArgs {
    /// YAML bench file; flags below override its values.
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long)]
    image: Option<PathBuf>,
    #[arg(long)]
    width: Option<u32>,
    #[arg(long)]
    height: Option<u32>,
    #[arg(long)]
    frames: Option<u32>,
    #[arg(long = "grid-rows")]
    grid_rows: Option<u32>,
    #[arg(long = "grid-columns")]
    grid_columns: Option<u32>,
    #[arg(long)]
    json: bool,
    #[arg(long)]
    quiet: bool,
}

impl SessionArgs {
    fn overrides(&self, strategy: Option<StrategyKind>) -> ConfigOverrides {
        ConfigOverrides {
            image: self.image.clone(),
            strategy,
            width: self.width,
            height: self.height,
            frames: self.frames,
            grid_rows: self.grid_rows,
            grid_columns: self.grid_columns,
        }
    }
}

fn parse_strategy(value: &str) -> Result<StrategyKind, String> {
    StrategyKind::from_keyword(value).map_err(|error| error.to_string())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let json = match &cli.command {
        Commands::Run { session, .. } | Commands::Compare { session } => session.json,
        Commands::Inspect { json, .. } => *json,
    };

    match run(cli.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            if json {
                match serde_json::to_string_pretty(&envelope_for(&error)) {
                    Ok(body) => println!("{body}"),
                    Err(_) => eprintln!("error: {error:#}"),
                }
            } else {
                eprintln!("error: {error:#}");
            }
            ExitCode::from(exit_code_for(&error))
        }
    }
}

fn run(command: Commands) -> Result<()> {
    match command {
        Commands::Run {
            session,
            strategy,
            save_frame,
        } => run_session(&session, strategy, save_frame.as_deref()),
        Commands::Compare { session } => compare_sessions(&session),
        Commands::Inspect {
            image,
            width,
            height,
            json,
        } => inspect_image(&image, width, height, json),
    }
}

fn run_session(
    session: &SessionArgs,
    strategy: Option<StrategyKind>,
    save_frame: Option<&Path>,
) -> Result<()> {
    let config = resolve_config(session.config.as_deref(), &session.overrides(strategy))?;
    let (report, canvas) = run_bench(&config, session.quiet)?;

    if let Some(path) = save_frame {
        canvas.save_png(path)?;
        eprintln!("[TILEBENCH] wrote {}", path.display());
    }

    if session.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        if report.placeholder {
            println!("tile: placeholder {}x{}", report.tile.0, report.tile.1);
        }
        println!("{}", report.summary_line());
        println!("average: {}", report.average_label());
    }
    Ok(())
}

fn compare_sessions(session: &SessionArgs) -> Result<()> {
    let config = resolve_config(session.config.as_deref(), &session.overrides(None))?;
    let reports = run_compare(&config, session.quiet)?;

    if session.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&json!({ "ok": true, "reports": reports }))?
        );
        return Ok(());
    }

    println!(
        "{:<10} {:>8} {:>12} {:>10} {:>10} {:>10}",
        "strategy", "draws", "prepare_us", "avg_us", "min_us", "max_us"
    );
    for report in &reports {
        let cell = |value: Option<u64>| value.map_or_else(|| "-".to_owned(), |v| v.to_string());
        println!(
            "{:<10} {:>8} {:>12} {:>10} {:>10} {:>10}",
            report.strategy.keyword(),
            report
                .draw_calls_per_frame
                .map_or_else(|| "-".to_owned(), |v| v.to_string()),
            report.prepare_micros,
            cell(report.frames.average_micros),
            cell(report.frames.min_micros),
            cell(report.frames.max_micros),
        );
    }
    Ok(())
}

fn inspect_image(image: &Path, width: Option<u32>, height: Option<u32>, json: bool) -> Result<()> {
    let canvas = CanvasSize {
        width: width.unwrap_or(DEFAULT_CANVAS.width),
        height: height.unwrap_or(DEFAULT_CANVAS.height),
    };
    canvas.validate()?;
    let canvas = canvas.as_tuple();
    let order = ByteOrder::native();
    let builder = SurfaceBuilder::new(order);

    let decoded = decode(image);
    let decode_error = decoded.as_ref().err().map(ToString::to_string);
    let buffer_info = decoded
        .as_ref()
        .ok()
        .map(|buffer| (buffer.width(), buffer.height(), buffer.channels(), buffer.stride()));
    let surface = builder.build_decoded(decoded);
    let plans = plan_draws(&surface, canvas, GridDims::default())
        .with_context(|| format!("failed to plan draws for {}", image.display()))?;
    let masks = channel_masks(order, surface.layout());

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&json!({
                "ok": true,
                "image": image.display().to_string(),
                "decode_error": decode_error,
                "byte_order": order,
                "width": surface.width(),
                "height": surface.height(),
                "layout": surface.layout(),
                "stride": surface.stride(),
                "masks": masks,
                "origin": surface.origin(),
                "canvas": canvas,
                "plans": plans,
            }))?
        );
        return Ok(());
    }

    println!("image: {}", image.display());
    match (buffer_info, decode_error) {
        (Some((width, height, channels, stride)), _) => {
            println!("decoded: {width}x{height}, {channels} channel(s), stride {stride}");
        }
        (None, Some(error)) => println!("decode failed: {error}"),
        (None, None) => {}
    }
    let layout = match surface.layout() {
        ChannelLayout::Rgb => "rgb",
        ChannelLayout::Rgba => "rgba",
    };
    println!(
        "surface: {}x{} {} ({:?}), {}-endian masks {}",
        surface.width(),
        surface.height(),
        layout,
        surface.origin(),
        order.keyword(),
        masks
    );
    println!("canvas: {}x{}", canvas.0, canvas.1);
    for plan in plans {
        println!(
            "  {:<10} prepare {:>5} draw(s), {:>5} draw(s) per frame",
            plan.strategy.keyword(),
            plan.prepare_draws,
            plan.frame_draws
        );
    }
    Ok(())
}
