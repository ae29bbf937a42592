use std::fs;
use std::path::Path;
use std::process::{Command, Output};

use image::{Rgb, RgbImage};
use serde_json::Value;
use tempfile::tempdir;

fn run_tilebench(cwd: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_tilebench"))
        .current_dir(cwd)
        .args(args)
        .output()
        .expect("tilebench command should run")
}

fn write_tile(path: &Path, width: u32, height: u32) {
    RgbImage::from_fn(width, height, |x, y| {
        Rgb([(x * 5) as u8, (y * 5) as u8, 128])
    })
    .save(path)
    .expect("tile should write");
}

fn stdout_json(output: &Output) -> Value {
    serde_json::from_slice(&output.stdout).unwrap_or_else(|error| {
        panic!(
            "stdout should be json ({error}): {}",
            String::from_utf8_lossy(&output.stdout)
        )
    })
}

#[test]
fn missing_image_falls_back_to_placeholder_and_still_runs() {
    let dir = tempdir().expect("tempdir should create");
    let output = run_tilebench(
        dir.path(),
        &[
            "run",
            "--image",
            "nope.png",
            "--strategy",
            "grid",
            "--frames",
            "3",
            "--width",
            "64",
            "--height",
            "64",
            "--quiet",
            "--json",
        ],
    );
    assert!(output.status.success(), "run should succeed: {output:?}");

    let report = stdout_json(&output);
    assert_eq!(report["ok"], true);
    assert_eq!(report["strategy"], "grid");
    assert_eq!(report["placeholder"], true);
    assert_eq!(report["tile"], serde_json::json!([20, 20]));
    assert_eq!(report["frames"]["samples"], 3);
    assert_eq!(report["draw_calls_per_frame"], 98);
    assert!(report["frame_sha256"].as_str().is_some_and(|hash| hash.len() == 64));

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("placeholder"), "stderr: {stderr}");
}

#[test]
fn zero_frame_session_reports_no_data() {
    let dir = tempdir().expect("tempdir should create");
    write_tile(&dir.path().join("tile.png"), 10, 10);
    let output = run_tilebench(
        dir.path(),
        &["run", "--image", "tile.png", "--frames", "0", "--quiet"],
    );
    assert!(output.status.success(), "run should succeed: {output:?}");
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("average: no data"), "stdout: {stdout}");
    assert!(
        stdout.contains("stretched: average no data over 0 frame(s)"),
        "stdout: {stdout}"
    );
}

#[test]
fn unknown_strategy_is_rejected_at_the_cli() {
    let dir = tempdir().expect("tempdir should create");
    let output = run_tilebench(dir.path(), &["run", "--strategy", "mosaic"]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("invalid strategy 'mosaic'"), "stderr: {stderr}");
}

#[test]
fn zero_canvas_emits_coded_error_envelope() {
    let dir = tempdir().expect("tempdir should create");
    let output = run_tilebench(dir.path(), &["run", "--width", "0", "--json"]);
    assert_eq!(output.status.code(), Some(3));

    let envelope = stdout_json(&output);
    assert_eq!(envelope["ok"], false);
    assert_eq!(envelope["error"]["code"], "INVALID_CONFIG");
    assert_eq!(envelope["error"]["details"]["field"], "canvas");
}

#[test]
fn bench_file_errors_keep_their_codes_in_the_envelope() {
    let dir = tempdir().expect("tempdir should create");
    fs::write(dir.path().join("bad.yaml"), "frames: 5\nstrategy: mosaic\n")
        .expect("bench file should write");
    let output = run_tilebench(dir.path(), &["run", "--config", "bad.yaml", "--json"]);
    assert_eq!(output.status.code(), Some(2));
    let envelope = stdout_json(&output);
    assert_eq!(envelope["error"]["code"], "INVALID_STRATEGY");
    assert_eq!(envelope["error"]["details"]["provided"], "mosaic");

    fs::write(dir.path().join("broken.yaml"), "frames: [5, 6\n")
        .expect("bench file should write");
    let output = run_tilebench(dir.path(), &["run", "--config", "broken.yaml", "--json"]);
    assert_eq!(output.status.code(), Some(3));
    let envelope = stdout_json(&output);
    assert_eq!(envelope["error"]["code"], "INVALID_CONFIG");
    assert!(envelope["error"]["details"]["line"].is_u64(), "{envelope}");
}

#[test]
fn inspect_rejects_zero_canvas_like_run() {
    let dir = tempdir().expect("tempdir should create");
    write_tile(&dir.path().join("tile.png"), 5, 5);
    let output = run_tilebench(
        dir.path(),
        &["inspect", "tile.png", "--width", "0", "--json"],
    );
    assert_eq!(output.status.code(), Some(3));
    let envelope = stdout_json(&output);
    assert_eq!(envelope["error"]["code"], "INVALID_CONFIG");
    assert_eq!(envelope["error"]["details"]["field"], "canvas");
}

#[test]
fn compare_runs_every_strategy_once() {
    let dir = tempdir().expect("tempdir should create");
    write_tile(&dir.path().join("tile.png"), 10, 10);
    let output = run_tilebench(
        dir.path(),
        &[
            "compare", "--image", "tile.png", "--frames", "2", "--width", "100", "--height",
            "100", "--quiet", "--json",
        ],
    );
    assert!(output.status.success(), "compare should succeed: {output:?}");

    let parsed = stdout_json(&output);
    let reports = parsed["reports"].as_array().expect("reports array");
    let summary = reports
        .iter()
        .map(|report| {
            (
                report["strategy"].as_str().unwrap_or_default().to_owned(),
                report["draw_calls_per_frame"].as_u64().unwrap_or_default(),
            )
        })
        .collect::<Vec<_>>();
    assert_eq!(
        summary,
        vec![
            ("stretched".to_owned(), 1),
            ("grid".to_owned(), 98),
            ("atlas".to_owned(), 1),
        ]
    );
    assert!(reports.iter().all(|report| report["placeholder"] == false));
}

#[test]
fn atlas_and_grid_produce_the_same_frame_on_an_exact_canvas() {
    let dir = tempdir().expect("tempdir should create");
    write_tile(&dir.path().join("tile.png"), 10, 10);
    let hash_for = |strategy: &str| {
        let output = run_tilebench(
            dir.path(),
            &[
                "run", "--image", "tile.png", "--strategy", strategy, "--frames", "1", "--width",
                "140", "--height", "70", "--quiet", "--json",
            ],
        );
        assert!(output.status.success(), "run should succeed: {output:?}");
        stdout_json(&output)["frame_sha256"]
            .as_str()
            .expect("hash should be present")
            .to_owned()
    };
    assert_eq!(hash_for("grid"), hash_for("atlas"));
}

#[test]
fn save_frame_writes_canvas_sized_png() {
    let dir = tempdir().expect("tempdir should create");
    write_tile(&dir.path().join("tile.png"), 10, 10);
    let output = run_tilebench(
        dir.path(),
        &[
            "run",
            "--image",
            "tile.png",
            "--strategy",
            "stretched",
            "--frames",
            "1",
            "--width",
            "40",
            "--height",
            "20",
            "--quiet",
            "--save-frame",
            "frame.png",
        ],
    );
    assert!(output.status.success(), "run should succeed: {output:?}");

    let frame = image::open(dir.path().join("frame.png"))
        .expect("frame should decode")
        .to_rgba8();
    assert_eq!(frame.dimensions(), (40, 20));
    // Top-left source pixel stretched 4x horizontally and 2x vertically.
    assert_eq!(frame.get_pixel(3, 1).0, [0, 0, 128, 255]);
    assert_eq!(frame.get_pixel(4, 2).0, [5, 5, 128, 255]);
}

#[test]
fn bench_file_drives_quit_and_overrides_apply() {
    let dir = tempdir().expect("tempdir should create");
    write_tile(&dir.path().join("tile.png"), 10, 10);
    fs::write(
        dir.path().join("bench.yaml"),
        r#"
image: tile.png
strategy: atlas
canvas: { width: 50, height: 50 }
frames: 100
quit_at_frame: 4
resizes:
  - { at_frame: 2, width: 80, height: 60 }
"#,
    )
    .expect("bench file should write");

    let output = run_tilebench(
        dir.path(),
        &["run", "--config", "bench.yaml", "--strategy", "grid", "--quiet", "--json"],
    );
    assert!(output.status.success(), "run should succeed: {output:?}");

    let report = stdout_json(&output);
    assert_eq!(report["strategy"], "grid");
    assert_eq!(report["frames"]["samples"], 5);
    assert_eq!(report["canvas"], serde_json::json!([80, 60]));
}

#[test]
fn inspect_reports_layout_and_draw_plans() {
    let dir = tempdir().expect("tempdir should create");
    write_tile(&dir.path().join("tile.png"), 5, 3);
    let output = run_tilebench(
        dir.path(),
        &["inspect", "tile.png", "--width", "50", "--height", "30", "--json"],
    );
    assert!(output.status.success(), "inspect should succeed: {output:?}");

    let parsed = stdout_json(&output);
    assert_eq!(parsed["layout"], "rgb");
    assert_eq!(parsed["stride"], 16);
    assert_eq!(parsed["origin"], "decoded");
    assert_eq!(parsed["masks"]["alpha"], 0);
    let plans = parsed["plans"].as_array().expect("plans array");
    assert_eq!(plans.len(), 3);
    assert_eq!(plans[2]["strategy"], "atlas");
    assert_eq!(plans[2]["prepare_draws"], 100);

    let text = run_tilebench(dir.path(), &["inspect", "tile.png"]);
    assert!(text.status.success());
    let stdout = String::from_utf8_lossy(&text.stdout);
    assert!(stdout.contains("decoded: 5x3, 3 channel(s), stride 16"), "stdout: {stdout}");
}
