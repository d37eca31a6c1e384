mod common;

use std::fs;

use common::write_portrait;
use serde_json::Value;
use tempfile::TempDir;

const ALL_ASSETS: [&str; 5] = [
    "passport_single.jpg",
    "stamp_single.jpg",
    "layout_3.jpg",
    "layout_6.jpg",
    "a4_layout6.pdf",
];

fn asset_names(report: &Value) -> Vec<String> {
    report["assets"]
        .as_array()
        .expect("assets array")
        .iter()
        .map(|a| a["name"].as_str().expect("asset name").to_string())
        .collect()
}

#[test]
fn writes_loose_files_archive_and_report() {
    let temp_dir = TempDir::new().expect("create temp dir");
    let input = write_portrait(temp_dir.path(), 480, 640);
    let output_dir = temp_dir.path().join("out");
    let archive = temp_dir.path().join("bundle").join("photos.zip");
    let report_path = temp_dir.path().join("report.json");

    let output = run_cli!(
        temp_dir.path(),
        [
            "--input",
            input.to_str().unwrap(),
            "--no-detect",
            "--no-background",
            "--output-dir",
            output_dir.to_str().unwrap(),
            "--archive",
            archive.to_str().unwrap(),
            "--json",
            report_path.to_str().unwrap(),
        ]
    );
    assert_cli_success!(output, "CLI should succeed without any models");

    for name in ALL_ASSETS {
        let path = output_dir.join(name);
        assert!(path.exists(), "{name} should be written");
    }
    let passport = image::open(output_dir.join("passport_single.jpg")).expect("decode passport");
    assert_eq!((passport.width(), passport.height()), (413, 531));

    let zip_bytes = fs::read(&archive).expect("archive written");
    assert!(zip_bytes.starts_with(b"PK"), "archive should be a zip");

    let report: Value =
        serde_json::from_str(&fs::read_to_string(&report_path).expect("report written"))
            .expect("valid JSON report");
    assert_eq!(asset_names(&report), ALL_ASSETS);
    assert_eq!(report["background_replaced"], Value::Bool(false));
    assert!(report.get("anchor").is_none(), "no anchor without detection");
    assert_eq!(report["files"].as_array().map(Vec::len), Some(5));
}

#[test]
fn default_archive_lands_in_working_directory() {
    let temp_dir = TempDir::new().expect("create temp dir");
    let input = write_portrait(temp_dir.path(), 300, 400);

    let output = run_cli!(
        temp_dir.path(),
        [
            "--input",
            input.to_str().unwrap(),
            "--no-detect",
            "--no-background",
            "--no-enhance",
        ]
    );
    assert_cli_success!(output, "CLI should write the default archive");

    assert!(temp_dir.path().join("processed_photos.zip").exists());
    let report: Value = serde_json::from_slice(&output.stdout).expect("report on stdout");
    assert_eq!(report["archive"], Value::String("processed_photos.zip".into()));
}

#[test]
fn missing_matting_model_keeps_background() {
    let temp_dir = TempDir::new().expect("create temp dir");
    let input = write_portrait(temp_dir.path(), 300, 400);
    let output_dir = temp_dir.path().join("out");

    let output = run_cli!(
        temp_dir.path(),
        [
            "--input",
            input.to_str().unwrap(),
            "--no-detect",
            "--matting-model",
            "models/missing-u2net.onnx",
            "--output-dir",
            output_dir.to_str().unwrap(),
        ]
    );
    assert_cli_success!(output, "missing matting model should not be fatal");

    let report: Value = serde_json::from_slice(&output.stdout).expect("report on stdout");
    assert_eq!(report["background_replaced"], Value::Bool(false));
    assert!(report.get("archive").is_none());
}

#[test]
fn invalid_background_color_is_rejected() {
    let temp_dir = TempDir::new().expect("create temp dir");
    let input = write_portrait(temp_dir.path(), 200, 200);

    let output = run_cli!(
        temp_dir.path(),
        [
            "--input",
            input.to_str().unwrap(),
            "--no-detect",
            "--no-background",
            "--bg-color",
            "#12",
        ]
    );
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("invalid background color"),
        "unexpected stderr: {stderr}"
    );
    assert!(!temp_dir.path().join("processed_photos.zip").exists());
}

#[test]
fn missing_detector_model_points_at_no_detect() {
    let temp_dir = TempDir::new().expect("create temp dir");
    let input = write_portrait(temp_dir.path(), 200, 200);

    let output = run_cli!(
        temp_dir.path(),
        [
            "--input",
            input.to_str().unwrap(),
            "--detector-model",
            "models/absent-yunet.onnx",
        ]
    );
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("--no-detect"), "unexpected stderr: {stderr}");
}

#[test]
fn config_file_changes_sheet_copies() {
    let temp_dir = TempDir::new().expect("create temp dir");
    let input = write_portrait(temp_dir.path(), 300, 400);
    let config = temp_dir.path().join("settings.json");
    fs::write(
        &config,
        r#"{ "sheet": { "small_copies": 2, "large_copies": 4, "columns": 2 } }"#,
    )
    .unwrap();
    let output_dir = temp_dir.path().join("out");
    let saved = temp_dir.path().join("effective.json");

    let output = run_cli!(
        temp_dir.path(),
        [
            "--input",
            input.to_str().unwrap(),
            "--config",
            config.to_str().unwrap(),
            "--save-config",
            saved.to_str().unwrap(),
            "--no-detect",
            "--no-background",
            "--output-dir",
            output_dir.to_str().unwrap(),
        ]
    );
    assert_cli_success!(output, "CLI should honour the settings file");

    for name in ["layout_2.jpg", "layout_4.jpg", "a4_layout4.pdf"] {
        assert!(output_dir.join(name).exists(), "{name} should be written");
    }
    let saved: Value =
        serde_json::from_str(&fs::read_to_string(&saved).expect("settings saved")).unwrap();
    assert_eq!(saved["sheet"]["columns"], Value::from(2));
}

#[test]
fn list_presets_needs_no_input() {
    let temp_dir = TempDir::new().expect("create temp dir");
    let output = run_cli!(temp_dir.path(), ["--list-presets"]);
    assert_cli_success!(output, "listing presets should succeed");

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Passport"));
    assert!(stdout.contains("413x531"));
    assert!(stdout.contains("2480x3508"));
}
