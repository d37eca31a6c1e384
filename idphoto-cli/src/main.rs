mod args;
mod backends;
mod config;

use std::{
    fs::{self, File},
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use clap::Parser;
use idphoto_core::{
    AnchorRect, ExportBundle, PhotoPipeline, PipelineConfig, photo_presets, sheet_presets,
};
use idphoto_utils::{configure_telemetry, init_logging, normalize_path, write_bytes};
use log::info;
use serde::Serialize;

use crate::{
    args::PhotoArgs,
    backends::{build_detector, build_segmenter},
    config::{apply_cli_overrides, load_settings},
};

#[derive(Debug, Serialize)]
struct AssetRecord {
    name: String,
    bytes: usize,
}

#[derive(Debug, Serialize)]
struct RunReport {
    input: String,
    background_color: String,
    background_replaced: bool,
    /// `[min_x, min_y, max_x, max_y]` of the face anchor, absent for centered crops.
    #[serde(skip_serializing_if = "Option::is_none")]
    anchor: Option<[u32; 4]>,
    assets: Vec<AssetRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    archive: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    files: Vec<String>,
}

fn main() -> Result<()> {
    let args = PhotoArgs::parse();
    init_logging(args.log_filter())?;

    let mut settings = load_settings(args.config.as_ref())?;
    apply_cli_overrides(&mut settings, &args);
    configure_telemetry(
        settings.telemetry.enabled,
        settings.telemetry.level_filter(),
    );

    if let Some(path) = args.save_config.as_ref() {
        settings.save_to_path(path)?;
        info!("Saved effective settings to {}", path.display());
    }

    if args.list_presets {
        print_presets();
        return Ok(());
    }

    let input = args
        .input
        .as_ref()
        .context("--input is required unless --list-presets is given")?;
    let input_path = normalize_path(input)?;
    let bytes = fs::read(&input_path)
        .with_context(|| format!("failed to read {}", input_path.display()))?;

    let (detector, shared_detector) = build_detector(&settings.detector, args.no_detect)?;
    let segmenter = build_segmenter(&settings.matting);
    let pipeline = PhotoPipeline::new(
        detector,
        segmenter,
        PipelineConfig::from_settings(&settings),
    );

    info!("Processing {}", input_path.display());
    let output = pipeline
        .run_bytes(&bytes)
        .with_context(|| format!("failed to process {}", input_path.display()))?;
    if let Some(shared) = shared_detector {
        shared.teardown();
    }

    let mut report = RunReport {
        input: input_path.display().to_string(),
        background_color: pipeline.config().background_color.clone(),
        background_replaced: output.background_replaced,
        anchor: output.anchor.map(anchor_record),
        assets: asset_records(&output.bundle),
        archive: None,
        files: Vec::new(),
    };

    if let Some(dir) = args.output_dir.as_ref() {
        let written = output.bundle.write_to_dir(dir)?;
        report.files = written.iter().map(|p| p.display().to_string()).collect();
    }

    let archive_path = match (&args.archive, &args.output_dir) {
        (Some(path), _) => Some(path.clone()),
        (None, None) => Some(PathBuf::from(&settings.output.archive_name)),
        (None, Some(_)) => None,
    };
    if let Some(path) = archive_path {
        write_archive(&output.bundle, &path)?;
        report.archive = Some(path.display().to_string());
    }

    if let Some(json_path) = args.json.as_ref() {
        if let Some(dir) = json_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(dir)
                .with_context(|| format!("failed to create directory {}", dir.display()))?;
        }
        let file = File::create(json_path)
            .with_context(|| format!("failed to create {}", json_path.display()))?;
        serde_json::to_writer_pretty(file, &report)
            .with_context(|| format!("failed to write run report to {}", json_path.display()))?;
        info!("Wrote run report to {}", json_path.display());
    } else {
        let json = serde_json::to_string_pretty(&report).context("failed to serialize report")?;
        println!("{json}");
    }

    Ok(())
}

fn write_archive(bundle: &ExportBundle, path: &Path) -> Result<()> {
    let archive = bundle.to_zip()?;
    write_bytes(path, &archive)?;
    info!(
        "Wrote {} assets to {} ({} bytes)",
        bundle.len(),
        path.display(),
        archive.len()
    );
    Ok(())
}

fn asset_records(bundle: &ExportBundle) -> Vec<AssetRecord> {
    bundle
        .iter()
        .map(|(name, bytes)| AssetRecord {
            name: name.to_string(),
            bytes: bytes.len(),
        })
        .collect()
}

fn anchor_record(anchor: AnchorRect) -> [u32; 4] {
    [anchor.min_x, anchor.min_y, anchor.max_x, anchor.max_y]
}

fn print_presets() {
    println!("Photo sizes:");
    for preset in photo_presets() {
        println!(
            "  {:<10} {:>4}x{:<4} {}",
            preset.name, preset.width, preset.height, preset.description
        );
    }
    println!("Sheet sizes:");
    for preset in sheet_presets() {
        println!(
            "  {:<10} {:>4}x{:<4} {}",
            preset.name, preset.width, preset.height, preset.description
        );
    }
}
