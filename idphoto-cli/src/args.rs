//! Command-line argument definitions for the `idphoto` binary.

use clap::{ArgAction, Parser};
use std::path::PathBuf;

/// Turn one portrait into passport, stamp and A4 print-sheet assets.
#[derive(Debug, Parser)]
#[command(author, version, about)]
pub struct PhotoArgs {
    /// Portrait to process (jpg, png or webp).
    #[arg(short, long, required_unless_present = "list_presets")]
    pub input: Option<PathBuf>,

    /// Write the assets as loose files into this directory.
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,

    /// Write the zip archive to this path. Defaults to `processed_photos.zip` in the
    /// current directory when `--output-dir` is not given either.
    #[arg(long)]
    pub archive: Option<PathBuf>,

    /// Optional settings JSON. Defaults to `config/idphoto.json` when present, otherwise built-in parameters.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Save the effective settings (file + flags) to this path.
    #[arg(long, value_name = "PATH")]
    pub save_config: Option<PathBuf>,

    /// Background color behind the subject, as #RRGGBB.
    #[arg(long, value_name = "COLOR")]
    pub bg_color: Option<String>,

    /// Path to the YuNet ONNX face detector.
    #[arg(long)]
    pub detector_model: Option<PathBuf>,

    /// Path to the U²-Net family ONNX matting model.
    #[arg(long)]
    pub matting_model: Option<PathBuf>,

    /// Skip face detection and use centered crops.
    #[arg(long, action = ArgAction::SetTrue)]
    pub no_detect: bool,

    /// Keep the original background.
    #[arg(long, action = ArgAction::SetTrue)]
    pub no_background: bool,

    /// Skip auto-contrast and sharpening.
    #[arg(long, action = ArgAction::SetTrue)]
    pub no_enhance: bool,

    /// JPEG quality for every raster asset (1-100).
    #[arg(long)]
    pub jpeg_quality: Option<u8>,

    /// Sheet margin in pixels.
    #[arg(long)]
    pub margin: Option<u32>,

    /// Photos per sheet row.
    #[arg(long)]
    pub columns: Option<u32>,

    /// Write a JSON run report to this path instead of stdout.
    #[arg(long)]
    pub json: Option<PathBuf>,

    /// Print the built-in photo and sheet sizes and exit.
    #[arg(long, action = ArgAction::SetTrue)]
    pub list_presets: bool,

    /// Enable telemetry timing logs (defaults to settings file).
    #[arg(long, action = ArgAction::SetTrue)]
    pub telemetry: bool,

    /// Override telemetry logging level (error, warn, info, debug, trace).
    #[arg(long, value_name = "LEVEL")]
    pub telemetry_level: Option<String>,

    /// Increase log verbosity (-v debug, -vv trace).
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,
}

impl PhotoArgs {
    /// Default log filter implied by `-v` flags.
    pub fn log_filter(&self) -> log::LevelFilter {
        match self.verbose {
            0 => log::LevelFilter::Info,
            1 => log::LevelFilter::Debug,
            _ => log::LevelFilter::Trace,
        }
    }
}
