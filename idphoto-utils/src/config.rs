//! Persistent settings shared by the core pipeline and the CLI.
//!
//! Everything is plain serde data with `#[serde(default)]` on every struct, so a settings
//! file only needs to mention the values it changes.

use crate::{color::RgbaColor, enhance::EnhancementSettings};

use anyhow::{Context, Result};
use log::LevelFilter;
use serde::{Deserialize, Serialize};
use std::{
    env, fs,
    path::{Path, PathBuf},
};

/// Relative location of the settings file picked up when `--config` is not given.
pub const DEFAULT_SETTINGS_FILE: &str = "config/idphoto.json";

/// Width and height of a delivered photo, in pixels.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct PhotoDimensions {
    pub width: u32,
    pub height: u32,
}

impl PhotoDimensions {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

/// YuNet face detector parameters.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DetectorSettings {
    /// Path to the YuNet ONNX model. `None` disables detection (center crops only).
    pub model_path: Option<String>,
    /// Inference input width in pixels.
    pub input_width: u32,
    /// Inference input height in pixels.
    pub input_height: u32,
    /// Minimum confidence score for a face to be used as the anchor.
    pub score_threshold: f32,
    /// IoU threshold for non-maximum suppression.
    pub nms_threshold: f32,
    /// Upper bound on candidates kept before suppression.
    pub top_k: usize,
}

impl Default for DetectorSettings {
    fn default() -> Self {
        Self {
            model_path: Some("models/face_detection_yunet_2023mar_640.onnx".into()),
            input_width: 640,
            input_height: 640,
            score_threshold: 0.9,
            nms_threshold: 0.3,
            top_k: 5_000,
        }
    }
}

/// Salient-object matting backend used for background replacement.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct MattingSettings {
    /// Run background replacement at all.
    pub enabled: bool,
    /// Path to the U²-Net style ONNX model.
    pub model_path: Option<String>,
    /// Square inference resolution.
    pub input_size: u32,
}

impl Default for MattingSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            model_path: Some("models/u2net_human_seg.onnx".into()),
            input_size: 320,
        }
    }
}

/// Backdrop placed behind the subject.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BackgroundSettings {
    /// Six-digit hex color, with or without a leading `#`. Validated when the pipeline runs.
    pub color: String,
}

impl Default for BackgroundSettings {
    fn default() -> Self {
        Self {
            color: "#FFFFFF".into(),
        }
    }
}

/// Auto-enhance applied to the upload before anything else.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EnhanceSettings {
    /// Run auto-contrast and sharpen.
    pub enabled: bool,
    /// Percentage clipped from each end of the histogram (0-49).
    pub cutoff_pct: f32,
    /// Apply the 3x3 sharpen after the contrast stretch.
    pub sharpen: bool,
}

impl Default for EnhanceSettings {
    fn default() -> Self {
        let defaults = EnhancementSettings::default();
        Self {
            enabled: true,
            cutoff_pct: defaults.cutoff_pct,
            sharpen: defaults.sharpen,
        }
    }
}

impl EnhanceSettings {
    /// The parameters handed to [`crate::enhance::auto_enhance`], or `None` when disabled.
    pub fn enhancement(&self) -> Option<EnhancementSettings> {
        self.enabled.then(|| EnhancementSettings {
            cutoff_pct: self.cutoff_pct.clamp(0.0, 49.0),
            sharpen: self.sharpen,
        })
    }
}

/// Sizes and encoding of the single-photo assets.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct OutputSettings {
    pub passport: PhotoDimensions,
    pub stamp: PhotoDimensions,
    /// JPEG quality (1-100) for every raster in the bundle.
    pub jpeg_quality: u8,
    /// File name of the zip archive written by the CLI.
    pub archive_name: String,
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self {
            passport: PhotoDimensions::new(413, 531),
            stamp: PhotoDimensions::new(236, 295),
            jpeg_quality: 95,
            archive_name: "processed_photos.zip".into(),
        }
    }
}

/// Print sheet geometry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SheetSettings {
    /// Sheet width in pixels (A4 at 300 DPI by default).
    pub width: u32,
    /// Sheet height in pixels.
    pub height: u32,
    /// Distance from every sheet edge to the first placement.
    pub margin: u32,
    pub columns: u32,
    /// Copies on the smaller sheet.
    pub small_copies: u32,
    /// Copies on the larger sheet; this one also goes into the PDF.
    pub large_copies: u32,
    /// Canvas color behind the placements.
    pub fill: RgbaColor,
}

impl Default for SheetSettings {
    fn default() -> Self {
        Self {
            width: 2480,
            height: 3508,
            margin: 100,
            columns: 3,
            small_copies: 3,
            large_copies: 6,
            fill: RgbaColor::WHITE,
        }
    }
}

/// Settings controlling optional runtime telemetry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TelemetrySettings {
    /// Whether telemetry timing logs are enabled.
    pub enabled: bool,
    /// Logging level for telemetry output (error, warn, info, debug, trace).
    pub level: String,
}

impl Default for TelemetrySettings {
    fn default() -> Self {
        Self {
            enabled: false,
            level: "debug".to_string(),
        }
    }
}

impl TelemetrySettings {
    /// Resolve the configured level string into a `LevelFilter`.
    pub fn level_filter(&self) -> LevelFilter {
        match self.level.trim().to_ascii_lowercase().as_str() {
            "off" => LevelFilter::Off,
            "error" => LevelFilter::Error,
            "warn" | "warning" => LevelFilter::Warn,
            "info" => LevelFilter::Info,
            "trace" => LevelFilter::Trace,
            _ => LevelFilter::Debug,
        }
    }

    /// Update the level string from a `LevelFilter` value.
    pub fn set_level(&mut self, level: LevelFilter) {
        self.level = level.as_str().to_ascii_lowercase();
    }
}

/// Everything the pipeline and the CLI can be configured with.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct AppSettings {
    pub detector: DetectorSettings,
    pub matting: MattingSettings,
    pub background: BackgroundSettings,
    pub enhance: EnhanceSettings,
    pub output: OutputSettings,
    pub sheet: SheetSettings,
    pub telemetry: TelemetrySettings,
}

impl AppSettings {
    /// Load settings from a JSON file. Missing fields take their defaults.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .with_context(|| format!("failed to read settings file {}", path.display()))?;
        let mut settings: AppSettings = serde_json::from_str(&contents)
            .with_context(|| format!("failed to parse settings JSON at {}", path.display()))?;
        settings.sanitize();
        Ok(settings)
    }

    /// Serialize settings to disk in pretty-printed JSON, overwriting any existing file.
    pub fn save_to_path<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let payload =
            serde_json::to_string_pretty(self).context("failed to serialize settings JSON")?;
        fs::write(path, payload)
            .with_context(|| format!("failed to write settings file {}", path.display()))?;
        Ok(())
    }

    /// Clamp values that have a hard valid range.
    pub fn sanitize(&mut self) {
        self.output.jpeg_quality = self.output.jpeg_quality.clamp(1, 100);
        self.enhance.cutoff_pct = self.enhance.cutoff_pct.clamp(0.0, 49.0);
    }
}

/// Returns the default settings path (`config/idphoto.json` under the working directory).
pub fn default_settings_path() -> PathBuf {
    env::current_dir()
        .map(|dir| dir.join(DEFAULT_SETTINGS_FILE))
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_SETTINGS_FILE))
}
