//! Configuration loading and CLI override logic.

use std::path::PathBuf;

use anyhow::{Context, Result};
use idphoto_utils::{
    config::{AppSettings, default_settings_path},
    normalize_path,
};
use log::info;

use crate::args::PhotoArgs;

/// Load application settings from a file or use defaults.
pub fn load_settings(config_path: Option<&PathBuf>) -> Result<AppSettings> {
    if let Some(path) = config_path {
        let resolved = normalize_path(path)?;
        let settings = AppSettings::load_from_path(&resolved)?;
        info!("Loaded settings from {}", resolved.display());
        Ok(settings)
    } else {
        let default_path = default_settings_path();
        if default_path.exists() {
            let settings = AppSettings::load_from_path(&default_path).with_context(|| {
                format!(
                    "failed to load default settings from {}",
                    default_path.display()
                )
            })?;
            info!("Loaded settings from {}", default_path.display());
            Ok(settings)
        } else {
            Ok(AppSettings::default())
        }
    }
}

/// Apply command-line arguments to override loaded or default settings.
pub fn apply_cli_overrides(settings: &mut AppSettings, args: &PhotoArgs) {
    if args.telemetry {
        settings.telemetry.enabled = true;
    }
    if let Some(level) = args.telemetry_level.as_ref() {
        let normalized = level.trim();
        if !normalized.is_empty() {
            let lower = normalized.to_ascii_lowercase();
            settings.telemetry.level = lower.clone();
            if lower == "off" {
                settings.telemetry.enabled = false;
            }
        }
    }

    if let Some(color) = args.bg_color.as_ref() {
        settings.background.color = color.trim().to_string();
    }
    if let Some(path) = args.detector_model.as_ref() {
        settings.detector.model_path = Some(path.display().to_string());
    }
    if let Some(path) = args.matting_model.as_ref() {
        settings.matting.model_path = Some(path.display().to_string());
    }
    if args.no_background {
        settings.matting.enabled = false;
    }
    if args.no_enhance {
        settings.enhance.enabled = false;
    }

    if let Some(quality) = args.jpeg_quality {
        settings.output.jpeg_quality = quality;
    }
    if let Some(margin) = args.margin {
        settings.sheet.margin = margin;
    }
    if let Some(columns) = args.columns {
        settings.sheet.columns = columns;
    }

    settings.sanitize();
}
