//! Common helpers shared across the ID photo crates.

/// Hex color parsing and the RGBA value type.
pub mod color;
/// Application configuration and settings management.
pub mod config;
/// Auto-contrast and sharpen applied to uploads.
pub mod enhance;
/// Image loading, resizing, and tensor conversion.
pub mod image_utils;
/// Raster encoding and file output.
pub mod output;
/// Instrumentation helpers for optional performance tracing.
pub mod telemetry;

use std::path::Path;

use anyhow::Result;
use log::LevelFilter;

pub use color::{RgbaColor, parse_hex_color};
pub use config::{AppSettings, default_settings_path};
pub use enhance::{EnhancementSettings, auto_enhance};
pub use image_utils::{
    compute_resize_scales, decode_image, resize_image, rgb_to_bgr_chw,
    rgb_to_normalized_chw,
};
pub use output::{encode_jpeg, encode_png, write_bytes};
pub use telemetry::{
    TELEMETRY_TARGET, TimingGuard, configure as configure_telemetry, telemetry_allows,
    telemetry_enabled, telemetry_level, timing_guard,
};

/// Initialize logging once for the CLI and tests.
///
/// Respects `RUST_LOG` when set, otherwise falls back to `default_filter`. Telemetry
/// records are always let through at the logger level; [`telemetry::configure`] decides
/// whether they are emitted at all.
pub fn init_logging(default_filter: LevelFilter) -> Result<()> {
    let mut builder = env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(default_filter.as_str()),
    );
    builder.filter_module(TELEMETRY_TARGET, LevelFilter::Trace);

    if builder.try_init().is_err() {
        // Logger already initialized; nothing to do.
    }
    Ok(())
}

/// Validate that a path exists and resolve it to an absolute path.
pub fn normalize_path<P: AsRef<Path>>(path: P) -> Result<std::path::PathBuf> {
    let path = path.as_ref();
    anyhow::ensure!(path.exists(), "path does not exist: {}", path.display());
    Ok(path.canonicalize()?)
}
