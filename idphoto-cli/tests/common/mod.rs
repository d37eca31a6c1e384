/// Common test utilities and macros for CLI integration tests
use std::path::{Path, PathBuf};

use image::{DynamicImage, Rgb, RgbImage};

/// Write a synthetic portrait: light backdrop with a darker block where a head would be.
pub fn write_portrait(dir: &Path, width: u32, height: u32) -> PathBuf {
    let img = RgbImage::from_fn(width, height, |x, y| {
        let in_head = x > width / 3 && x < width * 2 / 3 && y > height / 5 && y < height * 3 / 5;
        if in_head {
            Rgb([150, 110, 90])
        } else {
            Rgb([210, 215, 225])
        }
    });
    let path = dir.join("portrait.png");
    DynamicImage::ImageRgb8(img)
        .save(&path)
        .expect("save portrait");
    path
}

/// Macro to run the CLI inside `$cwd` with the given arguments.
///
/// Returns the Command output.
///
/// # Usage
///
/// ```ignore
/// let output = run_cli!(temp_dir.path(), ["--input", "portrait.png", "--no-detect"]);
/// assert!(output.status.success());
/// ```
#[macro_export]
macro_rules! run_cli {
    ($cwd:expr, [$($arg:expr),* $(,)?]) => {{
        std::process::Command::new(env!("CARGO_BIN_EXE_idphoto"))
            .current_dir($cwd)
            .env_remove("RUST_LOG")
            .args([$($arg,)*])
            .output()
            .expect("execute CLI")
    }};
}

/// Macro to assert CLI success and optionally print stderr on failure.
///
/// # Usage
///
/// ```ignore
/// assert_cli_success!(output, "CLI should succeed without models");
/// ```
#[macro_export]
macro_rules! assert_cli_success {
    ($output:expr, $msg:literal) => {{
        if !$output.status.success() {
            eprintln!("CLI stderr: {}", String::from_utf8_lossy(&$output.stderr));
        }
        assert!($output.status.success(), $msg);
    }};
}
