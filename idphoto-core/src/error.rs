//! Error type shared by every framing, compositing and layout stage.

use thiserror::Error;

/// Failures the photo pipeline can report.
///
/// "No face found" is deliberately absent: it is an expected outcome and is modelled as
/// `Ok(None)` by the anchor resolver.
#[derive(Debug, Error)]
pub enum PhotoError {
    /// The background color is not a six-digit hex string.
    #[error("invalid background color '{0}': expected six hex digits like #FFFFFF")]
    InvalidColorSpec(String),

    /// A requested output size has a zero dimension.
    #[error("invalid target size {width}x{height}: both dimensions must be at least 1")]
    InvalidTargetSize { width: u32, height: u32 },

    /// Sheet parameters that cannot produce a grid.
    #[error("invalid sheet layout: {0}")]
    InvalidLayout(String),

    /// Segmentation failed, returned garbage, or no segmenter is available.
    #[error("background replacement failed: {0}")]
    BackgroundReplacementFailed(String),

    /// The crop rectangle collapsed to zero area.
    #[error("crop rectangle collapsed for a {width}x{height} source: {reason}")]
    DegenerateCropGeometry {
        width: u32,
        height: u32,
        reason: String,
    },

    /// The landmark detector itself failed (as opposed to finding nothing).
    #[error("face landmark detection failed")]
    Detection(#[source] anyhow::Error),

    /// Encoding a raster or document asset failed.
    #[error("failed to encode asset '{name}'")]
    AssetEncodingFailed {
        name: String,
        #[source]
        source: anyhow::Error,
    },

    /// The source image could not be decoded.
    #[error("failed to decode source image")]
    Decode(#[source] anyhow::Error),
}

impl PhotoError {
    pub(crate) fn encoding(name: impl Into<String>, source: impl Into<anyhow::Error>) -> Self {
        Self::AssetEncodingFailed {
            name: name.into(),
            source: source.into(),
        }
    }

    /// Whether the pipeline may continue after this error with a degraded result.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::BackgroundReplacementFailed(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_background_failures_are_recoverable() {
        assert!(PhotoError::BackgroundReplacementFailed("x".into()).is_recoverable());
        assert!(!PhotoError::InvalidColorSpec("x".into()).is_recoverable());
        assert!(!PhotoError::Detection(anyhow::anyhow!("boom")).is_recoverable());
    }

    #[test]
    fn messages_name_the_offending_value() {
        let err = PhotoError::InvalidTargetSize {
            width: 0,
            height: 531,
        };
        assert!(err.to_string().contains("0x531"));
        let err = PhotoError::InvalidColorSpec("#GGG".into());
        assert!(err.to_string().contains("#GGG"));
    }
}
