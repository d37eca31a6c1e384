//! Landmark detector and matting backend construction.

use std::sync::Arc;

use anyhow::{Context, Result};
use idphoto_core::{
    LandmarkDetector, NoFaceDetector, OnnxMatting, SharedDetector, SubjectSegmenter,
    YuNetDetector,
};
use idphoto_utils::{
    config::{DetectorSettings, MattingSettings},
    normalize_path,
};
use log::{info, warn};

/// The detector the pipeline should use.
///
/// The YuNet graph is only parsed on the first detection; the returned [`SharedDetector`]
/// lets the caller release it explicitly. `None` for the handle means detection is off,
/// either through `no_detect` or because no model path is configured.
pub fn build_detector(
    settings: &DetectorSettings,
    no_detect: bool,
) -> Result<(Arc<dyn LandmarkDetector>, Option<Arc<SharedDetector>>)> {
    if no_detect {
        info!("Face detection disabled; crops will be centered");
        return Ok((Arc::new(NoFaceDetector), None));
    }

    let Some(configured) = settings.model_path.as_deref() else {
        info!("No YuNet model configured; crops will be centered");
        return Ok((Arc::new(NoFaceDetector), None));
    };
    let model_path = normalize_path(configured)
        .context("YuNet model unavailable (use --no-detect to skip detection)")?;
    info!(
        "Using YuNet model {} at resolution {}x{}",
        model_path.display(),
        settings.input_width,
        settings.input_height
    );

    let mut resolved = settings.clone();
    resolved.model_path = Some(model_path.display().to_string());
    let shared = Arc::new(SharedDetector::new(move || {
        let detector = YuNetDetector::from_settings(&resolved)?;
        Ok(Arc::new(detector) as Arc<dyn LandmarkDetector>)
    }));
    let detector: Arc<dyn LandmarkDetector> = shared.clone();
    Ok((detector, Some(shared)))
}

/// The matting backend, or `None` when disabled or unavailable.
///
/// A model that cannot be loaded is not fatal: the pipeline keeps the original background.
pub fn build_segmenter(settings: &MattingSettings) -> Option<Arc<dyn SubjectSegmenter>> {
    if !settings.enabled {
        info!("Background replacement disabled");
        return None;
    }
    match OnnxMatting::from_settings(settings) {
        Ok(matting) => {
            info!(
                "Matting model loaded at {}x{} input",
                settings.input_size, settings.input_size
            );
            Some(Arc::new(matting))
        }
        Err(err) => {
            warn!("Matting model unavailable ({err:#}); background will be kept");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::DynamicImage;

    #[test]
    fn no_detect_skips_model_lookup() {
        let settings = DetectorSettings {
            model_path: Some("does/not/exist.onnx".into()),
            ..DetectorSettings::default()
        };
        let (detector, shared) = build_detector(&settings, true).unwrap();
        assert!(shared.is_none());
        let landmarks = detector
            .detect_landmarks(&DynamicImage::new_rgb8(8, 8))
            .unwrap();
        assert!(landmarks.is_empty());
    }

    #[test]
    fn unset_model_path_falls_back_to_centered_crops() {
        let settings = DetectorSettings {
            model_path: None,
            ..DetectorSettings::default()
        };
        let (detector, shared) = build_detector(&settings, false).unwrap();
        assert!(shared.is_none());
        let landmarks = detector
            .detect_landmarks(&DynamicImage::new_rgb8(8, 8))
            .unwrap();
        assert!(landmarks.is_empty());
    }

    #[test]
    fn missing_detector_model_is_an_error() {
        let settings = DetectorSettings {
            model_path: Some("does/not/exist.onnx".into()),
            ..DetectorSettings::default()
        };
        assert!(build_detector(&settings, false).is_err());
    }

    #[test]
    fn unavailable_matting_model_degrades_to_none() {
        let settings = MattingSettings {
            model_path: Some("does/not/exist.onnx".into()),
            ..MattingSettings::default()
        };
        assert!(build_segmenter(&settings).is_none());
        let disabled = MattingSettings {
            enabled: false,
            ..MattingSettings::default()
        };
        assert!(build_segmenter(&disabled).is_none());
    }
}
