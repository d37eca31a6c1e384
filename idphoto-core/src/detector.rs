use std::path::Path;

use anyhow::Result;
use image::DynamicImage;
use log::debug;

use crate::anchor::{LandmarkDetector, NormalizedLandmark};
use crate::model::YuNetModel;
use crate::postprocess::{Detection, PostprocessConfig, apply_postprocess};
use crate::preprocess::{PreprocessConfig, PreprocessOutput, preprocess_dynamic_image};
use idphoto_utils::{config::DetectorSettings, timing_guard};

/// Result of running YuNet on an image.
#[derive(Debug)]
pub struct DetectionOutput {
    /// Faces in descending score order, in source pixel coordinates.
    pub detections: Vec<Detection>,
    pub original_size: (u32, u32),
}

impl DetectionOutput {
    /// Landmarks of the highest-scoring face, normalized by the source size.
    ///
    /// The set is the four box corners plus the five keypoints, so the anchor built from it
    /// covers the whole detected face rather than just the eyes, nose and mouth.
    pub fn primary_landmarks(&self) -> Vec<NormalizedLandmark> {
        let (w, h) = self.original_size;
        if w == 0 || h == 0 {
            return Vec::new();
        }
        self.detections
            .first()
            .map(|det| {
                det.outline_points()
                    .map(|p| NormalizedLandmark::new(p.x / w as f32, p.y / h as f32))
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// YuNet model coupled with its preprocessing and postprocessing settings.
#[derive(Debug)]
pub struct YuNetDetector {
    model: YuNetModel,
    preprocess: PreprocessConfig,
    postprocess: PostprocessConfig,
}

impl YuNetDetector {
    pub fn new<P: AsRef<Path>>(
        model_path: P,
        preprocess: PreprocessConfig,
        postprocess: PostprocessConfig,
    ) -> Result<Self> {
        let model = YuNetModel::load(model_path, preprocess.input_size)?;
        Ok(Self {
            model,
            preprocess,
            postprocess,
        })
    }

    /// Build a detector from persisted settings. Fails when no model path is configured.
    pub fn from_settings(settings: &DetectorSettings) -> Result<Self> {
        let path = settings
            .model_path
            .as_deref()
            .ok_or_else(|| anyhow::anyhow!("no YuNet model path configured"))?;
        let preprocess = PreprocessConfig {
            input_size: settings.into(),
            ..Default::default()
        };
        Self::new(path, preprocess, settings.into())
    }

    /// Run detection on an in-memory image.
    pub fn detect_image(&self, image: &DynamicImage) -> Result<DetectionOutput> {
        let _guard = timing_guard("idphoto_core::detect_image", log::Level::Debug);
        let prep = preprocess_dynamic_image(image, &self.preprocess)?;
        self.run_preprocessed(prep)
    }

    pub fn postprocess_config(&self) -> &PostprocessConfig {
        &self.postprocess
    }

    pub fn preprocess_config(&self) -> &PreprocessConfig {
        &self.preprocess
    }

    fn run_preprocessed(&self, prep: PreprocessOutput) -> Result<DetectionOutput> {
        let raw = {
            let _guard = timing_guard("idphoto_core::yunet_inference", log::Level::Debug);
            self.model.run(prep.tensor)?
        };

        let detections = {
            let _guard = timing_guard("idphoto_core::yunet_postprocess", log::Level::Trace);
            apply_postprocess(&raw, prep.scale_x, prep.scale_y, &self.postprocess)?
        };
        debug!(
            "YuNet found {} face(s) on {}x{} image",
            detections.len(),
            prep.original_size.0,
            prep.original_size.1
        );

        Ok(DetectionOutput {
            detections,
            original_size: prep.original_size,
        })
    }
}

impl LandmarkDetector for YuNetDetector {
    fn detect_landmarks(&self, image: &DynamicImage) -> Result<Vec<NormalizedLandmark>> {
        Ok(self.detect_image(image)?.primary_landmarks())
    }
}
