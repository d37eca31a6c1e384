//! Salient-object matting with a U²-Net family ONNX model.
//!
//! The model sees a square, ImageNet-normalized RGB tensor and predicts a saliency map. The
//! map is min-max stretched to `0..=255`, resized back to the source with Lanczos, and used
//! directly as the alpha channel of the cut-out.

use std::path::Path;

use anyhow::{Context, Result};
use image::{
    DynamicImage, GrayImage, Luma, RgbImage, RgbaImage,
    imageops::{self, FilterType},
};
use log::debug;
use tract_onnx::prelude::Tensor;

use crate::{
    background::SubjectSegmenter,
    model::{RunnableModel, load_runnable, run_runnable},
};
use idphoto_utils::{
    config::MattingSettings, decode_image, encode_png, rgb_to_normalized_chw, timing_guard,
};

const IMAGENET_MEAN: [f32; 3] = [0.485, 0.456, 0.406];
const IMAGENET_STD: [f32; 3] = [0.229, 0.224, 0.225];

/// ONNX matting backend implementing [`SubjectSegmenter`].
#[derive(Debug)]
pub struct OnnxMatting {
    runnable: RunnableModel,
    input_size: u32,
}

impl OnnxMatting {
    /// Load a model that takes `[1, 3, input_size, input_size]` input.
    pub fn load<P: AsRef<Path>>(model_path: P, input_size: u32) -> Result<Self> {
        anyhow::ensure!(input_size > 0, "matting input size must be non-zero");
        let side = input_size as usize;
        let runnable = load_runnable(model_path.as_ref(), "matting", Some([1, 3, side, side]))?;
        Ok(Self {
            runnable,
            input_size,
        })
    }

    /// Build from persisted settings. Fails when no model path is configured.
    pub fn from_settings(settings: &MattingSettings) -> Result<Self> {
        let path = settings
            .model_path
            .as_deref()
            .ok_or_else(|| anyhow::anyhow!("no matting model path configured"))?;
        Self::load(path, settings.input_size)
    }

    /// Predict the subject mask for `image` at its own resolution.
    pub fn predict_mask(&self, image: &RgbImage) -> Result<GrayImage> {
        let _guard = timing_guard("idphoto_core::matting_inference", log::Level::Debug);
        let side = self.input_size;
        let resized = imageops::resize(image, side, side, FilterType::Lanczos3);
        let chw = rgb_to_normalized_chw(&resized, IMAGENET_MEAN, IMAGENET_STD);
        let (data, _) = chw.into_raw_vec_and_offset();
        let input = Tensor::from_shape(&[1, 3, side as usize, side as usize], &data)
            .map_err(|e| anyhow::anyhow!("failed to build matting tensor: {e}"))?;

        let outputs = run_runnable(&self.runnable, "matting", input)?;
        let first = outputs
            .first()
            .ok_or_else(|| anyhow::anyhow!("matting model produced no outputs"))?;
        let prediction = first
            .as_slice::<f32>()
            .map_err(|e| anyhow::anyhow!("matting output is not f32: {e}"))?;

        let mask = mask_from_prediction(prediction, side)?;
        Ok(imageops::resize(
            &mask,
            image.width(),
            image.height(),
            FilterType::Lanczos3,
        ))
    }
}

impl SubjectSegmenter for OnnxMatting {
    fn segment_subject(&self, png: &[u8]) -> Result<Vec<u8>> {
        let source = decode_image(png).context("matting input is not a decodable image")?;
        let rgb = source.to_rgb8();
        let mask = self.predict_mask(&rgb)?;
        let cutout = apply_mask(&rgb, &mask);
        debug!("Matted {}x{} subject", cutout.width(), cutout.height());
        encode_png(&DynamicImage::ImageRgba8(cutout))
    }
}

/// Min-max stretch the first `side * side` values of a saliency map into a grayscale mask.
///
/// A flat prediction carries no subject information and maps to a fully opaque mask, so the
/// caller keeps the original photo instead of blanking it.
pub(crate) fn mask_from_prediction(prediction: &[f32], side: u32) -> Result<GrayImage> {
    let len = (side as usize) * (side as usize);
    anyhow::ensure!(
        prediction.len() >= len,
        "matting output has {} values, expected at least {}",
        prediction.len(),
        len
    );
    let values = &prediction[..len];
    let (lo, hi) = values
        .iter()
        .filter(|v| v.is_finite())
        .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &v| {
            (lo.min(v), hi.max(v))
        });
    let range = hi - lo;

    Ok(GrayImage::from_fn(side, side, |x, y| {
        let v = values[(y * side + x) as usize];
        if !(range.is_finite() && range > f32::EPSILON) {
            return Luma([255]);
        }
        let norm = if v.is_finite() { (v - lo) / range } else { 0.0 };
        Luma([(norm * 255.0).round().clamp(0.0, 255.0) as u8])
    }))
}

/// Attach `mask` as the alpha channel of `rgb`.
pub(crate) fn apply_mask(rgb: &RgbImage, mask: &GrayImage) -> RgbaImage {
    RgbaImage::from_fn(rgb.width(), rgb.height(), |x, y| {
        let [r, g, b] = rgb.get_pixel(x, y).0;
        let alpha = mask.get_pixel_checked(x, y).map_or(255, |p| p[0]);
        image::Rgba([r, g, b, alpha])
    })
}
