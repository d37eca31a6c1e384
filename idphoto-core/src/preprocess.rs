//! Preprocessing utilities for preparing images for YuNet inference.
//!
//! The source is resized to the model input, converted into the BGR CHW layout YuNet was
//! trained on, and the scale factors needed to map detections back are recorded.

use std::borrow::Cow;

use anyhow::Result;
use image::{DynamicImage, GenericImageView, RgbImage, imageops::FilterType};
use tract_onnx::prelude::Tensor;

use idphoto_utils::{
    compute_resize_scales, config::DetectorSettings, resize_image, rgb_to_bgr_chw, timing_guard,
};

/// Desired input resolution for YuNet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputSize {
    pub width: u32,
    pub height: u32,
}

impl InputSize {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl Default for InputSize {
    fn default() -> Self {
        Self {
            width: 640,
            height: 640,
        }
    }
}

impl From<&DetectorSettings> for InputSize {
    fn from(settings: &DetectorSettings) -> Self {
        InputSize::new(settings.input_width, settings.input_height)
    }
}

/// Configuration for preprocessing an image before inference.
#[derive(Debug, Clone)]
pub struct PreprocessConfig {
    pub input_size: InputSize,
    /// Filter used to shrink the source to the model input.
    pub filter: FilterType,
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        Self {
            input_size: InputSize::default(),
            filter: FilterType::Triangle,
        }
    }
}

/// Output of preprocessing: tensor plus metadata for rescaling detections.
#[derive(Debug)]
pub struct PreprocessOutput {
    /// `[1, 3, H, W]` BGR tensor with values in `0.0..=255.0`.
    pub tensor: Tensor,
    /// Multiply model-space x coordinates by this to get source pixels.
    pub scale_x: f32,
    /// Multiply model-space y coordinates by this to get source pixels.
    pub scale_y: f32,
    pub original_size: (u32, u32),
}

/// Preprocess an in-memory image into a YuNet-ready tensor matching OpenCV's `blobFromImage`.
pub fn preprocess_dynamic_image(
    image: &DynamicImage,
    config: &PreprocessConfig,
) -> Result<PreprocessOutput> {
    let _guard = timing_guard("idphoto_core::preprocess", log::Level::Trace);
    let input_w = config.input_size.width;
    let input_h = config.input_size.height;
    anyhow::ensure!(
        input_w > 0 && input_h > 0,
        "input dimensions must be greater than zero"
    );

    let (orig_w, orig_h) = image.dimensions();
    anyhow::ensure!(
        orig_w > 0 && orig_h > 0,
        "source image dimensions must be greater than zero"
    );
    let resized_rgb: Cow<'_, RgbImage> = if orig_w == input_w && orig_h == input_h {
        match image.as_rgb8() {
            Some(rgb) => Cow::Borrowed(rgb),
            None => Cow::Owned(image.to_rgb8()),
        }
    } else {
        Cow::Owned(resize_image(image, input_w, input_h, config.filter))
    };
    let chw = rgb_to_bgr_chw(&resized_rgb);

    let shape = [1usize, 3, input_h as usize, input_w as usize];
    let (data, offset) = chw.into_raw_vec_and_offset();
    debug_assert_eq!(offset, Some(0), "expected contiguous array");
    let tensor = Tensor::from_shape(&shape, &data)
        .map_err(|e| anyhow::anyhow!("failed to build tensor: {e}"))?;

    let (scale_x, scale_y) = compute_resize_scales((orig_w, orig_h), (input_w, input_h))?;

    Ok(PreprocessOutput {
        tensor,
        scale_x,
        scale_y,
        original_size: (orig_w, orig_h),
    })
}
