//! Crop-and-resize: applies a [`CropPlan`](crate::cropper::CropPlan) to pixels.

use image::{DynamicImage, GenericImageView, RgbImage, imageops::FilterType};
use log::debug;

use crate::{
    anchor::{AnchorRect, LandmarkDetector, resolve_anchor},
    cropper::{TargetSize, plan_crop},
    error::PhotoError,
};
use idphoto_utils::timing_guard;

/// Detect the face, plan the crop and resize to exactly `target`.
pub fn crop_and_resize(
    image: &DynamicImage,
    detector: &dyn LandmarkDetector,
    target: TargetSize,
) -> Result<RgbImage, PhotoError> {
    let anchor = resolve_anchor(detector, image)?;
    crop_and_resize_with_anchor(image, anchor, target)
}

/// Same as [`crop_and_resize`] with an already resolved anchor, so one detection can serve
/// several output sizes.
pub fn crop_and_resize_with_anchor(
    image: &DynamicImage,
    anchor: Option<AnchorRect>,
    target: TargetSize,
) -> Result<RgbImage, PhotoError> {
    let _guard = timing_guard("idphoto_core::crop_and_resize", log::Level::Debug);
    let (img_w, img_h) = image.dimensions();
    let plan = plan_crop(img_w, img_h, anchor, target)?;
    let rect = plan.rect;
    debug!(
        "Cropping {}x{} -> {:?} ({:?}), resizing to {}x{}",
        img_w,
        img_h,
        rect,
        plan.strategy,
        target.width(),
        target.height()
    );

    let cropped = image.crop_imm(rect.left, rect.top, rect.width(), rect.height());
    Ok(image::imageops::resize(
        &cropped.to_rgb8(),
        target.width(),
        target.height(),
        FilterType::Lanczos3,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::anchor::{NoFaceDetector, NormalizedLandmark};
    use image::Rgb;

    struct CenterFace;

    impl LandmarkDetector for CenterFace {
        fn detect_landmarks(&self, _: &DynamicImage) -> anyhow::Result<Vec<NormalizedLandmark>> {
            Ok(vec![
                NormalizedLandmark::new(0.42, 0.34),
                NormalizedLandmark::new(0.58, 0.68),
            ])
        }
    }

    fn gradient(w: u32, h: u32) -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_fn(w, h, |x, y| {
            Rgb([(x % 256) as u8, (y % 256) as u8, 128])
        }))
    }

    #[test]
    fn output_matches_target_for_many_sizes() {
        let source = gradient(640, 480);
        for (w, h) in [(413, 531), (236, 295), (1, 1), (900, 100), (50, 2000)] {
            let target = TargetSize::new(w, h).unwrap();
            let with_face = crop_and_resize(&source, &CenterFace, target).unwrap();
            let without = crop_and_resize(&source, &NoFaceDetector, target).unwrap();
            assert_eq!(with_face.dimensions(), (w, h));
            assert_eq!(without.dimensions(), (w, h));
        }
    }

    #[test]
    fn centered_crop_samples_the_middle() {
        // Left and right thirds are red, the center strip is blue. A 1:1 crop of a 3:1
        // image keeps only the blue strip.
        let source = DynamicImage::ImageRgb8(RgbImage::from_fn(300, 100, |x, _| {
            if (100..200).contains(&x) {
                Rgb([0, 0, 255])
            } else {
                Rgb([255, 0, 0])
            }
        }));
        let out =
            crop_and_resize_with_anchor(&source, None, TargetSize::new(10, 10).unwrap()).unwrap();
        assert!(out.pixels().all(|p| p[2] > 200 && p[0] < 50));
    }

    #[test]
    fn rgba_sources_are_flattened() {
        let source = DynamicImage::ImageRgba8(image::RgbaImage::from_pixel(
            20,
            20,
            image::Rgba([10, 20, 30, 255]),
        ));
        let out =
            crop_and_resize_with_anchor(&source, None, TargetSize::new(5, 5).unwrap()).unwrap();
        assert_eq!(out.get_pixel(2, 2), &Rgb([10, 20, 30]));
    }
}
