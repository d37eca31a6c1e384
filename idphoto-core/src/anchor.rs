//! Face anchor resolution.
//!
//! Turns the normalized landmark set reported by a [`LandmarkDetector`] into a padded
//! pixel rectangle around the head. The padding is asymmetric: more room above the face
//! than below, so hair and forehead end up inside the anchor.

use image::{DynamicImage, GenericImageView};
use log::debug;

use crate::error::PhotoError;
use idphoto_utils::timing_guard;

/// A landmark position normalized by the source width and height.
///
/// Values are nominally in `[0, 1]`; detectors may report points slightly outside the
/// frame for faces touching the border.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NormalizedLandmark {
    pub x: f32,
    pub y: f32,
}

impl NormalizedLandmark {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// Source of face landmarks.
///
/// Implementations report the landmarks of at most one face, in any order. An empty
/// vector means "no face"; `Err` is reserved for the detector itself failing.
pub trait LandmarkDetector: Send + Sync {
    fn detect_landmarks(&self, image: &DynamicImage) -> anyhow::Result<Vec<NormalizedLandmark>>;
}

impl<T: LandmarkDetector + ?Sized> LandmarkDetector for std::sync::Arc<T> {
    fn detect_landmarks(&self, image: &DynamicImage) -> anyhow::Result<Vec<NormalizedLandmark>> {
        (**self).detect_landmarks(image)
    }
}

/// Detector that never finds a face. Every crop falls back to the centered strategy.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoFaceDetector;

impl LandmarkDetector for NoFaceDetector {
    fn detect_landmarks(&self, _image: &DynamicImage) -> anyhow::Result<Vec<NormalizedLandmark>> {
        Ok(Vec::new())
    }
}

/// Pixel rectangle around the detected head, in source coordinates.
///
/// Always satisfies `0 <= min_x < max_x <= width` and `0 <= min_y < max_y <= height`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnchorRect {
    pub min_x: u32,
    pub min_y: u32,
    pub max_x: u32,
    pub max_y: u32,
}

impl AnchorRect {
    /// Zero for an inverted rectangle.
    pub fn width(&self) -> u32 {
        self.max_x.saturating_sub(self.min_x)
    }

    pub fn height(&self) -> u32 {
        self.max_y.saturating_sub(self.min_y)
    }

    /// `true` when the rectangle has area and lies inside a `width` x `height` image.
    pub fn fits_within(&self, width: u32, height: u32) -> bool {
        self.min_x < self.max_x
            && self.min_y < self.max_y
            && self.max_x <= width
            && self.max_y <= height
    }

    /// Integer center, rounding toward the top-left.
    pub fn center(&self) -> (u32, u32) {
        (
            self.min_x + self.width() / 2,
            self.min_y + self.height() / 2,
        )
    }
}

/// Pixels added around the raw landmark bounding box before clamping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnchorMargins {
    pub left: u32,
    pub top: u32,
    pub right: u32,
    pub bottom: u32,
}

impl Default for AnchorMargins {
    fn default() -> Self {
        Self {
            left: 20,
            top: 40,
            right: 20,
            bottom: 20,
        }
    }
}

/// Ask `detector` for landmarks and derive the anchor with the default margins.
///
/// Returns `Ok(None)` when no face is found.
pub fn resolve_anchor(
    detector: &dyn LandmarkDetector,
    image: &DynamicImage,
) -> Result<Option<AnchorRect>, PhotoError> {
    resolve_anchor_with_margins(detector, image, AnchorMargins::default())
}

/// [`resolve_anchor`] with explicit margins.
pub fn resolve_anchor_with_margins(
    detector: &dyn LandmarkDetector,
    image: &DynamicImage,
    margins: AnchorMargins,
) -> Result<Option<AnchorRect>, PhotoError> {
    let _guard = timing_guard("idphoto_core::resolve_anchor", log::Level::Debug);
    let landmarks = detector
        .detect_landmarks(image)
        .map_err(PhotoError::Detection)?;
    let (width, height) = image.dimensions();
    let anchor = anchor_from_landmarks(&landmarks, width, height, margins);
    match anchor {
        Some(rect) => debug!(
            "Face anchor {:?} from {} landmarks on {}x{} image",
            rect,
            landmarks.len(),
            width,
            height
        ),
        None => debug!("No face anchor on {}x{} image", width, height),
    }
    Ok(anchor)
}

/// Pure geometry behind [`resolve_anchor`].
///
/// Landmark coordinates are scaled to pixels and truncated toward zero, the bounding box
/// is widened by `margins`, and every edge is clamped to the image. Non-finite landmarks
/// are ignored. Returns `None` when nothing usable remains or the clamped box has no area.
///
/// ```rust
/// # use idphoto_core::anchor::{anchor_from_landmarks, AnchorMargins, NormalizedLandmark};
/// let landmarks = [NormalizedLandmark::new(0.4, 0.4), NormalizedLandmark::new(0.6, 0.6)];
/// let rect = anchor_from_landmarks(&landmarks, 1000, 1000, AnchorMargins::default()).unwrap();
/// assert_eq!((rect.min_x, rect.min_y, rect.max_x, rect.max_y), (380, 360, 620, 620));
/// ```
pub fn anchor_from_landmarks(
    landmarks: &[NormalizedLandmark],
    width: u32,
    height: u32,
    margins: AnchorMargins,
) -> Option<AnchorRect> {
    if width == 0 || height == 0 {
        return None;
    }

    let mut points = landmarks
        .iter()
        .filter(|lm| lm.x.is_finite() && lm.y.is_finite());
    let first = points.next()?;
    let (mut lo_x, mut hi_x, mut lo_y, mut hi_y) = (first.x, first.x, first.y, first.y);
    for lm in points {
        lo_x = lo_x.min(lm.x);
        hi_x = hi_x.max(lm.x);
        lo_y = lo_y.min(lm.y);
        hi_y = hi_y.max(lm.y);
    }

    let (w, h) = (i64::from(width), i64::from(height));
    let to_px = |norm: f32, extent: i64| (f64::from(norm) * extent as f64) as i64;

    let min_x = (to_px(lo_x, w) - i64::from(margins.left)).clamp(0, w);
    let max_x = (to_px(hi_x, w) + i64::from(margins.right)).clamp(0, w);
    let min_y = (to_px(lo_y, h) - i64::from(margins.top)).clamp(0, h);
    let max_y = (to_px(hi_y, h) + i64::from(margins.bottom)).clamp(0, h);

    if max_x <= min_x || max_y <= min_y {
        return None;
    }

    Some(AnchorRect {
        min_x: min_x as u32,
        min_y: min_y as u32,
        max_x: max_x as u32,
        max_y: max_y as u32,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbImage;

    struct FixedLandmarks(Vec<NormalizedLandmark>);

    impl LandmarkDetector for FixedLandmarks {
        fn detect_landmarks(&self, _: &DynamicImage) -> anyhow::Result<Vec<NormalizedLandmark>> {
            Ok(self.0.clone())
        }
    }

    struct Failing;

    impl LandmarkDetector for Failing {
        fn detect_landmarks(&self, _: &DynamicImage) -> anyhow::Result<Vec<NormalizedLandmark>> {
            anyhow::bail!("model crashed")
        }
    }

    fn blank(w: u32, h: u32) -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::new(w, h))
    }

    #[test]
    fn applies_asymmetric_margins() {
        let detector = FixedLandmarks(vec![
            NormalizedLandmark::new(0.25, 0.25),
            NormalizedLandmark::new(0.50, 0.50),
            NormalizedLandmark::new(0.75, 0.75),
        ]);
        let rect = resolve_anchor(&detector, &blank(1000, 800))
            .expect("detector ok")
            .expect("face present");
        assert_eq!(rect.min_x, 230);
        assert_eq!(rect.max_x, 770);
        assert_eq!(rect.min_y, 160);
        assert_eq!(rect.max_y, 620);
    }

    #[test]
    fn clamps_to_image_bounds() {
        let landmarks = [
            NormalizedLandmark::new(-0.02, 0.01),
            NormalizedLandmark::new(1.05, 0.99),
        ];
        let rect = anchor_from_landmarks(&landmarks, 640, 480, AnchorMargins::default())
            .expect("anchor");
        assert_eq!((rect.min_x, rect.min_y), (0, 0));
        assert_eq!((rect.max_x, rect.max_y), (640, 480));
    }

    #[test]
    fn empty_landmarks_mean_no_face() {
        let detector = FixedLandmarks(Vec::new());
        assert!(resolve_anchor(&detector, &blank(10, 10)).unwrap().is_none());
        assert!(resolve_anchor(&NoFaceDetector, &blank(10, 10)).unwrap().is_none());
    }

    #[test]
    fn zero_sized_image_has_no_anchor() {
        let landmarks = [NormalizedLandmark::new(0.5, 0.5)];
        assert!(anchor_from_landmarks(&landmarks, 0, 100, AnchorMargins::default()).is_none());
    }

    #[test]
    fn single_point_still_gets_padded_box() {
        let landmarks = [NormalizedLandmark::new(0.5, 0.5)];
        let rect = anchor_from_landmarks(&landmarks, 200, 200, AnchorMargins::default())
            .expect("anchor");
        assert_eq!((rect.width(), rect.height()), (40, 60));
        assert_eq!(rect.center(), (100, 90));
    }

    #[test]
    fn non_finite_points_are_ignored() {
        let landmarks = [NormalizedLandmark::new(f32::NAN, 0.5)];
        assert!(anchor_from_landmarks(&landmarks, 100, 100, AnchorMargins::default()).is_none());
    }

    #[test]
    fn fits_within_rejects_inverted_and_overhanging_rects() {
        let inverted = AnchorRect {
            min_x: 60,
            min_y: 10,
            max_x: 40,
            max_y: 50,
        };
        assert_eq!(inverted.width(), 0);
        assert!(!inverted.fits_within(100, 100));

        let overhanging = AnchorRect {
            min_x: 10,
            min_y: 10,
            max_x: 120,
            max_y: 50,
        };
        assert!(!overhanging.fits_within(100, 100));
        assert!(overhanging.fits_within(120, 50));
    }

    #[test]
    fn detector_errors_propagate() {
        let err = resolve_anchor(&Failing, &blank(10, 10)).unwrap_err();
        assert!(matches!(err, PhotoError::Detection(_)));
    }
}
