//! Crop geometry for fixed-aspect ID photos.
//!
//! Two strategies, both matching the target aspect ratio before clamping:
//!
//! * **Face anchored**: the crop is three times the anchor height, centered on the anchor.
//!   If that comes out narrower than the anchor itself (very wide targets), the crop is
//!   instead 1.6 times the anchor width and the height follows from the ratio.
//! * **Centered**: with no anchor, the largest centered window of the target ratio.
//!
//! All arithmetic is integer except the ratio multiply, which truncates toward zero. Clamping
//! to the image may change the realized aspect ratio; the resize step absorbs that.

use crate::{anchor::AnchorRect, error::PhotoError};

/// Crop height as a multiple of the anchor height.
const HEIGHT_FACTOR: f64 = 3.0;
/// Crop width as a multiple of the anchor width when the height rule is too narrow.
const WIDTH_FALLBACK_FACTOR: f64 = 1.6;

/// Exact output size of a framed photo. Both dimensions are at least 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TargetSize {
    width: u32,
    height: u32,
}

impl TargetSize {
    /// Validates and builds a target size.
    ///
    /// ```rust
    /// # use idphoto_core::cropper::TargetSize;
    /// assert!(TargetSize::new(413, 531).is_ok());
    /// assert!(TargetSize::new(0, 531).is_err());
    /// ```
    pub fn new(width: u32, height: u32) -> Result<Self, PhotoError> {
        if width == 0 || height == 0 {
            return Err(PhotoError::InvalidTargetSize { width, height });
        }
        Ok(Self { width, height })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Width over height.
    pub fn ratio(&self) -> f64 {
        f64::from(self.width) / f64::from(self.height)
    }
}

/// Pixel rectangle inside the source image; `right` and `bottom` are exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropRect {
    pub left: u32,
    pub top: u32,
    pub right: u32,
    pub bottom: u32,
}

impl CropRect {
    pub fn width(&self) -> u32 {
        self.right - self.left
    }

    pub fn height(&self) -> u32 {
        self.bottom - self.top
    }
}

/// Which rule produced a [`CropPlan`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CropStrategy {
    /// Sized from the face anchor. `widened` is set when the width fallback kicked in.
    FaceAnchored { widened: bool },
    /// Largest centered window of the target ratio.
    Centered,
}

/// Result of crop planning: the clamped rectangle plus the size that was asked for before
/// clamping, which is what carries the target aspect ratio.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropPlan {
    pub rect: CropRect,
    pub requested_width: u32,
    pub requested_height: u32,
    pub strategy: CropStrategy,
}

/// Plan the crop for an `img_w` x `img_h` source.
///
/// The returned rectangle is always non-empty and lies inside the image. An anchor that is
/// inverted, empty or reaches past the image edge is rejected rather than clamped.
///
/// ```rust
/// # use idphoto_core::anchor::AnchorRect;
/// # use idphoto_core::cropper::{plan_crop, CropRect, TargetSize};
/// let anchor = AnchorRect { min_x: 400, min_y: 300, max_x: 600, max_y: 700 };
/// let plan = plan_crop(1000, 1000, Some(anchor), TargetSize::new(413, 531).unwrap()).unwrap();
/// assert_eq!((plan.requested_width, plan.requested_height), (933, 1200));
/// assert_eq!(plan.rect, CropRect { left: 34, top: 0, right: 967, bottom: 1000 });
/// ```
pub fn plan_crop(
    img_w: u32,
    img_h: u32,
    anchor: Option<AnchorRect>,
    target: TargetSize,
) -> Result<CropPlan, PhotoError> {
    if img_w == 0 || img_h == 0 {
        return Err(PhotoError::DegenerateCropGeometry {
            width: img_w,
            height: img_h,
            reason: "source image has no pixels".into(),
        });
    }

    if let Some(anchor) = anchor.filter(|a| !a.fits_within(img_w, img_h)) {
        return Err(PhotoError::DegenerateCropGeometry {
            width: img_w,
            height: img_h,
            reason: format!("anchor {anchor:?} is empty or outside the image"),
        });
    }

    let plan = match anchor {
        Some(anchor) => plan_anchored(img_w, img_h, anchor, target),
        None => plan_centered(img_w, img_h, target),
    };

    let rect = plan.rect;
    if rect.right <= rect.left || rect.bottom <= rect.top || rect.right > img_w || rect.bottom > img_h
    {
        return Err(PhotoError::DegenerateCropGeometry {
            width: img_w,
            height: img_h,
            reason: format!("planned rectangle {rect:?} is empty or out of bounds"),
        });
    }
    Ok(plan)
}

fn plan_anchored(img_w: u32, img_h: u32, anchor: AnchorRect, target: TargetSize) -> CropPlan {
    let ratio = target.ratio();
    let box_w = i64::from(anchor.width());
    let box_h = i64::from(anchor.height());
    let (cx, cy) = anchor.center();

    let mut crop_h = (box_h as f64 * HEIGHT_FACTOR) as i64;
    let mut crop_w = (crop_h as f64 * ratio) as i64;
    let widened = crop_w < box_w;
    if widened {
        crop_w = (box_w as f64 * WIDTH_FALLBACK_FACTOR) as i64;
        crop_h = (crop_w as f64 / ratio) as i64;
    }
    let crop_w = crop_w.max(1);
    let crop_h = crop_h.max(1);

    let (w, h) = (i64::from(img_w), i64::from(img_h));
    let left = (i64::from(cx) - crop_w / 2).clamp(0, w - 1);
    let top = (i64::from(cy) - crop_h / 2).clamp(0, h - 1);
    let right = (left + crop_w).min(w);
    let bottom = (top + crop_h).min(h);

    CropPlan {
        rect: CropRect {
            left: left as u32,
            top: top as u32,
            right: right as u32,
            bottom: bottom as u32,
        },
        requested_width: saturate_u32(crop_w),
        requested_height: saturate_u32(crop_h),
        strategy: CropStrategy::FaceAnchored { widened },
    }
}

fn plan_centered(img_w: u32, img_h: u32, target: TargetSize) -> CropPlan {
    let ratio = target.ratio();
    let (w, h) = (f64::from(img_w), f64::from(img_h));

    let rect = if w / h > ratio {
        let new_w = ((h * ratio) as u32).clamp(1, img_w);
        let left = (img_w - new_w) / 2;
        CropRect {
            left,
            top: 0,
            right: left + new_w,
            bottom: img_h,
        }
    } else {
        let new_h = ((w / ratio) as u32).clamp(1, img_h);
        let top = (img_h - new_h) / 2;
        CropRect {
            left: 0,
            top,
            right: img_w,
            bottom: top + new_h,
        }
    };

    CropPlan {
        rect,
        requested_width: rect.width(),
        requested_height: rect.height(),
        strategy: CropStrategy::Centered,
    }
}

fn saturate_u32(value: i64) -> u32 {
    value.clamp(0, i64::from(u32::MAX)) as u32
}
