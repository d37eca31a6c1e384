//! Flat-color background replacement.
//!
//! The subject is cut out by a [`SubjectSegmenter`] and laid "over" an opaque canvas of the
//! requested color. Segmenters speak PNG in both directions so any matting backend, local
//! or remote, can sit behind the trait.

use image::{DynamicImage, GenericImageView, Rgb, RgbImage, RgbaImage};
use log::debug;

use crate::error::PhotoError;
use idphoto_utils::{RgbaColor, decode_image, encode_png, parse_hex_color, timing_guard};

/// Subject/background separation.
///
/// Receives the source as lossless PNG and returns a PNG of the same dimensions whose alpha
/// channel marks the subject (255) and the background (0).
pub trait SubjectSegmenter: Send + Sync {
    fn segment_subject(&self, png: &[u8]) -> anyhow::Result<Vec<u8>>;
}

impl<T: SubjectSegmenter + ?Sized> SubjectSegmenter for std::sync::Arc<T> {
    fn segment_subject(&self, png: &[u8]) -> anyhow::Result<Vec<u8>> {
        (**self).segment_subject(png)
    }
}

/// Parse a background color, mapping failure to [`PhotoError::InvalidColorSpec`].
pub fn parse_background_color(hex: &str) -> Result<RgbaColor, PhotoError> {
    parse_hex_color(hex).ok_or_else(|| PhotoError::InvalidColorSpec(hex.to_string()))
}

/// Replace everything but the subject with the flat color `hex` (`#RRGGBB` or `RRGGBB`).
///
/// The color is validated before the segmenter is called. Any segmenter failure, or a
/// result that does not decode to the source dimensions, is reported as
/// [`PhotoError::BackgroundReplacementFailed`].
pub fn replace_background(
    image: &DynamicImage,
    segmenter: &dyn SubjectSegmenter,
    hex: &str,
) -> Result<RgbImage, PhotoError> {
    let background = parse_background_color(hex)?;
    let _guard = timing_guard("idphoto_core::replace_background", log::Level::Debug);

    let png = encode_png(image)
        .map_err(|err| PhotoError::BackgroundReplacementFailed(format!("{err:#}")))?;
    let matte_bytes = segmenter
        .segment_subject(&png)
        .map_err(|err| PhotoError::BackgroundReplacementFailed(format!("{err:#}")))?;
    let matte = decode_image(&matte_bytes)
        .map_err(|err| PhotoError::BackgroundReplacementFailed(format!("{err:#}")))?;

    if matte.dimensions() != image.dimensions() {
        let (mw, mh) = matte.dimensions();
        let (iw, ih) = image.dimensions();
        return Err(PhotoError::BackgroundReplacementFailed(format!(
            "segmenter returned {mw}x{mh} for a {iw}x{ih} source"
        )));
    }

    debug!("Compositing subject over {}", background);
    Ok(composite_over(&matte.to_rgba8(), background))
}

/// "Over" composite of `foreground` onto an opaque canvas of `background`, alpha dropped.
///
/// Per channel `out = round((fg * a + bg * (255 - a)) / 255)`, so alpha 0 yields exactly the
/// background color and alpha 255 exactly the foreground color.
pub fn composite_over(foreground: &RgbaImage, background: RgbaColor) -> RgbImage {
    let bg = [
        u32::from(background.red),
        u32::from(background.green),
        u32::from(background.blue),
    ];
    RgbImage::from_fn(foreground.width(), foreground.height(), |x, y| {
        let px = foreground.get_pixel(x, y);
        let a = u32::from(px[3]);
        let inv = 255 - a;
        let blend = |c: usize| ((u32::from(px[c]) * a + bg[c] * inv + 127) / 255) as u8;
        Rgb([blend(0), blend(1), blend(2)])
    })
}
