use anyhow::{Context, Result};
use image::{DynamicImage, RgbImage, imageops::FilterType};
use ndarray::Array3;

/// Decode an in-memory encoded image (PNG, JPEG, WebP), guessing the format from its header.
pub fn decode_image(bytes: &[u8]) -> Result<DynamicImage> {
    image::load_from_memory(bytes).context("failed to decode image bytes")
}

/// Resize an image to exactly `width` x `height` using the provided filter.
pub fn resize_image(image: &DynamicImage, width: u32, height: u32, filter: FilterType) -> RgbImage {
    image.resize_exact(width, height, filter).to_rgb8()
}

/// Convert an RGB image into a BGR CHW array with values matching OpenCV's `blobFromImage`.
///
/// Values stay in `0.0..=255.0`; YuNet expects unnormalized BGR input.
pub fn rgb_to_bgr_chw(image: &RgbImage) -> Array3<f32> {
    let (width, height) = image.dimensions();
    let mut array = Array3::<f32>::zeros((3, height as usize, width as usize));
    for (x, y, pixel) in image.enumerate_pixels() {
        let (xi, yi) = (x as usize, y as usize);
        array[(0, yi, xi)] = pixel[2] as f32;
        array[(1, yi, xi)] = pixel[1] as f32;
        array[(2, yi, xi)] = pixel[0] as f32;
    }
    array
}

/// Convert an RGB image into an RGB CHW array normalized the way ImageNet-trained
/// saliency models expect.
///
/// Each pixel is first divided by the brightest channel value in the whole image, then
/// standardized per channel with `mean` and `std`.
pub fn rgb_to_normalized_chw(image: &RgbImage, mean: [f32; 3], std: [f32; 3]) -> Array3<f32> {
    let (width, height) = image.dimensions();
    let peak = image.as_raw().iter().copied().max().unwrap_or(0).max(1) as f32;
    let mut array = Array3::<f32>::zeros((3, height as usize, width as usize));
    for (x, y, pixel) in image.enumerate_pixels() {
        let (xi, yi) = (x as usize, y as usize);
        for c in 0..3 {
            array[(c, yi, xi)] = (pixel[c] as f32 / peak - mean[c]) / std[c];
        }
    }
    array
}

/// Compute scale factors used to reproject coordinates from model space to original space.
///
/// # Arguments
///
/// * `original` - The original image's (width, height).
/// * `target` - The resized image's (width, height).
pub fn compute_resize_scales(original: (u32, u32), target: (u32, u32)) -> Result<(f32, f32)> {
    let (orig_w, orig_h) = original;
    let (target_w, target_h) = target;
    anyhow::ensure!(
        target_w > 0 && target_h > 0,
        "target dimensions must be non-zero"
    );
    anyhow::ensure!(
        orig_w > 0 && orig_h > 0,
        "original dimensions must be non-zero"
    );
    Ok((
        orig_w as f32 / target_w as f32,
        orig_h as f32 / target_h as f32,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn rgb_to_bgr_chw_swaps_channels() {
        let mut image = RgbImage::new(2, 2);
        image.put_pixel(0, 0, Rgb([0, 128, 255]));
        image.put_pixel(1, 0, Rgb([255, 128, 0]));

        let array = rgb_to_bgr_chw(&image);
        assert_eq!(array.shape(), &[3, 2, 2]);
        assert_eq!(array[(0, 0, 0)], 255.0);
        assert_eq!(array[(2, 0, 0)], 0.0);
        assert_eq!(array[(1, 0, 1)], 128.0);
    }

    #[test]
    fn normalized_chw_divides_by_peak_then_standardizes() {
        let mut image = RgbImage::from_pixel(2, 1, Rgb([0, 0, 0]));
        image.put_pixel(1, 0, Rgb([200, 100, 50]));

        let array = rgb_to_normalized_chw(&image, [0.5, 0.0, 0.0], [0.5, 1.0, 1.0]);
        assert_eq!(array.shape(), &[3, 1, 2]);
        assert!((array[(0, 0, 1)] - 1.0).abs() < 1e-6);
        assert!((array[(1, 0, 1)] - 0.5).abs() < 1e-6);
        assert!((array[(0, 0, 0)] + 1.0).abs() < 1e-6);
    }

    #[test]
    fn decode_rejects_garbage() {
        assert!(decode_image(b"definitely not an image").is_err());
    }

    #[test]
    fn compute_resize_scales_rejects_zero() {
        assert_eq!(compute_resize_scales((640, 480), (320, 240)).unwrap(), (2.0, 2.0));
        assert!(compute_resize_scales((0, 480), (320, 240)).is_err());
        assert!(compute_resize_scales((640, 480), (0, 240)).is_err());
    }
}
