//! Automatic tone and detail correction applied to every upload before framing.
//!
//! Two deterministic steps: a per-channel auto-contrast that clips a small percentage of
//! the darkest and brightest pixels and stretches the rest to the full range, followed by a
//! mild 3x3 sharpen. Phone portraits under indoor light come out flat and slightly soft;
//! this brings them closer to what a photo booth produces.

use image::{DynamicImage, Rgb, RgbImage};

/// Center weight of the sharpen kernel; the eight neighbours weigh `-2` each and the
/// result is divided by `SHARPEN_CENTER - 16`.
const SHARPEN_CENTER: i32 = 32;

/// Settings for [`auto_enhance`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EnhancementSettings {
    /// Percentage of pixels clipped from each end of every channel's histogram (0..50).
    pub cutoff_pct: f32,
    /// Apply the 3x3 sharpen after the contrast stretch.
    pub sharpen: bool,
}

impl Default for EnhancementSettings {
    fn default() -> Self {
        Self {
            cutoff_pct: 1.0,
            sharpen: true,
        }
    }
}

/// Auto-contrast then sharpen. Always returns an RGB image with the input's dimensions.
pub fn auto_enhance(image: &DynamicImage, settings: &EnhancementSettings) -> RgbImage {
    let mut rgb = image.to_rgb8();
    apply_autocontrast(&mut rgb, settings.cutoff_pct);
    if settings.sharpen {
        rgb = apply_sharpen(&rgb);
    }
    rgb
}

fn identity_lut() -> [u8; 256] {
    let mut lut = [0u8; 256];
    for (i, item) in lut.iter_mut().enumerate() {
        *item = i as u8;
    }
    lut
}

/// Build the stretch LUT for one channel after discarding `cutoff_pct` percent of the
/// population from both tails.
fn build_autocontrast_lut(hist: &[u32; 256], cutoff_pct: f32) -> [u8; 256] {
    let total: u64 = hist.iter().map(|&c| c as u64).sum();
    if total == 0 {
        return identity_lut();
    }

    let mut trimmed = *hist;
    let cut = (total as f64 * f64::from(cutoff_pct.clamp(0.0, 49.0)) / 100.0).floor() as u64;
    trim_tail(&mut trimmed, cut, 0..256);
    trim_tail(&mut trimmed, cut, (0..256).rev());

    let lo = trimmed.iter().position(|&c| c > 0);
    let hi = trimmed.iter().rposition(|&c| c > 0);
    let (Some(lo), Some(hi)) = (lo, hi) else {
        return identity_lut();
    };
    if hi <= lo {
        return identity_lut();
    }

    let scale = 255.0 / (hi - lo) as f32;
    let offset = -(lo as f32) * scale;
    let mut lut = [0u8; 256];
    for (i, item) in lut.iter_mut().enumerate() {
        *item = (i as f32).mul_add(scale, offset).floor().clamp(0.0, 255.0) as u8;
    }
    lut
}

fn trim_tail(hist: &mut [u32; 256], mut cut: u64, order: impl Iterator<Item = usize>) {
    for idx in order {
        if cut == 0 {
            break;
        }
        let count = hist[idx] as u64;
        if cut > count {
            cut -= count;
            hist[idx] = 0;
        } else {
            hist[idx] = (count - cut) as u32;
            cut = 0;
        }
    }
}

fn apply_autocontrast(buf: &mut RgbImage, cutoff_pct: f32) {
    let mut hists = [[0u32; 256]; 3];
    for px in buf.pixels() {
        for (c, hist) in hists.iter_mut().enumerate() {
            hist[px[c] as usize] += 1;
        }
    }
    let luts = hists.map(|hist| build_autocontrast_lut(&hist, cutoff_pct));

    for px in buf.pixels_mut() {
        for (c, lut) in luts.iter().enumerate() {
            px[c] = lut[px[c] as usize];
        }
    }
}

/// 3x3 sharpen of the interior; the outermost rows and columns are copied unchanged.
fn apply_sharpen(src: &RgbImage) -> RgbImage {
    let (w, h) = src.dimensions();
    if w < 3 || h < 3 {
        return src.clone();
    }
    let divisor = SHARPEN_CENTER - 16;

    RgbImage::from_fn(w, h, |x, y| {
        if x == 0 || y == 0 || x == w - 1 || y == h - 1 {
            return *src.get_pixel(x, y);
        }
        let mut acc = [0i32; 3];
        for sy in y - 1..=y + 1 {
            for sx in x - 1..=x + 1 {
                let weight = if sx == x && sy == y { SHARPEN_CENTER } else { -2 };
                let p = src.get_pixel(sx, sy);
                for c in 0..3 {
                    acc[c] += weight * p[c] as i32;
                }
            }
        }
        Rgb(acc.map(|v| ((v + divisor / 2).div_euclid(divisor)).clamp(0, 255) as u8))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn autocontrast_stretches_narrow_range() {
        let mut img = RgbImage::new(4, 1);
        for x in 0..2 {
            img.put_pixel(x, 0, Rgb([100, 100, 100]));
        }
        for x in 2..4 {
            img.put_pixel(x, 0, Rgb([150, 150, 150]));
        }
        apply_autocontrast(&mut img, 0.0);
        assert_eq!(img.get_pixel(0, 0)[0], 0);
        assert_eq!(img.get_pixel(3, 0)[0], 255);
    }

    #[test]
    fn flat_channel_is_left_alone() {
        let mut img = RgbImage::from_pixel(3, 3, Rgb([90, 90, 90]));
        apply_autocontrast(&mut img, 1.0);
        assert!(img.pixels().all(|p| p.0 == [90, 90, 90]));
    }

    #[test]
    fn cutoff_ignores_outliers() {
        // 200 mid-grey pixels with a single black and a single white outlier.
        let mut img = RgbImage::from_fn(202, 1, |x, _| {
            let v = if x % 2 == 0 { 110 } else { 140 };
            Rgb([v, v, v])
        });
        img.put_pixel(0, 0, Rgb([0, 0, 0]));
        img.put_pixel(201, 0, Rgb([255, 255, 255]));

        apply_autocontrast(&mut img, 1.0);
        assert_eq!(img.get_pixel(2, 0)[0], 0, "110 becomes the new black point");
        assert_eq!(img.get_pixel(1, 0)[0], 255, "140 becomes the new white point");
    }

    #[test]
    fn sharpen_keeps_flat_regions_unchanged() {
        let img = RgbImage::from_pixel(5, 5, Rgb([120, 60, 30]));
        let out = apply_sharpen(&img);
        assert!(out.pixels().all(|p| p.0 == [120, 60, 30]));
    }

    #[test]
    fn sharpen_boosts_an_isolated_bright_pixel() {
        let mut img = RgbImage::from_pixel(3, 3, Rgb([100, 100, 100]));
        img.put_pixel(1, 1, Rgb([140, 140, 140]));
        let out = apply_sharpen(&img);
        assert!(out.get_pixel(1, 1)[0] > 140);
        assert_eq!(out.get_pixel(0, 0)[0], 100, "border is not filtered");
    }

    #[test]
    fn sharpen_copies_border_pixels_through() {
        let img = RgbImage::from_fn(5, 4, |x, y| {
            let v = (x * 40 + y * 25) as u8;
            Rgb([v, 255 - v, v / 2])
        });
        let out = apply_sharpen(&img);
        for (x, y, px) in out.enumerate_pixels() {
            if x == 0 || y == 0 || x == 4 || y == 3 {
                assert_eq!(px, img.get_pixel(x, y), "border pixel ({x}, {y})");
            }
        }

        let thin = RgbImage::from_fn(2, 6, |x, y| Rgb([(x * 90 + y * 30) as u8, 0, 0]));
        assert_eq!(apply_sharpen(&thin), thin);
    }

    #[test]
    fn pipeline_preserves_dimensions() {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(7, 3, Rgb([10, 20, 30])));
        let out = auto_enhance(&img, &EnhancementSettings::default());
        assert_eq!(out.dimensions(), (7, 3));
    }
}
