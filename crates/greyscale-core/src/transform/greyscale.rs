//! Luminance greyscale conversion.

use image::{DynamicImage, GrayAlphaImage, GrayImage, LumaA};

use super::TransformAction;
use crate::error::TransformError;

/// Replaces each pixel's colour with its luminance.
///
/// Uses the 0.299/0.587/0.114 weights in 16-bit fixed point. The weights sum
/// to exactly 65536, so a pixel that is already grey maps to itself and the
/// action is idempotent. Alpha is carried over unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct GreyscaleAction;

const RED_WEIGHT: u32 = 19595;
const GREEN_WEIGHT: u32 = 38470;
const BLUE_WEIGHT: u32 = 7471;

/// Luminance of one 8-bit RGB triple.
pub fn luminance(r: u8, g: u8, b: u8) -> u8 {
    let y = RED_WEIGHT * u32::from(r) + GREEN_WEIGHT * u32::from(g) + BLUE_WEIGHT * u32::from(b);
    ((y + (1 << 15)) >> 16) as u8
}

impl TransformAction for GreyscaleAction {
    fn name(&self) -> &str {
        "greyscale"
    }

    fn apply(&self, image: &DynamicImage) -> Result<DynamicImage, TransformError> {
        let rgba = image.to_rgba8();
        let (width, height) = rgba.dimensions();

        if image.color().has_alpha() {
            let mut out = GrayAlphaImage::new(width, height);
            for (x, y, px) in rgba.enumerate_pixels() {
                let [r, g, b, a] = px.0;
                out.put_pixel(x, y, LumaA([luminance(r, g, b), a]));
            }
            Ok(DynamicImage::ImageLumaA8(out))
        } else {
            let out = GrayImage::from_fn(width, height, |x, y| {
                let [r, g, b, _] = rgba.get_pixel(x, y).0;
                image::Luma([luminance(r, g, b)])
            });
            Ok(DynamicImage::ImageLuma8(out))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GenericImageView, Rgb, RgbImage, Rgba, RgbaImage};

    fn gradient() -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_fn(16, 8, |x, y| {
            Rgb([(x * 16) as u8, (y * 32) as u8, ((x + y) * 7) as u8])
        }))
    }

    #[test]
    fn test_luminance_extremes() {
        assert_eq!(luminance(0, 0, 0), 0);
        assert_eq!(luminance(255, 255, 255), 255);
    }

    #[test]
    fn test_grey_pixels_are_fixed_points() {
        for v in 0..=255u8 {
            assert_eq!(luminance(v, v, v), v);
        }
    }

    #[test]
    fn test_weights_favour_green() {
        assert!(luminance(0, 255, 0) > luminance(255, 0, 0));
        assert!(luminance(255, 0, 0) > luminance(0, 0, 255));
    }

    #[test]
    fn test_greyscale_is_idempotent() {
        let once = GreyscaleAction.apply(&gradient()).unwrap();
        let twice = GreyscaleAction.apply(&once).unwrap();
        assert_eq!(once.dimensions(), twice.dimensions());
        assert_eq!(once.as_bytes(), twice.as_bytes());
    }

    #[test]
    fn test_output_is_luma() {
        let out = GreyscaleAction.apply(&gradient()).unwrap();
        assert!(matches!(out, DynamicImage::ImageLuma8(_)));
        assert_eq!(out.dimensions(), (16, 8));
    }

    #[test]
    fn test_alpha_is_preserved() {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(2, 2, Rgba([10, 200, 30, 77])));
        let out = GreyscaleAction.apply(&img).unwrap();
        let px = out.get_pixel(1, 1);
        assert_eq!(px.0[3], 77);
        assert_eq!(px.0[0], luminance(10, 200, 30));
        let twice = GreyscaleAction.apply(&out).unwrap();
        assert_eq!(out.as_bytes(), twice.as_bytes());
    }
}
