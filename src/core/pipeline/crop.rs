//! Chyron crop helpers

use crate::core::pipeline::ocr::OcrError;
use crate::core::region::Rectangle;
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, GrayImage, ImageOutputFormat};
use serde::{Deserialize, Serialize};
use std::io::Cursor;

const SPEAKER_SCALE: u32 = 3;
const SPEAKER_CONTRAST: f32 = 35.0;
const SPEAKER_BRIGHTEN: i32 = 15;

/// How region numbers map to pixels.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CropUnits {
    /// Fractions of the screenshot size.
    #[default]
    Relative,
    Pixels,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Pixel rectangle for `region` on a `width` x `height` image, clipped to the image.
pub fn pixel_rect(region: &Rectangle, units: CropUnits, width: u32, height: u32) -> Option<PixelRect> {
    let (sx, sy) = match units {
        CropUnits::Relative => (width as f64, height as f64),
        CropUnits::Pixels => (1.0, 1.0),
    };

    let x = (region.x * sx).floor() as u32;
    let y = (region.y * sy).floor() as u32;
    if x >= width || y >= height {
        return None;
    }

    let w = ((region.width * sx).floor() as u32).min(width - x);
    let h = ((region.height * sy).floor() as u32).min(height - y);
    if w == 0 || h == 0 {
        return None;
    }

    Some(PixelRect {
        x,
        y,
        width: w,
        height: h,
    })
}

pub fn crop_region(image: &DynamicImage, region: &Rectangle, units: CropUnits) -> Result<DynamicImage, OcrError> {
    let rect = pixel_rect(region, units, image.width(), image.height()).ok_or(OcrError::InvalidCrop(*region))?;
    Ok(image.crop_imm(rect.x, rect.y, rect.width, rect.height))
}

/// Speaker names are small: upscale 3x, grayscale, stretch contrast, lift brightness.
pub fn prepare_speaker_crop(image: &DynamicImage) -> GrayImage {
    let (w, h) = image.dimensions();
    let scaled = image.resize_exact(
        (w * SPEAKER_SCALE).max(1),
        (h * SPEAKER_SCALE).max(1),
        FilterType::Triangle,
    );
    let gray = scaled.to_luma8();
    let contrasted = image::imageops::contrast(&gray, SPEAKER_CONTRAST);
    image::imageops::brighten(&contrasted, SPEAKER_BRIGHTEN)
}

pub fn encode_png(image: &DynamicImage) -> Result<Vec<u8>, OcrError> {
    let mut buffer = Cursor::new(Vec::new());
    image.write_to(&mut buffer, ImageOutputFormat::Png)?;
    Ok(buffer.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbImage;

    fn rect(x: f64, y: f64, w: f64, h: f64) -> Rectangle {
        Rectangle::new(x, y, w, h)
    }

    #[test]
    fn test_relative_pixel_rect() {
        let r = pixel_rect(&rect(0.02, 0.75, 0.55, 0.2), CropUnits::Relative, 1280, 720).unwrap();
        assert_eq!(
            r,
            PixelRect {
                x: 25,
                y: 540,
                width: 704,
                height: 144
            }
        );
    }

    #[test]
    fn test_clipped_to_image() {
        let r = pixel_rect(&rect(0.5, 0.8, 1.0, 0.5), CropUnits::Relative, 100, 100).unwrap();
        assert_eq!((r.x, r.y, r.width, r.height), (50, 80, 50, 20));

        let r = pixel_rect(&rect(10.0, 10.0, 500.0, 5.0), CropUnits::Pixels, 100, 100).unwrap();
        assert_eq!((r.x, r.y, r.width, r.height), (10, 10, 90, 5));
    }

    #[test]
    fn test_degenerate_regions() {
        assert_eq!(pixel_rect(&rect(1.0, 0.0, 0.5, 0.5), CropUnits::Relative, 100, 100), None);
        assert_eq!(pixel_rect(&rect(0.0, 0.0, 0.0, 0.5), CropUnits::Relative, 100, 100), None);
        assert_eq!(pixel_rect(&rect(0.0, 0.0, 1.0, 1.0), CropUnits::Relative, 0, 0), None);
    }

    #[test]
    fn test_crop_and_encode() {
        let image = DynamicImage::ImageRgb8(RgbImage::new(200, 100));
        let cropped = crop_region(&image, &rect(0.0, 0.8, 1.0, 0.2), CropUnits::Relative).unwrap();
        assert_eq!(cropped.dimensions(), (200, 20));

        let png = encode_png(&cropped).unwrap();
        assert_eq!(&png[..4], &[0x89, b'P', b'N', b'G']);

        let err = crop_region(&image, &rect(2.0, 0.0, 1.0, 1.0), CropUnits::Relative).unwrap_err();
        assert!(matches!(err, OcrError::InvalidCrop(_)));
    }

    #[test]
    fn test_speaker_crop_is_upscaled_gray() {
        let image = DynamicImage::ImageRgb8(RgbImage::new(30, 10));
        let prepared = prepare_speaker_crop(&image);
        assert_eq!(prepared.dimensions(), (90, 30));
    }
}
