//! Thumbnail and preview rendering.
//!
//! Thumbnails are constrained to a 100px height and previews to a 1024px
//! width, both aspect-preserving with Lanczos resampling and encoded as JPEG
//! quality 90. Images already smaller than the target are never upscaled.

use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView};
use std::io::Cursor;

pub const THUMBNAIL_HEIGHT: u32 = 100;
pub const PREVIEW_WIDTH: u32 = 1024;
const JPEG_QUALITY: u8 = 90;

/// Render the thumbnail derivative.
pub fn generate_thumbnail(img: &DynamicImage) -> Result<Vec<u8>, anyhow::Error> {
    let (width, height) = img.dimensions();
    if height <= THUMBNAIL_HEIGHT {
        return encode_jpeg(img);
    }
    let target_width = scaled_dimension(width, THUMBNAIL_HEIGHT, height);
    let resized = img.resize_exact(target_width, THUMBNAIL_HEIGHT, FilterType::Lanczos3);
    encode_jpeg(&resized)
}

/// Render the preview derivative.
pub fn generate_preview(img: &DynamicImage) -> Result<Vec<u8>, anyhow::Error> {
    let (width, height) = img.dimensions();
    if width <= PREVIEW_WIDTH {
        return encode_jpeg(img);
    }
    let target_height = scaled_dimension(height, PREVIEW_WIDTH, width);
    let resized = img.resize_exact(PREVIEW_WIDTH, target_height, FilterType::Lanczos3);
    encode_jpeg(&resized)
}

/// Scale `other` by `target / constrained`, keeping the aspect ratio.
fn scaled_dimension(other: u32, target: u32, constrained: u32) -> u32 {
    let ratio = target as f32 / constrained as f32;
    ((other as f32 * ratio).round() as u32).max(1)
}

fn encode_jpeg(img: &DynamicImage) -> Result<Vec<u8>, anyhow::Error> {
    // JPEG has no alpha channel; flatten to RGB before encoding.
    let rgb = DynamicImage::ImageRgb8(img.to_rgb8());
    let mut buf = Vec::new();
    let mut cursor = Cursor::new(&mut buf);
    let encoder = JpegEncoder::new_with_quality(&mut cursor, JPEG_QUALITY);
    rgb.write_with_encoder(encoder)?;
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    fn solid(w: u32, h: u32) -> DynamicImage {
        DynamicImage::ImageRgba8(RgbaImage::from_pixel(w, h, Rgba([120, 60, 200, 255])))
    }

    fn decoded_dimensions(jpeg: &[u8]) -> (u32, u32) {
        image::load_from_memory(jpeg).unwrap().dimensions()
    }

    #[test]
    fn test_thumbnail_constrains_height() {
        let jpeg = generate_thumbnail(&solid(400, 300)).unwrap();
        assert_eq!(decoded_dimensions(&jpeg), (133, 100));
    }

    #[test]
    fn test_thumbnail_never_upscales() {
        let jpeg = generate_thumbnail(&solid(50, 40)).unwrap();
        assert_eq!(decoded_dimensions(&jpeg), (50, 40));
    }

    #[test]
    fn test_preview_constrains_width() {
        let jpeg = generate_preview(&solid(2048, 1000)).unwrap();
        assert_eq!(decoded_dimensions(&jpeg), (1024, 500));
    }

    #[test]
    fn test_preview_never_upscales() {
        let jpeg = generate_preview(&solid(800, 600)).unwrap();
        assert_eq!(decoded_dimensions(&jpeg), (800, 600));
    }

    #[test]
    fn test_output_is_jpeg() {
        let jpeg = generate_thumbnail(&solid(200, 200)).unwrap();
        assert_eq!(&jpeg[0..2], &[0xff, 0xd8]);
    }

    #[test]
    fn test_tall_thumbnail_width_never_zero() {
        let jpeg = generate_thumbnail(&solid(2, 4000)).unwrap();
        let (w, h) = decoded_dimensions(&jpeg);
        assert_eq!(h, 100);
        assert!(w >= 1);
    }
}
