//! Image decode and EXIF inspection.

use image::{DynamicImage, ImageReader};
use std::io::Cursor;

/// Decode image bytes, guessing the format from the content.
pub fn decode_image(data: &[u8]) -> Result<DynamicImage, anyhow::Error> {
    let reader = ImageReader::new(Cursor::new(data)).with_guessed_format()?;
    Ok(reader.decode()?)
}

/// Read the EXIF orientation tag (1-8) from image data.
///
/// Returns 1 (normal) when the tag is absent, out of range, or the container
/// carries no parseable EXIF segment.
pub fn read_exif_orientation(data: &[u8]) -> u8 {
    let exifreader = exif::Reader::new();
    let mut cursor = Cursor::new(data);
    match exifreader.read_from_container(&mut cursor) {
        Ok(meta) => meta
            .get_field(exif::Tag::Orientation, exif::In::PRIMARY)
            .and_then(|field| field.value.get_uint(0))
            .filter(|v| (1..=8).contains(v))
            .map(|v| v as u8)
            .unwrap_or(1),
        Err(_) => 1,
    }
}

/// Corrective operations for a given EXIF orientation.
///
/// Returns (clockwise rotation angle, flip horizontal, flip vertical); the
/// rotation is applied first. Orientations 5 and 7 are the diagonal mirrors:
/// transpose (rotate 90 + mirror) and transverse (rotate 270 + mirror).
pub fn orientation_transforms(orientation: u8) -> (Option<u16>, bool, bool) {
    match orientation {
        1 => (None, false, false),
        2 => (None, true, false),
        3 => (Some(180), false, false),
        4 => (None, false, true),
        5 => (Some(90), true, false),
        6 => (Some(90), false, false),
        7 => (Some(270), true, false),
        8 => (Some(270), false, false),
        _ => (None, false, false),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GenericImageView, ImageFormat, Rgba, RgbaImage};

    fn png_bytes(w: u32, h: u32) -> Vec<u8> {
        let img = RgbaImage::from_pixel(w, h, Rgba([255, 0, 0, 255]));
        let mut buf = Vec::new();
        DynamicImage::ImageRgba8(img)
            .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
            .unwrap();
        buf
    }

    /// Minimal TIFF blob carrying a single orientation tag, for EXIF tests.
    fn exif_payload(orientation: u16) -> Vec<u8> {
        let mut tiff = Vec::new();
        tiff.extend_from_slice(b"II*\x00"); // little-endian TIFF header
        tiff.extend_from_slice(&8u32.to_le_bytes()); // IFD offset
        tiff.extend_from_slice(&1u16.to_le_bytes()); // entry count
        tiff.extend_from_slice(&0x0112u16.to_le_bytes()); // Orientation tag
        tiff.extend_from_slice(&3u16.to_le_bytes()); // SHORT
        tiff.extend_from_slice(&1u32.to_le_bytes()); // count
        tiff.extend_from_slice(&orientation.to_le_bytes());
        tiff.extend_from_slice(&0u16.to_le_bytes()); // value padding
        tiff.extend_from_slice(&0u32.to_le_bytes()); // next IFD
        tiff
    }

    fn jpeg_with_orientation(w: u32, h: u32, orientation: u16) -> Vec<u8> {
        let img = RgbaImage::from_pixel(w, h, Rgba([0, 0, 255, 255]));
        let mut buf = Vec::new();
        DynamicImage::ImageRgba8(img)
            .write_to(&mut Cursor::new(&mut buf), ImageFormat::Jpeg)
            .unwrap();

        let mut jpeg = img_parts::jpeg::Jpeg::from_bytes(buf.into()).unwrap();
        use img_parts::ImageEXIF;
        jpeg.set_exif(Some(exif_payload(orientation).into()));
        let mut out = Vec::new();
        jpeg.encoder().write_to(&mut out).unwrap();
        out
    }

    #[test]
    fn test_decode_image() {
        let img = decode_image(&png_bytes(10, 20)).unwrap();
        assert_eq!(img.dimensions(), (10, 20));
    }

    #[test]
    fn test_decode_garbage_fails() {
        assert!(decode_image(b"definitely not pixels").is_err());
    }

    #[test]
    fn test_orientation_defaults_to_normal() {
        assert_eq!(read_exif_orientation(&png_bytes(4, 4)), 1);
        assert_eq!(read_exif_orientation(b""), 1);
        assert_eq!(read_exif_orientation(b"garbage"), 1);
    }

    #[test]
    fn test_orientation_read_from_jpeg() {
        for orientation in 1..=8u16 {
            let data = jpeg_with_orientation(8, 8, orientation);
            assert_eq!(
                read_exif_orientation(&data),
                orientation as u8,
                "orientation {}",
                orientation
            );
        }
    }

    #[test]
    fn test_out_of_range_orientation_is_normal() {
        let data = jpeg_with_orientation(8, 8, 9);
        assert_eq!(read_exif_orientation(&data), 1);
    }

    #[test]
    fn test_transforms_table() {
        assert_eq!(orientation_transforms(1), (None, false, false));
        assert_eq!(orientation_transforms(2), (None, true, false));
        assert_eq!(orientation_transforms(3), (Some(180), false, false));
        assert_eq!(orientation_transforms(4), (None, false, true));
        assert_eq!(orientation_transforms(5), (Some(90), true, false));
        assert_eq!(orientation_transforms(6), (Some(90), false, false));
        assert_eq!(orientation_transforms(7), (Some(270), true, false));
        assert_eq!(orientation_transforms(8), (Some(270), false, false));
        assert_eq!(orientation_transforms(0), (None, false, false));
        assert_eq!(orientation_transforms(9), (None, false, false));
    }
}
