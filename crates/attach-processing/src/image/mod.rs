//! Image processing: decode, orientation correction, derivative generation.

pub mod derivatives;
pub mod orientation;
pub mod processor;

use ::image::GenericImageView;

pub use derivatives::{generate_preview, generate_thumbnail, PREVIEW_WIDTH, THUMBNAIL_HEIGHT};
pub use orientation::apply_exif_orientation;
pub use processor::{orientation_transforms, read_exif_orientation};

/// MIME types the upload pipeline treats as decodable images.
pub const IMAGE_MIME_TYPES: &[&str] = &["image/jpeg", "image/png", "image/gif", "image/bmp"];

pub fn is_image_mime(mime_type: &str) -> bool {
    IMAGE_MIME_TYPES.contains(&mime_type)
}

/// Output of [`process_image`].
#[derive(Debug, Clone)]
pub struct ProcessedImage {
    /// Dimensions after orientation correction.
    pub width: u32,
    pub height: u32,
    /// JPEG thumbnail bytes; `None` for formats that get no derivatives.
    pub thumbnail: Option<Vec<u8>>,
    /// JPEG preview bytes; `None` for formats that get no derivatives.
    pub preview: Option<Vec<u8>>,
}

/// Decode an uploaded image, correct its EXIF orientation, and render the
/// thumbnail and preview derivatives.
///
/// Animated GIFs keep their animation semantics: only the first frame is
/// inspected for dimensions and no derivatives are rendered. This function is
/// CPU-bound; the pipeline runs it on a blocking worker.
pub fn process_image(data: &[u8], mime_type: &str) -> Result<ProcessedImage, anyhow::Error> {
    let decoded = processor::decode_image(data)?;
    let corrected = apply_exif_orientation(decoded, data);
    let (width, height) = corrected.dimensions();

    if mime_type == "image/gif" {
        return Ok(ProcessedImage {
            width,
            height,
            thumbnail: None,
            preview: None,
        });
    }

    let thumbnail = generate_thumbnail(&corrected)?;
    let preview = generate_preview(&corrected)?;

    Ok(ProcessedImage {
        width,
        height,
        thumbnail: Some(thumbnail),
        preview: Some(preview),
    })
}
