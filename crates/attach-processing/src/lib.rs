//! Attach Processing Library
//!
//! MIME type resolution and image processing (decode, EXIF orientation
//! correction, thumbnail/preview generation) for the upload pipeline.

pub mod image;
pub mod mime;

pub use crate::image::{is_image_mime, process_image, ProcessedImage};
pub use mime::{resolve_type, SniffedType, HEADER_SNIFF_LEN};
