//! Domain models.

pub mod file_info;

pub use file_info::{FileInfo, FileUploadResponse};
