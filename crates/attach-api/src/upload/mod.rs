//! Upload ingestion: the per-file pipeline and the multipart ingestor that
//! drives it.

pub mod multipart;
pub mod pipeline;

pub use multipart::ingest_multipart;
pub use pipeline::{upload_file, UploadContext};
