//! Attach Storage Library
//!
//! Blob storage abstraction for the file service. The upload pipeline writes
//! originals and derivatives through the [`FileStore`] trait; backends are
//! selected by the configured driver name.
//!
//! Paths follow the layout
//! `{YYYYMMDD}/teams/{team}/channels/{channel}/users/{user}/{file_id}/{name}`
//! and must not contain `..` or a leading `/`.

pub mod factory;
pub mod local;
pub mod traits;

pub use factory::create_file_store;
pub use local::LocalFileStore;
pub use traits::{ByteStream, FileStore, StorageError, StorageResult};
