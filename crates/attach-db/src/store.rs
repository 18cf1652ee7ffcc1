//! File metadata store trait.

use async_trait::async_trait;
use attach_core::FileInfo;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("record not found: {0}")]
    NotFound(String),

    #[error("duplicate id: {0}")]
    Duplicate(String),

    #[error("store backend error: {0}")]
    Backend(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Persists and retrieves [`FileInfo`] records by id.
///
/// Implementations are internally thread-safe. Deletion is soft: records get
/// a non-zero `delete_at` and stop being served, but stay addressable.
#[async_trait]
pub trait FileInfoStore: Send + Sync {
    /// Insert a new record. The id must not already exist.
    async fn save(&self, info: FileInfo) -> StoreResult<FileInfo>;

    /// Fetch a record by id, including soft-deleted ones.
    async fn get(&self, id: &str) -> StoreResult<Option<FileInfo>>;

    /// Attach an orphaned file to a post.
    async fn attach_to_post(&self, file_id: &str, post_id: &str) -> StoreResult<()>;

    /// Soft-delete a record.
    async fn delete(&self, id: &str) -> StoreResult<()>;
}
