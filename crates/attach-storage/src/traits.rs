//! Storage abstraction trait
//!
//! This module defines the [`FileStore`] trait that all blob backends must
//! implement, and the error type they report with.

use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;
use std::pin::Pin;
use thiserror::Error;
use tokio::io::AsyncRead;

/// Storage operation errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("write failed: {0}")]
    WriteFailed(String),

    #[error("read failed: {0}")]
    ReadFailed(String),

    #[error("delete failed: {0}")]
    DeleteFailed(String),

    #[error("blob not found: {0}")]
    NotFound(String),

    #[error("invalid storage path: {0}")]
    InvalidPath(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("configuration error: {0}")]
    ConfigError(String),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Stream of blob content chunks.
pub type ByteStream = Pin<Box<dyn Stream<Item = StorageResult<Bytes>> + Send>>;

/// Blob storage abstraction.
///
/// Backends are internally thread-safe; the pipeline holds no locks across
/// calls. All methods address blobs by the layered path described in the
/// crate documentation.
#[async_trait]
pub trait FileStore: Send + Sync {
    /// Stream a blob to `path`, consuming the reader to EOF.
    ///
    /// Returns the number of bytes written. When the reader fails mid-way a
    /// partial blob may remain; callers are responsible for removing it.
    async fn write_stream(
        &self,
        path: &str,
        reader: Pin<Box<dyn AsyncRead + Send>>,
    ) -> StorageResult<u64>;

    /// Write an in-memory blob to `path`. Returns the number of bytes written.
    async fn write(&self, path: &str, data: Vec<u8>) -> StorageResult<u64>;

    /// Read an entire blob into memory.
    async fn read(&self, path: &str) -> StorageResult<Vec<u8>>;

    /// Read a blob as a stream of chunks, for response bodies.
    async fn read_stream(&self, path: &str) -> StorageResult<ByteStream>;

    /// Delete a blob. Deleting a missing blob is not an error.
    async fn remove(&self, path: &str) -> StorageResult<()>;

    /// Check whether a blob exists.
    async fn exists(&self, path: &str) -> StorageResult<bool>;
}
