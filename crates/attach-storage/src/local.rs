use crate::traits::{ByteStream, FileStore, StorageError, StorageResult};
use async_trait::async_trait;
use futures::StreamExt;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use tokio::fs;
use tokio::io::{AsyncRead, AsyncWriteExt};

/// Local filesystem storage backend
#[derive(Clone)]
pub struct LocalFileStore {
    base_path: PathBuf,
    /// Cached canonical base path so existing-file checks don't re-canonicalize
    /// the root on every call.
    base_path_canonical: PathBuf,
}

impl LocalFileStore {
    /// `base_path` is the root directory for blob storage; it is created if
    /// missing.
    pub async fn new(base_path: impl Into<PathBuf>) -> StorageResult<Self> {
        let base_path = base_path.into();

        fs::create_dir_all(&base_path).await.map_err(|e| {
            StorageError::ConfigError(format!(
                "Failed to create storage directory {}: {}",
                base_path.display(),
                e
            ))
        })?;

        let base_path_canonical = tokio::task::spawn_blocking({
            let p = base_path.clone();
            move || p.canonicalize()
        })
        .await
        .map_err(|e| StorageError::ConfigError(format!("spawn_blocking failed: {}", e)))?
        .map_err(|e| {
            StorageError::ConfigError(format!("Failed to canonicalize base path: {}", e))
        })?;

        Ok(LocalFileStore {
            base_path,
            base_path_canonical,
        })
    }

    /// Converts a storage path to a filesystem path, rejecting traversal.
    /// Existing files are canonicalized (off the async runtime) and checked
    /// against the canonical base.
    async fn key_to_path(&self, storage_path: &str) -> StorageResult<PathBuf> {
        if storage_path.is_empty()
            || storage_path.starts_with('/')
            || storage_path.contains('\\')
            || storage_path.split('/').any(|seg| seg == "..")
        {
            return Err(StorageError::InvalidPath(storage_path.to_string()));
        }

        let path = self.base_path.join(storage_path);

        if fs::try_exists(&path).await.unwrap_or(false) {
            let path_clone = path.clone();
            let base_canonical = self.base_path_canonical.clone();
            let canonical = tokio::task::spawn_blocking(move || path_clone.canonicalize())
                .await
                .map_err(|e| StorageError::ConfigError(format!("spawn_blocking failed: {}", e)))?
                .map_err(|e| {
                    StorageError::ConfigError(format!("Failed to canonicalize path: {}", e))
                })?;
            if canonical.strip_prefix(&base_canonical).is_err() {
                return Err(StorageError::InvalidPath(
                    "storage path resolves outside the storage directory".to_string(),
                ));
            }
        }

        Ok(path)
    }

    async fn ensure_parent_dir(&self, path: &Path) -> StorageResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl FileStore for LocalFileStore {
    async fn write_stream(
        &self,
        path: &str,
        mut reader: Pin<Box<dyn AsyncRead + Send>>,
    ) -> StorageResult<u64> {
        let fs_path = self.key_to_path(path).await?;
        self.ensure_parent_dir(&fs_path).await?;

        let mut file = fs::File::create(&fs_path).await.map_err(|e| {
            tracing::error!(path = %fs_path.display(), error = %e, "Local store create failed");
            StorageError::WriteFailed(format!("Failed to create {}: {}", fs_path.display(), e))
        })?;

        let written = match tokio::io::copy(&mut reader, &mut file).await {
            Ok(n) => n,
            Err(e) => {
                // Leave classification of the cause (client abort, size limit)
                // to the caller; report what the filesystem saw.
                tracing::warn!(path = %fs_path.display(), error = %e, "Local store stream write aborted");
                return Err(StorageError::WriteFailed(e.to_string()));
            }
        };

        file.sync_all().await.map_err(|e| {
            tracing::error!(path = %fs_path.display(), error = %e, "Local store sync failed");
            StorageError::WriteFailed(format!("Failed to sync {}: {}", fs_path.display(), e))
        })?;

        tracing::debug!(path = %path, size_bytes = written, "Local store stream write complete");

        Ok(written)
    }

    async fn write(&self, path: &str, data: Vec<u8>) -> StorageResult<u64> {
        let fs_path = self.key_to_path(path).await?;
        self.ensure_parent_dir(&fs_path).await?;

        let size = data.len() as u64;
        let mut file = fs::File::create(&fs_path).await.map_err(|e| {
            tracing::error!(path = %fs_path.display(), error = %e, "Local store create failed");
            StorageError::WriteFailed(format!("Failed to create {}: {}", fs_path.display(), e))
        })?;

        file.write_all(&data).await.map_err(|e| {
            tracing::error!(path = %fs_path.display(), error = %e, "Local store write failed");
            StorageError::WriteFailed(format!("Failed to write {}: {}", fs_path.display(), e))
        })?;

        file.sync_all().await.map_err(|e| {
            tracing::error!(path = %fs_path.display(), error = %e, "Local store sync failed");
            StorageError::WriteFailed(format!("Failed to sync {}: {}", fs_path.display(), e))
        })?;

        tracing::debug!(path = %path, size_bytes = size, "Local store write complete");

        Ok(size)
    }

    async fn read(&self, path: &str) -> StorageResult<Vec<u8>> {
        let fs_path = self.key_to_path(path).await?;

        if !fs::try_exists(&fs_path).await.unwrap_or(false) {
            return Err(StorageError::NotFound(path.to_string()));
        }

        fs::read(&fs_path).await.map_err(|e| {
            tracing::error!(path = %fs_path.display(), error = %e, "Local store read failed");
            StorageError::ReadFailed(format!("Failed to read {}: {}", fs_path.display(), e))
        })
    }

    async fn read_stream(&self, path: &str) -> StorageResult<ByteStream> {
        let fs_path = self.key_to_path(path).await?;

        if !fs::try_exists(&fs_path).await.unwrap_or(false) {
            return Err(StorageError::NotFound(path.to_string()));
        }

        let file = fs::File::open(&fs_path).await.map_err(|e| {
            tracing::error!(path = %fs_path.display(), error = %e, "Local store open failed");
            StorageError::ReadFailed(format!("Failed to open {}: {}", fs_path.display(), e))
        })?;

        let stream = tokio_util::io::ReaderStream::new(file)
            .map(|chunk| chunk.map_err(|e| StorageError::ReadFailed(e.to_string())));

        Ok(Box::pin(stream))
    }

    async fn remove(&self, path: &str) -> StorageResult<()> {
        let fs_path = self.key_to_path(path).await?;

        if !fs::try_exists(&fs_path).await.unwrap_or(false) {
            return Ok(());
        }

        fs::remove_file(&fs_path).await.map_err(|e| {
            tracing::error!(path = %fs_path.display(), error = %e, "Local store delete failed");
            StorageError::DeleteFailed(format!("Failed to delete {}: {}", fs_path.display(), e))
        })?;

        tracing::debug!(path = %path, "Local store delete complete");

        Ok(())
    }

    async fn exists(&self, path: &str) -> StorageResult<bool> {
        let fs_path = self.key_to_path(path).await?;
        Ok(fs::try_exists(&fs_path).await.unwrap_or(false))
    }
}
