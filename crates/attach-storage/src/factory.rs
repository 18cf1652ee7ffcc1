use crate::{FileStore, LocalFileStore, StorageError, StorageResult};
use std::sync::Arc;

/// Create a blob store for the configured driver.
///
/// Returns `Ok(None)` when the driver string is empty, which disables
/// uploads; an unknown driver is a configuration error.
pub async fn create_file_store(
    driver: &str,
    local_storage_path: &str,
) -> StorageResult<Option<Arc<dyn FileStore>>> {
    match driver {
        "" => Ok(None),
        "local" => {
            let store = LocalFileStore::new(local_storage_path).await?;
            Ok(Some(Arc::new(store)))
        }
        other => Err(StorageError::ConfigError(format!(
            "unknown storage driver: {}",
            other
        ))),
    }
}
