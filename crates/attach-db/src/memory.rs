//! In-memory file metadata store.

use crate::store::{FileInfoStore, StoreError, StoreResult};
use async_trait::async_trait;
use attach_core::FileInfo;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::RwLock;

/// HashMap-backed [`FileInfoStore`] used by tests and the dev server.
#[derive(Default)]
pub struct MemoryFileInfoStore {
    records: RwLock<HashMap<String, FileInfo>>,
}

impl MemoryFileInfoStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock_write(&self) -> StoreResult<std::sync::RwLockWriteGuard<'_, HashMap<String, FileInfo>>> {
        self.records
            .write()
            .map_err(|_| StoreError::Backend("file info store lock poisoned".to_string()))
    }
}

#[async_trait]
impl FileInfoStore for MemoryFileInfoStore {
    async fn save(&self, info: FileInfo) -> StoreResult<FileInfo> {
        let mut records = self.lock_write()?;
        if records.contains_key(&info.id) {
            return Err(StoreError::Duplicate(info.id));
        }
        records.insert(info.id.clone(), info.clone());
        Ok(info)
    }

    async fn get(&self, id: &str) -> StoreResult<Option<FileInfo>> {
        let records = self
            .records
            .read()
            .map_err(|_| StoreError::Backend("file info store lock poisoned".to_string()))?;
        Ok(records.get(id).cloned())
    }

    async fn attach_to_post(&self, file_id: &str, post_id: &str) -> StoreResult<()> {
        let mut records = self.lock_write()?;
        let info = records
            .get_mut(file_id)
            .ok_or_else(|| StoreError::NotFound(file_id.to_string()))?;
        info.post_id = post_id.to_string();
        info.update_at = Utc::now().timestamp_millis();
        Ok(())
    }

    async fn delete(&self, id: &str) -> StoreResult<()> {
        let mut records = self.lock_write()?;
        let info = records
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        let now = Utc::now().timestamp_millis();
        info.delete_at = now;
        info.update_at = now;
        Ok(())
    }
}
