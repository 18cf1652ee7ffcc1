//! Application state.
//!
//! `AppState` aggregates the external collaborators (blob store, metadata
//! store, session and permission services) behind trait objects, plus the
//! file settings. Settings are read through [`AppState::settings`], which
//! hands out a snapshot: a concurrent reload never changes limits under a
//! request that is already running.

use crate::auth::{PermissionChecker, SessionProvider};
use attach_core::FileSettings;
use attach_db::FileInfoStore;
use attach_storage::FileStore;
use std::sync::{Arc, RwLock};

pub struct AppState {
    settings: RwLock<FileSettings>,
    /// Externally visible base URL, used when issuing public links.
    pub site_url: String,
    /// `None` when no storage driver is configured; uploads are disabled.
    pub file_store: Option<Arc<dyn FileStore>>,
    pub file_infos: Arc<dyn FileInfoStore>,
    pub sessions: Arc<dyn SessionProvider>,
    pub permissions: Arc<dyn PermissionChecker>,
}

impl AppState {
    pub fn new(
        settings: FileSettings,
        site_url: String,
        file_store: Option<Arc<dyn FileStore>>,
        file_infos: Arc<dyn FileInfoStore>,
        sessions: Arc<dyn SessionProvider>,
        permissions: Arc<dyn PermissionChecker>,
    ) -> Self {
        AppState {
            settings: RwLock::new(settings),
            site_url: site_url.trim_end_matches('/').to_string(),
            file_store,
            file_infos,
            sessions,
            permissions,
        }
    }

    /// Snapshot of the current settings.
    pub fn settings(&self) -> FileSettings {
        self.settings
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Apply a live settings change (e.g. rotating the public link salt).
    /// Requests already past their snapshot are unaffected.
    pub fn update_settings(&self, mutate: impl FnOnce(&mut FileSettings)) {
        let mut guard = self
            .settings
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        mutate(&mut guard);
    }
}

fn _assert_app_state_send_sync() {
    fn assert_send<T: Send>() {}
    fn assert_sync<T: Sync>() {}
    assert_send::<AppState>();
    assert_sync::<AppState>();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{AllowAllPermissions, StaticSessionProvider};
    use attach_db::MemoryFileInfoStore;

    fn state() -> AppState {
        AppState::new(
            FileSettings::default(),
            "http://localhost:3000/".to_string(),
            None,
            Arc::new(MemoryFileInfoStore::new()),
            Arc::new(StaticSessionProvider::new()),
            Arc::new(AllowAllPermissions),
        )
    }

    #[test]
    fn test_site_url_trailing_slash_trimmed() {
        assert_eq!(state().site_url, "http://localhost:3000");
    }

    #[test]
    fn test_settings_snapshot_is_isolated() {
        let state = state();
        let before = state.settings();
        state.update_settings(|s| s.max_file_size = 1);
        assert_ne!(before.max_file_size, 1);
        assert_eq!(state.settings().max_file_size, 1);
    }
}
