//! Persistent metadata for uploaded files.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Metadata record for one uploaded file.
///
/// `path`, `thumbnail_path` and `preview_path` are internal storage keys and
/// are never serialized to clients.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct FileInfo {
    pub id: String,
    #[serde(rename = "user_id")]
    pub creator_id: String,
    /// Empty until the chat layer attaches the file to a post.
    pub post_id: String,
    /// Creation time in epoch milliseconds.
    pub create_at: i64,
    pub update_at: i64,
    /// Soft-delete marker; zero for live records.
    pub delete_at: i64,
    #[serde(skip)]
    pub path: String,
    #[serde(skip)]
    pub thumbnail_path: String,
    #[serde(skip)]
    pub preview_path: String,
    /// Sanitized original filename.
    pub name: String,
    /// Lowercased extension without the leading dot; may be empty.
    pub extension: String,
    /// Size in bytes of the stored original.
    pub size: i64,
    pub mime_type: String,
    pub width: u32,
    pub height: u32,
    pub has_preview_image: bool,
}

impl FileInfo {
    /// Whether a thumbnail was generated for this file.
    pub fn has_thumbnail(&self) -> bool {
        !self.thumbnail_path.is_empty()
    }

    /// Whether the record has been soft-deleted.
    pub fn is_deleted(&self) -> bool {
        self.delete_at > 0
    }
}

/// Millisecond timestamp helper used for `create_at`/`update_at` fields.
pub fn millis(ts: DateTime<Utc>) -> i64 {
    ts.timestamp_millis()
}

/// Result of an upload request: file metadata in stream order, with client
/// correlation tokens in matching positions when the client supplied them.
///
/// Invariant: `client_ids` is either empty or the same length as
/// `file_infos`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct FileUploadResponse {
    pub file_infos: Vec<FileInfo>,
    pub client_ids: Vec<String>,
}
