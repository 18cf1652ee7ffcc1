//! Test helpers: build an AppState and TestServer over tempdir storage and
//! in-memory stores.

// Each integration test binary compiles its own copy; not every binary uses
// every helper.
#![allow(dead_code)]

use attach_api::auth::{PermissionChecker, Session, SessionProvider, StaticSessionProvider};
use attach_api::{router, AppState};
use attach_core::{id, FileSettings};
use attach_db::MemoryFileInfoStore;
use attach_storage::create_file_store;
use axum_test::TestServer;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tempfile::TempDir;

pub const SESSION_TOKEN: &str = "test-session-token";
pub const OTHER_SESSION_TOKEN: &str = "other-session-token";
pub const CHANNEL_ID: &str = "channel-under-test";

/// Permission checker with flips the tests can toggle mid-scenario.
#[derive(Default)]
pub struct TogglePermissions {
    deny_upload: AtomicBool,
    deny_read: AtomicBool,
}

impl TogglePermissions {
    pub fn deny_upload(&self) {
        self.deny_upload.store(true, Ordering::SeqCst);
    }

    pub fn deny_read(&self) {
        self.deny_read.store(true, Ordering::SeqCst);
    }
}

#[async_trait::async_trait]
impl PermissionChecker for TogglePermissions {
    async fn can_upload_to_channel(&self, _session: &Session, _channel_id: &str) -> bool {
        !self.deny_upload.load(Ordering::SeqCst)
    }

    async fn can_read_channel_of_post(&self, _session: &Session, _post_id: &str) -> bool {
        !self.deny_read.load(Ordering::SeqCst)
    }
}

pub struct TestApp {
    pub server: TestServer,
    pub state: Arc<AppState>,
    pub permissions: Arc<TogglePermissions>,
    pub user_id: String,
    pub other_user_id: String,
    _temp_dir: TempDir,
}

pub async fn spawn_app() -> TestApp {
    spawn_app_with(|_| {}).await
}

pub async fn spawn_app_with(mutate: impl FnOnce(&mut FileSettings)) -> TestApp {
    let temp_dir = tempfile::tempdir().expect("create temp storage dir");

    let mut settings = FileSettings {
        enable_public_link: true,
        local_storage_path: temp_dir.path().to_string_lossy().to_string(),
        ..FileSettings::default()
    };
    mutate(&mut settings);

    let file_store = create_file_store(&settings.storage_driver, &settings.local_storage_path)
        .await
        .expect("create file store");

    let user_id = id::new_id();
    let other_user_id = id::new_id();
    let sessions = StaticSessionProvider::new()
        .with_session(
            SESSION_TOKEN,
            Session {
                id: id::new_id(),
                user_id: user_id.clone(),
            },
        )
        .with_session(
            OTHER_SESSION_TOKEN,
            Session {
                id: id::new_id(),
                user_id: other_user_id.clone(),
            },
        );

    let permissions = Arc::new(TogglePermissions::default());

    let state = Arc::new(AppState::new(
        settings,
        "http://chat.test".to_string(),
        file_store,
        Arc::new(MemoryFileInfoStore::new()),
        Arc::new(sessions) as Arc<dyn SessionProvider>,
        permissions.clone() as Arc<dyn PermissionChecker>,
    ));

    let server = TestServer::new(router(state.clone())).expect("start test server");

    TestApp {
        server,
        state,
        permissions,
        user_id,
        other_user_id,
        _temp_dir: temp_dir,
    }
}

// ---------------------------------------------------------------------------
// Image fixtures
// ---------------------------------------------------------------------------

pub fn test_png(width: u32, height: u32) -> Vec<u8> {
    encode_image(width, height, image::ImageFormat::Png)
}

pub fn test_jpeg(width: u32, height: u32) -> Vec<u8> {
    encode_image(width, height, image::ImageFormat::Jpeg)
}

pub fn test_gif(width: u32, height: u32) -> Vec<u8> {
    encode_image(width, height, image::ImageFormat::Gif)
}

fn encode_image(width: u32, height: u32, format: image::ImageFormat) -> Vec<u8> {
    let img = image::RgbaImage::from_fn(width, height, |x, y| {
        image::Rgba([(x % 256) as u8, (y % 256) as u8, 128, 255])
    });
    let mut buf = Vec::new();
    image::DynamicImage::ImageRgba8(img)
        .write_to(&mut std::io::Cursor::new(&mut buf), format)
        .expect("encode fixture image");
    buf
}

/// JPEG whose EXIF segment carries the given orientation tag.
pub fn jpeg_with_orientation(width: u32, height: u32, orientation: u16) -> Vec<u8> {
    let base = test_jpeg(width, height);

    let mut tiff = Vec::new();
    tiff.extend_from_slice(b"II*\x00");
    tiff.extend_from_slice(&8u32.to_le_bytes());
    tiff.extend_from_slice(&1u16.to_le_bytes());
    tiff.extend_from_slice(&0x0112u16.to_le_bytes());
    tiff.extend_from_slice(&3u16.to_le_bytes());
    tiff.extend_from_slice(&1u32.to_le_bytes());
    tiff.extend_from_slice(&orientation.to_le_bytes());
    tiff.extend_from_slice(&0u16.to_le_bytes());
    tiff.extend_from_slice(&0u32.to_le_bytes());

    use img_parts::ImageEXIF;
    let mut jpeg = img_parts::jpeg::Jpeg::from_bytes(base.into()).expect("parse fixture jpeg");
    jpeg.set_exif(Some(tiff.into()));
    let mut out = Vec::new();
    jpeg.encoder().write_to(&mut out).expect("rewrite fixture jpeg");
    out
}

// ---------------------------------------------------------------------------
// Multipart body builder
// ---------------------------------------------------------------------------

/// Hand-rolled multipart builder so tests control the exact part order the
/// ingestor sees on the wire.
pub struct MultipartBuilder {
    boundary: String,
    body: Vec<u8>,
}

impl MultipartBuilder {
    pub fn new() -> Self {
        MultipartBuilder {
            boundary: format!("test-boundary-{}", id::new_id()),
            body: Vec::new(),
        }
    }

    pub fn field(mut self, name: &str, value: &str) -> Self {
        self.body
            .extend_from_slice(format!("--{}\r\n", self.boundary).as_bytes());
        self.body.extend_from_slice(
            format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n", name).as_bytes(),
        );
        self.body.extend_from_slice(value.as_bytes());
        self.body.extend_from_slice(b"\r\n");
        self
    }

    pub fn file(mut self, name: &str, filename: &str, content: &[u8]) -> Self {
        self.body
            .extend_from_slice(format!("--{}\r\n", self.boundary).as_bytes());
        self.body.extend_from_slice(
            format!(
                "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n\
                 Content-Type: application/octet-stream\r\n\r\n",
                name, filename
            )
            .as_bytes(),
        );
        self.body.extend_from_slice(content);
        self.body.extend_from_slice(b"\r\n");
        self
    }

    pub fn content_type(&self) -> String {
        format!("multipart/form-data; boundary={}", self.boundary)
    }

    pub fn build(mut self) -> (String, Vec<u8>) {
        let content_type = self.content_type();
        self.body
            .extend_from_slice(format!("--{}--\r\n", self.boundary).as_bytes());
        (content_type, self.body)
    }
}

impl Default for MultipartBuilder {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Request helpers
// ---------------------------------------------------------------------------

impl TestApp {
    /// POST a raw-body upload with metadata in the query string.
    pub async fn upload_simple(
        &self,
        channel_id: &str,
        filename: &str,
        bytes: Vec<u8>,
    ) -> axum_test::TestResponse {
        self.server
            .post(&format!(
                "/files?channel_id={}&filename={}",
                channel_id, filename
            ))
            .add_header("authorization", format!("Bearer {}", SESSION_TOKEN))
            .bytes(bytes.into())
            .await
    }

    /// POST a multipart upload built by [`MultipartBuilder`].
    pub async fn upload_multipart(
        &self,
        content_type: String,
        body: Vec<u8>,
    ) -> axum_test::TestResponse {
        self.server
            .post("/files")
            .add_header("authorization", format!("Bearer {}", SESSION_TOKEN))
            .content_type(&content_type)
            .bytes(body.into())
            .await
    }

    /// Authenticated GET.
    pub async fn get_authed(&self, path: &str) -> axum_test::TestResponse {
        self.get_as(path, SESSION_TOKEN).await
    }

    pub async fn get_as(&self, path: &str, token: &str) -> axum_test::TestResponse {
        self.server
            .get(path)
            .add_header("authorization", format!("Bearer {}", token))
            .await
    }

    /// Read a stored blob through the state's file store.
    pub async fn read_blob(&self, path: &str) -> Vec<u8> {
        self.state
            .file_store
            .as_ref()
            .expect("file store configured")
            .read(path)
            .await
            .expect("read blob")
    }

    /// Fetch the full record (with internal paths) straight from the store.
    pub async fn stored_info(&self, file_id: &str) -> attach_core::FileInfo {
        self.state
            .file_infos
            .get(file_id)
            .await
            .expect("file info store")
            .expect("file info present")
    }
}
