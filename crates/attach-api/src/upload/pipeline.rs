//! Single-file upload pipeline.
//!
//! One call ingests one file: sniff the type from the first bytes, stream the
//! body into the blob store under a size limiter, generate image derivatives,
//! and insert the metadata record. The input stream's length may be unknown
//! (`content_length = -1`); the limiter enforces the cap mid-stream either
//! way. Any failure after bytes were written removes the partial blobs
//! best-effort before the error surfaces.

use crate::error::storage_error;
use attach_core::models::file_info::millis;
use attach_core::{id, AppError, FileInfo, FileSettings};
use attach_db::FileInfoStore;
use attach_processing as processing;
use attach_storage::FileStore;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures::{Stream, StreamExt};
use std::io;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::io::AsyncRead;
use tokio_util::io::StreamReader;

/// Files up to this size keep a side buffer during the primary write so the
/// image branch can avoid reading the blob back.
const SIDE_BUFFER_LIMIT: usize = 10 * 1024 * 1024;

const MAX_NAME_LENGTH: usize = 255;

/// Per-file ingestion context.
#[derive(Debug, Clone)]
pub struct UploadContext {
    pub timestamp: DateTime<Utc>,
    pub team_id: String,
    pub channel_id: String,
    pub user_id: String,
    /// Client-supplied filename, validated before use.
    pub name: String,
    /// Declared length in bytes; -1 when unknown (multipart part, chunked
    /// transfer encoding).
    pub content_length: i64,
}

/// Ingest one file and return its persisted metadata.
pub async fn upload_file<'a, S>(
    store: &'a dyn FileStore,
    file_infos: &'a dyn FileInfoStore,
    settings: &'a FileSettings,
    ctx: UploadContext,
    input: S,
) -> Result<FileInfo, AppError>
where
    S: Stream<Item = Result<Bytes, io::Error>> + Send + Unpin + 'static,
{
    let name = validate_file_name(&ctx.name)?;

    if ctx.content_length > settings.max_file_size {
        return Err(AppError::PayloadTooLarge(format!(
            "declared length {} exceeds the {} byte limit",
            ctx.content_length, settings.max_file_size
        )));
    }

    // Sniff the type from the first bytes, then logically re-attach them so
    // the primary write sees head ++ rest.
    let (head, consumed, rest) = read_head(input).await?;
    let sniffed = processing::resolve_type(&name, &head);

    let file_id = id::new_id();
    let base_path = format!(
        "{}/teams/{}/channels/{}/users/{}/{}",
        ctx.timestamp.format("%Y%m%d"),
        ctx.team_id,
        ctx.channel_id,
        ctx.user_id,
        file_id
    );
    let full_path = format!("{}/{}", base_path, name);

    let exceeded = Arc::new(AtomicBool::new(false));
    let side_buffer: Arc<Mutex<Option<Vec<u8>>>> = Arc::new(Mutex::new(Some(Vec::new())));
    let reader = limited_reader(
        futures::stream::iter(consumed.into_iter().map(Ok::<_, io::Error>)).chain(rest),
        settings.max_file_size as u64,
        exceeded.clone(),
        side_buffer.clone(),
    );

    let size = match store.write_stream(&full_path, reader).await {
        Ok(size) => size,
        Err(err) => {
            remove_blobs(store, [full_path.as_str()]).await;
            if exceeded.load(Ordering::SeqCst) {
                return Err(AppError::PayloadTooLarge(format!(
                    "file exceeds the {} byte limit",
                    settings.max_file_size
                )));
            }
            return Err(storage_error("upload_file", err));
        }
    };

    let created = millis(ctx.timestamp);
    let mut info = FileInfo {
        id: file_id,
        creator_id: ctx.user_id.clone(),
        post_id: String::new(),
        create_at: created,
        update_at: created,
        delete_at: 0,
        path: full_path.clone(),
        thumbnail_path: String::new(),
        preview_path: String::new(),
        name: name.clone(),
        extension: sniffed.extension,
        size: size as i64,
        mime_type: sniffed.mime_type,
        width: 0,
        height: 0,
        has_preview_image: false,
    };

    if processing::is_image_mime(&info.mime_type) {
        process_image_branch(store, &base_path, &name, side_buffer, size, &mut info).await?;
    }

    let cleanup_paths: Vec<String> = [&info.path, &info.thumbnail_path, &info.preview_path]
        .into_iter()
        .filter(|p| !p.is_empty())
        .cloned()
        .collect();

    match file_infos.save(info).await {
        Ok(saved) => {
            tracing::info!(
                file_id = %saved.id,
                channel_id = %ctx.channel_id,
                user_id = %ctx.user_id,
                name = %saved.name,
                mime_type = %saved.mime_type,
                size_bytes = saved.size,
                "File uploaded"
            );
            Ok(saved)
        }
        Err(err) => {
            remove_blobs(store, cleanup_paths.iter().map(String::as_str)).await;
            Err(AppError::internal_op("upload_file: insert file info", err))
        }
    }
}

/// Collect the first bytes of the stream for sniffing. Returns the head
/// (up to [`processing::HEADER_SNIFF_LEN`] bytes), the chunks consumed so far
/// for replay, and the untouched remainder.
async fn read_head<S>(mut input: S) -> Result<(Vec<u8>, Vec<Bytes>, S), AppError>
where
    S: Stream<Item = Result<Bytes, io::Error>> + Send + Unpin,
{
    let mut head = Vec::with_capacity(processing::HEADER_SNIFF_LEN);
    let mut consumed = Vec::new();

    while head.len() < processing::HEADER_SNIFF_LEN {
        match input.next().await {
            Some(Ok(chunk)) => {
                let take = (processing::HEADER_SNIFF_LEN - head.len()).min(chunk.len());
                head.extend_from_slice(&chunk[..take]);
                consumed.push(chunk);
            }
            Some(Err(err)) => {
                return Err(AppError::Internal(format!(
                    "failed reading upload stream: {}",
                    err
                )))
            }
            None => break,
        }
    }

    Ok((head, consumed, input))
}

/// Wrap the byte stream in the size limiter and side-buffer tee, exposed as
/// an `AsyncRead` for the blob store.
fn limited_reader<S>(
    stream: S,
    max_bytes: u64,
    exceeded: Arc<AtomicBool>,
    side_buffer: Arc<Mutex<Option<Vec<u8>>>>,
) -> Pin<Box<dyn AsyncRead + Send>>
where
    S: Stream<Item = Result<Bytes, io::Error>> + Send + 'static,
{
    let limited = stream.scan(0u64, move |written, item| {
        let out = match item {
            Ok(chunk) => {
                *written += chunk.len() as u64;
                if *written > max_bytes {
                    exceeded.store(true, Ordering::SeqCst);
                    Err(io::Error::other("max file size exceeded"))
                } else {
                    let mut guard = side_buffer
                        .lock()
                        .unwrap_or_else(|poisoned| poisoned.into_inner());
                    if let Some(buf) = guard.as_mut() {
                        if buf.len() + chunk.len() <= SIDE_BUFFER_LIMIT {
                            buf.extend_from_slice(&chunk);
                        } else {
                            // Too big to mirror; the image branch reads back.
                            *guard = None;
                        }
                    }
                    Ok(chunk)
                }
            }
            Err(err) => Err(err),
        };
        futures::future::ready(Some(out))
    });

    Box::pin(StreamReader::new(limited))
}

/// Decode the stored image, correct orientation, record dimensions and write
/// derivatives. Decode failures are not errors: the file stays stored with
/// zero dimensions and no preview.
async fn process_image_branch<'a>(
    store: &'a dyn FileStore,
    base_path: &'a str,
    name: &'a str,
    side_buffer: Arc<Mutex<Option<Vec<u8>>>>,
    size: u64,
    info: &'a mut FileInfo,
) -> Result<(), AppError> {
    let buffered = side_buffer
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
        .take()
        .filter(|buf| buf.len() as u64 == size);

    let data = match buffered {
        Some(buf) => buf,
        None => match store.read(&info.path).await {
            Ok(data) => data,
            Err(err) => {
                tracing::warn!(
                    path = %info.path,
                    error = %err,
                    "Could not read blob back for image processing; storing without dimensions"
                );
                return Ok(());
            }
        },
    };

    let mime_type = info.mime_type.clone();
    let processed = match tokio::task::spawn_blocking(move || {
        processing::process_image(&data, &mime_type)
    })
    .await
    {
        Ok(Ok(processed)) => processed,
        Ok(Err(err)) => {
            tracing::debug!(
                path = %info.path,
                mime_type = %info.mime_type,
                error = %err,
                "Image not decodable; storing without dimensions"
            );
            return Ok(());
        }
        Err(err) => {
            tracing::warn!(error = %err, "Image processing task panicked");
            return Ok(());
        }
    };

    info.width = processed.width;
    info.height = processed.height;

    if let (Some(thumbnail), Some(preview)) = (processed.thumbnail, processed.preview) {
        let stem = stem_of(name);
        let thumbnail_path = format!("{}/{}_thumb.jpg", base_path, stem);
        let preview_path = format!("{}/{}_preview.jpg", base_path, stem);

        if let Err(err) = store.write(&thumbnail_path, thumbnail).await {
            remove_blobs(store, [info.path.as_str(), thumbnail_path.as_str()]).await;
            return Err(storage_error("upload_file: write thumbnail", err));
        }
        if let Err(err) = store.write(&preview_path, preview).await {
            remove_blobs(
                store,
                [
                    info.path.as_str(),
                    thumbnail_path.as_str(),
                    preview_path.as_str(),
                ],
            )
            .await;
            return Err(storage_error("upload_file: write preview", err));
        }

        info.thumbnail_path = thumbnail_path;
        info.preview_path = preview_path;
        info.has_preview_image = true;
    }

    Ok(())
}

/// Best-effort blob removal; failures are logged, never surfaced.
pub(crate) async fn remove_blobs<'a>(
    store: &'a dyn FileStore,
    paths: impl IntoIterator<Item = &'a str>,
) {
    for path in paths {
        if let Err(err) = store.remove(path).await {
            tracing::warn!(path = %path, error = %err, "Failed to clean up blob");
        }
    }
}

fn stem_of(name: &str) -> &str {
    name.rsplit_once('.').map_or(name, |(stem, _)| stem)
}

/// Validate a client-supplied filename. Path separators, parent references
/// and control characters are rejected outright rather than rewritten.
fn validate_file_name(name: &str) -> Result<String, AppError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(AppError::InvalidParam("filename is required".to_string()));
    }
    if name.len() > MAX_NAME_LENGTH {
        return Err(AppError::InvalidParam(format!(
            "filename exceeds {} characters",
            MAX_NAME_LENGTH
        )));
    }
    if name.contains('/') || name.contains('\\') || name.contains("..") || name.contains('\0') {
        return Err(AppError::InvalidParam(format!(
            "invalid filename: {}",
            name
        )));
    }
    Ok(name.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_file_name_accepts_normal_names() {
        assert_eq!(validate_file_name("test.png").unwrap(), "test.png");
        assert_eq!(validate_file_name("  padded.txt ").unwrap(), "padded.txt");
        assert_eq!(validate_file_name("no-extension").unwrap(), "no-extension");
    }

    #[test]
    fn test_validate_file_name_rejects_traversal() {
        assert!(validate_file_name("").is_err());
        assert!(validate_file_name("   ").is_err());
        assert!(validate_file_name("../evil.png").is_err());
        assert!(validate_file_name("a/b.png").is_err());
        assert!(validate_file_name("a\\b.png").is_err());
        assert!(validate_file_name("a..b.png").is_err());
        assert!(validate_file_name("nul\0.png").is_err());
        assert!(validate_file_name(&"x".repeat(300)).is_err());
    }

    #[test]
    fn test_stem_of() {
        assert_eq!(stem_of("test.png"), "test");
        assert_eq!(stem_of("archive.tar.gz"), "archive.tar");
        assert_eq!(stem_of("noext"), "noext");
    }

    #[tokio::test]
    async fn test_read_head_short_stream() {
        let input = futures::stream::iter(vec![Ok(Bytes::from_static(b"abc"))]);
        let (head, consumed, _rest) = read_head(input).await.unwrap();
        assert_eq!(head, b"abc");
        assert_eq!(consumed.len(), 1);
    }

    #[tokio::test]
    async fn test_read_head_caps_at_sniff_len() {
        let big = Bytes::from(vec![7u8; 1000]);
        let input = futures::stream::iter(vec![Ok(big.clone())]);
        let (head, consumed, _rest) = read_head(input).await.unwrap();
        assert_eq!(head.len(), processing::HEADER_SNIFF_LEN);
        // The full chunk is preserved for replay.
        assert_eq!(consumed[0].len(), 1000);
    }
}
