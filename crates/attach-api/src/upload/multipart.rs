//! Multipart upload ingestion.
//!
//! Form fields and file parts arrive in arbitrary order, but nothing may be
//! written to storage before `channel_id` is known. The ingestor therefore
//! runs in two modes:
//!
//! - **Pre-scan**: the body is read through a tee that mirrors every byte
//!   into a bounded buffer. If `channel_id` shows up, the reader is rebuilt
//!   over `buffered ++ remaining` and parsing restarts in streaming mode; the
//!   buffer never exceeds the configured max file size. When the whole
//!   message ends up buffered (channel_id last), the restart simply replays
//!   it from memory.
//! - **Streaming**: `channel_id` is known; file parts go straight through the
//!   upload pipeline with unknown length, and `client_ids` fields are
//!   collected in order. They bind to files by position once the message is
//!   complete; a non-empty list whose length differs from the file count
//!   fails the request.
//!
//! A `channel_id` URL parameter skips the pre-scan entirely.

use super::pipeline::{self, UploadContext};
use crate::auth::{PermissionChecker, Session};
use attach_core::constants::FILE_TEAM_ID;
use attach_core::{AppError, FileInfo, FileSettings, FileUploadResponse};
use attach_db::FileInfoStore;
use attach_storage::FileStore;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures::{Stream, StreamExt, TryStreamExt};
use std::io;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};

/// Cap on a single non-file form value.
const MAX_FORM_VALUE_BYTES: usize = 10 * 1024;

/// Ingest a multipart upload request.
#[allow(clippy::too_many_arguments)]
pub async fn ingest_multipart<'a, S>(
    store: &'a dyn FileStore,
    file_infos: &'a dyn FileInfoStore,
    permissions: &'a dyn PermissionChecker,
    settings: &'a FileSettings,
    session: &'a Session,
    timestamp: DateTime<Utc>,
    boundary: String,
    channel_id: Option<String>,
    body: S,
) -> Result<FileUploadResponse, AppError>
where
    S: Stream<Item = Result<Bytes, io::Error>> + Send + Unpin + 'static,
{
    if let Some(channel_id) = channel_id {
        // channel_id came in the URL; no pre-scan needed.
        return stream_files(
            store,
            file_infos,
            permissions,
            settings,
            session,
            timestamp,
            Some(channel_id),
            &boundary,
            body,
        )
        .await;
    }

    let (channel_id, replay) = pre_scan(settings, &boundary, body).await?;

    stream_files(
        store,
        file_infos,
        permissions,
        settings,
        session,
        timestamp,
        Some(channel_id),
        &boundary,
        replay,
    )
    .await
}

/// Shared state between the tee stream handed to the pre-scan parser and the
/// rewind step that reclaims it.
struct PreScanState<S> {
    inner: Option<S>,
    buffered: Vec<Bytes>,
    buffered_len: u64,
    cap: u64,
    overflowed: bool,
}

/// Mirrors every chunk pulled by the multipart parser into the bounded
/// buffer, so the consumed prefix can be replayed after a rewind.
struct TeeStream<S> {
    shared: Arc<Mutex<PreScanState<S>>>,
}

impl<S> Stream for TeeStream<S>
where
    S: Stream<Item = Result<Bytes, io::Error>> + Unpin,
{
    type Item = Result<Bytes, io::Error>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let mut shared = self
            .shared
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        let polled = match shared.inner.as_mut() {
            Some(inner) => Pin::new(inner).poll_next(cx),
            None => return Poll::Ready(None),
        };

        match polled {
            Poll::Ready(Some(Ok(chunk))) => {
                if shared.buffered_len + chunk.len() as u64 > shared.cap {
                    shared.overflowed = true;
                    return Poll::Ready(Some(Err(io::Error::other(
                        "multipart pre-scan buffer limit exceeded",
                    ))));
                }
                shared.buffered_len += chunk.len() as u64;
                shared.buffered.push(chunk.clone());
                Poll::Ready(Some(Ok(chunk)))
            }
            Poll::Ready(Some(Err(err))) => Poll::Ready(Some(Err(err))),
            Poll::Ready(None) => {
                shared.inner = None;
                Poll::Ready(None)
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

type ReplayStream = futures::stream::BoxStream<'static, Result<Bytes, io::Error>>;

/// Scan the body until `channel_id` is known, buffering through the tee.
/// Returns the channel id and a stream replaying the consumed prefix ahead of
/// whatever is left on the wire.
async fn pre_scan<S>(
    settings: &FileSettings,
    boundary: &str,
    body: S,
) -> Result<(String, ReplayStream), AppError>
where
    S: Stream<Item = Result<Bytes, io::Error>> + Send + Unpin + 'static,
{
    let shared = Arc::new(Mutex::new(PreScanState {
        inner: Some(body),
        buffered: Vec::new(),
        buffered_len: 0,
        cap: settings.max_file_size as u64,
        overflowed: false,
    }));

    let mut multipart = multer::Multipart::new(
        TeeStream {
            shared: shared.clone(),
        },
        boundary,
    );

    let mut channel_id: Option<String> = None;
    let mut saw_file = false;

    let scan_result: Result<(), AppError> = loop {
        match multipart.next_field().await {
            Ok(Some(mut field)) => {
                let Some(field_name) = field.name().map(str::to_string).filter(|n| !n.is_empty())
                else {
                    continue;
                };

                // A part with a name but an empty filename is a form value.
                let is_file = field.file_name().map(|f| !f.is_empty()).unwrap_or(false);
                if is_file {
                    // File before channel_id: keep buffering; the tee records
                    // the bytes while next_field() skips past this part.
                    saw_file = true;
                    continue;
                }

                let value = read_form_value(&mut field).await;
                match value {
                    Err(err) => break Err(err),
                    Ok(value) => match field_name.as_str() {
                        "channel_id" => {
                            if !value.is_empty() {
                                channel_id = Some(value);
                                break Ok(());
                            }
                        }
                        "client_ids" => {
                            // Recorded on replay; only validated here.
                        }
                        other => {
                            break Err(AppError::InvalidParam(format!(
                                "unexpected form field: {}",
                                other
                            )))
                        }
                    },
                }
            }
            Ok(None) => {
                break Err(if saw_file {
                    AppError::InvalidParam("channel_id is required".to_string())
                } else {
                    AppError::InvalidParam("no file parts in request".to_string())
                });
            }
            Err(err) => {
                let overflowed = shared
                    .lock()
                    .unwrap_or_else(|poisoned| poisoned.into_inner())
                    .overflowed;
                break Err(if overflowed {
                    AppError::InvalidParam("channel_id is required".to_string())
                } else {
                    multer_error(err)
                });
            }
        }
    };

    drop(multipart);
    let state = Arc::try_unwrap(shared)
        .map_err(|_| AppError::Internal("multipart pre-scan buffer still shared".to_string()))?
        .into_inner()
        .unwrap_or_else(|poisoned| poisoned.into_inner());

    scan_result?;
    let channel_id =
        channel_id.ok_or_else(|| AppError::InvalidParam("channel_id is required".to_string()))?;

    tracing::debug!(
        buffered_bytes = state.buffered_len,
        fully_buffered = state.inner.is_none(),
        "Multipart pre-scan complete; rewinding"
    );

    let buffered = futures::stream::iter(
        state
            .buffered
            .into_iter()
            .map(Ok::<_, io::Error>)
            .collect::<Vec<_>>(),
    );
    let replay: ReplayStream = match state.inner {
        Some(rest) => buffered.chain(rest).boxed(),
        None => buffered.boxed(),
    };

    Ok((channel_id, replay))
}

/// Streaming mode: parse the message with `channel_id` known (or about to be
/// re-discovered on replay) and drive the pipeline per file part.
#[allow(clippy::too_many_arguments)]
async fn stream_files<'a, S>(
    store: &'a dyn FileStore,
    file_infos: &'a dyn FileInfoStore,
    permissions: &'a dyn PermissionChecker,
    settings: &'a FileSettings,
    session: &'a Session,
    timestamp: DateTime<Utc>,
    mut channel_id: Option<String>,
    boundary: &'a str,
    body: S,
) -> Result<FileUploadResponse, AppError>
where
    S: Stream<Item = Result<Bytes, io::Error>> + Send + Unpin + 'static,
{
    let mut multipart = multer::Multipart::new(body, boundary);
    let mut resp = FileUploadResponse::default();

    // client_ids may be interleaved anywhere in the stream; they bind to
    // files by position once the message is complete.
    let mut client_ids: Vec<String> = Vec::new();
    let mut permission_checked = false;

    let result: Result<(), AppError> = loop {
        let field = match multipart.next_field().await {
            Ok(field) => field,
            Err(err) => break Err(multer_error(err)),
        };
        let Some(mut field) = field else {
            break Ok(());
        };

        let Some(field_name) = field.name().map(str::to_string).filter(|n| !n.is_empty()) else {
            continue;
        };
        let file_name = field.file_name().map(str::to_string).filter(|f| !f.is_empty());

        match file_name {
            None => {
                let value = match read_form_value(&mut field).await {
                    Ok(value) => value,
                    Err(err) => break Err(err),
                };
                match field_name.as_str() {
                    "channel_id" => {
                        if !value.is_empty() {
                            channel_id = Some(value);
                        }
                    }
                    "client_ids" => {
                        client_ids.push(value);
                    }
                    other => {
                        break Err(AppError::InvalidParam(format!(
                            "unexpected form field: {}",
                            other
                        )))
                    }
                }
            }
            Some(name) => {
                let Some(cid) = channel_id.as_deref() else {
                    break Err(AppError::InvalidParam("channel_id is required".to_string()));
                };

                if !permission_checked {
                    if !permissions.can_upload_to_channel(session, cid).await {
                        break Err(AppError::Forbidden(format!(
                            "no permission to upload files to channel {}",
                            cid
                        )));
                    }
                    permission_checked = true;
                }

                let ctx = UploadContext {
                    timestamp,
                    team_id: FILE_TEAM_ID.to_string(),
                    channel_id: cid.to_string(),
                    user_id: session.user_id.clone(),
                    name,
                    content_length: -1,
                };
                let input = Box::pin(field.map_err(io::Error::other));

                match pipeline::upload_file(store, file_infos, settings, ctx, input).await {
                    Ok(info) => resp.file_infos.push(info),
                    Err(err) => break Err(err),
                }
            }
        }
    };

    let result = result.and_then(|()| {
        if resp.file_infos.is_empty() {
            return Err(AppError::InvalidParam("no file parts in request".to_string()));
        }
        if !client_ids.is_empty() && client_ids.len() != resp.file_infos.len() {
            return Err(AppError::InvalidParam(
                "client_ids do not match the number of files".to_string(),
            ));
        }
        resp.client_ids = client_ids;
        Ok(())
    });

    if let Err(err) = result {
        // No partial success: undo every file this request already stored.
        cleanup_uploaded(store, file_infos, &resp.file_infos).await;
        return Err(err);
    }

    Ok(resp)
}

/// Read a non-file form value, enforcing the size cap.
async fn read_form_value(field: &mut multer::Field<'static>) -> Result<String, AppError> {
    let mut buf = Vec::new();
    loop {
        match field.chunk().await {
            Ok(Some(chunk)) => {
                if buf.len() + chunk.len() > MAX_FORM_VALUE_BYTES {
                    return Err(AppError::InvalidParam(format!(
                        "form value exceeds {} bytes",
                        MAX_FORM_VALUE_BYTES
                    )));
                }
                buf.extend_from_slice(&chunk);
            }
            Ok(None) => break,
            Err(err) => return Err(multer_error(err)),
        }
    }
    String::from_utf8(buf)
        .map_err(|_| AppError::InvalidParam("form value is not valid UTF-8".to_string()))
}

/// Remove blobs and records for files that were ingested before the request
/// failed as a whole.
async fn cleanup_uploaded<'a>(
    store: &'a dyn FileStore,
    file_infos: &'a dyn FileInfoStore,
    uploaded: &'a [FileInfo],
) {
    for info in uploaded {
        let paths = [&info.path, &info.thumbnail_path, &info.preview_path];
        pipeline::remove_blobs(store, paths.into_iter().filter(|p| !p.is_empty()).map(String::as_str))
            .await;
        if let Err(err) = file_infos.delete(&info.id).await {
            tracing::warn!(file_id = %info.id, error = %err, "Failed to clean up file info record");
        }
    }
}

fn multer_error(err: multer::Error) -> AppError {
    match err {
        multer::Error::StreamReadFailed(source) => {
            AppError::Internal(format!("failed reading multipart body: {}", source))
        }
        other => AppError::InvalidParam(format!("malformed multipart request: {}", other)),
    }
}
