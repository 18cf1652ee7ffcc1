//! Upload facade.
//!
//! `POST /files` accepts two body shapes: a raw stream with metadata in the
//! query string, or `multipart/form-data`. The multipart path is detected by
//! the boundary in the content type and handed to the ingestor; everything
//! else is treated as a single file stream.

use crate::auth::Session;
use crate::error::{ErrorResponse, HttpAppError};
use crate::state::AppState;
use crate::upload::{ingest_multipart, pipeline, UploadContext};
use attach_core::constants::FILE_TEAM_ID;
use attach_core::{AppError, FileUploadResponse};
use axum::{
    extract::{Query, Request, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use futures::TryStreamExt;
use serde::Deserialize;
use std::future::Future;
use std::io;
use std::pin::Pin;
use std::sync::Arc;

#[derive(Debug, Deserialize)]
pub struct UploadQuery {
    pub channel_id: Option<String>,
    /// Required on the simple-stream path.
    pub filename: Option<String>,
    /// Optional correlation token echoed back in the response.
    pub client_ids: Option<String>,
}

/// POST /files
#[utoipa::path(
    post,
    path = "/files",
    tag = "files",
    params(
        ("channel_id" = Option<String>, Query, description = "Target channel"),
        ("filename" = Option<String>, Query, description = "Filename for raw-body uploads"),
        ("client_ids" = Option<String>, Query, description = "Correlation token")
    ),
    request_body(content = Vec<u8>, content_type = "multipart/form-data"),
    responses(
        (status = 201, description = "Files uploaded", body = FileUploadResponse),
        (status = 400, description = "Invalid request", body = ErrorResponse),
        (status = 413, description = "File too large", body = ErrorResponse),
        (status = 501, description = "Attachments disabled", body = ErrorResponse)
    )
)]
pub fn upload_file_stream(
    State(state): State<Arc<AppState>>,
    session: Session,
    Query(query): Query<UploadQuery>,
    request: Request,
) -> Pin<Box<dyn Future<Output = Result<Response, HttpAppError>> + Send>> {
    Box::pin(upload_file_stream_inner(state, session, query, request))
}

async fn upload_file_stream_inner(
    state: Arc<AppState>,
    session: Session,
    query: UploadQuery,
    request: Request,
) -> Result<Response, HttpAppError> {
    // Snapshot the settings once; a live config reload must not change the
    // limits under this request.
    let settings = state.settings();

    if !settings.enable_file_attachments || settings.storage_driver.is_empty() {
        return Err(AppError::NotImplemented("file attachments are disabled".to_string()).into());
    }
    let Some(store) = state.file_store.clone() else {
        return Err(AppError::NotImplemented("no storage driver configured".to_string()).into());
    };

    // Reject an oversized declared length before touching the body.
    let content_length = request
        .headers()
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<i64>().ok())
        .unwrap_or(-1);
    if content_length > settings.max_file_size {
        return Err(AppError::PayloadTooLarge(format!(
            "declared length {} exceeds the {} byte limit",
            content_length, settings.max_file_size
        ))
        .into());
    }

    let boundary = request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .and_then(|ct| multer::parse_boundary(ct).ok());

    let timestamp = Utc::now();
    let channel_id = query.channel_id.clone().filter(|c| !c.is_empty());
    let body = request
        .into_body()
        .into_data_stream()
        .map_err(io::Error::other);

    let resp = handle_upload_body(
        store.as_ref(),
        state.file_infos.as_ref(),
        state.permissions.as_ref(),
        &settings,
        &session,
        timestamp,
        boundary,
        channel_id,
        content_length,
        &query,
        body,
    )
    .await?;

    Ok((StatusCode::CREATED, Json(resp)).into_response())
}

/// Dispatches to the multipart or single-stream ingestion path. Pulled out of
/// the handler so every borrow shares one named lifetime.
#[allow(clippy::too_many_arguments)]
async fn handle_upload_body<'a, S>(
    store: &'a dyn attach_storage::FileStore,
    file_infos: &'a dyn attach_db::FileInfoStore,
    permissions: &'a dyn crate::auth::PermissionChecker,
    settings: &'a attach_core::FileSettings,
    session: &'a Session,
    timestamp: chrono::DateTime<Utc>,
    boundary: Option<String>,
    channel_id: Option<String>,
    content_length: i64,
    query: &'a UploadQuery,
    body: S,
) -> Result<FileUploadResponse, HttpAppError>
where
    S: futures::Stream<Item = Result<bytes::Bytes, io::Error>> + Send + Unpin + 'static,
{
    match boundary {
        Some(boundary) => {
            let fut: Pin<Box<dyn Future<Output = Result<FileUploadResponse, AppError>> + Send + 'a>> =
                Box::pin(ingest_multipart(
                    store,
                    file_infos,
                    permissions,
                    settings,
                    session,
                    timestamp,
                    boundary,
                    channel_id,
                    body,
                ));
            let resp = fut.await?;
            Ok(resp)
        }
        None => {
            // Simple POST: the whole body is one file, metadata in the URL.
            let channel_id = channel_id
                .ok_or_else(|| AppError::InvalidParam("channel_id is required".to_string()))?;
            let filename = query
                .filename
                .clone()
                .filter(|f| !f.is_empty())
                .ok_or_else(|| AppError::InvalidParam("filename is required".to_string()))?;

            if !permissions.can_upload_to_channel(session, &channel_id).await {
                return Err(AppError::Forbidden(format!(
                    "no permission to upload files to channel {}",
                    channel_id
                ))
                .into());
            }

            let ctx = UploadContext {
                timestamp,
                team_id: FILE_TEAM_ID.to_string(),
                channel_id,
                user_id: session.user_id.clone(),
                name: filename,
                content_length,
            };
            let fut: Pin<Box<dyn Future<Output = Result<attach_core::FileInfo, AppError>> + Send + 'a>> =
                Box::pin(pipeline::upload_file(store, file_infos, settings, ctx, body));
            let info = fut.await?;

            Ok(FileUploadResponse {
                file_infos: vec![info],
                client_ids: query.client_ids.clone().into_iter().collect(),
            })
        }
    }
}
