//! File retrieval handlers: original bytes, thumbnail, preview, metadata,
//! public link issuance, and the unauthenticated public route.

use crate::auth::Session;
use crate::error::{error_page_response, storage_error, store_error, ErrorResponse, HttpAppError};
use crate::handlers::file_response::file_body_response;
use crate::public_link::{public_link_url, verify_public_link_hash};
use crate::state::AppState;
use attach_core::constants::DERIVATIVE_CONTENT_TYPE;
use attach_core::{id, AppError, FileInfo};
use attach_storage::{ByteStream, FileStore};
use axum::{
    extract::{Path, Query, State},
    http::header,
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use std::sync::Arc;

#[derive(Debug, Deserialize)]
pub struct FileQuery {
    /// `?download=1` forces `Content-Disposition: attachment`.
    pub download: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PublicFileQuery {
    pub h: Option<String>,
}

/// Look up a file for an authenticated read and enforce the access rule:
/// the creator may always read; anyone else needs channel-read permission
/// through the post the file is attached to. Unattached files are
/// creator-only.
async fn file_for_read(
    state: &AppState,
    session: &Session,
    file_id: &str,
) -> Result<FileInfo, AppError> {
    let info = fetch_live_info(state, file_id).await?;

    if info.creator_id != session.user_id {
        if info.post_id.is_empty() {
            return Err(AppError::Forbidden(
                "file is not attached to a post".to_string(),
            ));
        }
        if !state
            .permissions
            .can_read_channel_of_post(session, &info.post_id)
            .await
        {
            return Err(AppError::Forbidden(
                "no permission to read the channel of this file".to_string(),
            ));
        }
    }

    Ok(info)
}

/// Fetch a live (non-deleted) record, validating the id first.
async fn fetch_live_info(state: &AppState, file_id: &str) -> Result<FileInfo, AppError> {
    if !id::is_valid_id(file_id) {
        return Err(AppError::InvalidParam(format!("invalid file_id: {}", file_id)));
    }

    state
        .file_infos
        .get(file_id)
        .await
        .map_err(|err| store_error("get_file_info", err))?
        .filter(|info| !info.is_deleted())
        .ok_or_else(|| AppError::NotFound(format!("file not found: {}", file_id)))
}

fn require_store(state: &AppState) -> Result<&dyn FileStore, AppError> {
    state
        .file_store
        .as_deref()
        .ok_or_else(|| AppError::NotImplemented("no storage driver configured".to_string()))
}

async fn open_blob(store: &dyn FileStore, path: &str) -> Result<ByteStream, AppError> {
    store
        .read_stream(path)
        .await
        .map_err(|err| storage_error("read_file", err))
}

fn force_download(query: &FileQuery) -> bool {
    matches!(
        query.download.as_deref(),
        Some("1") | Some("t") | Some("true") | Some("T") | Some("TRUE") | Some("True")
    )
}

/// GET /files/{file_id}: serve the original bytes.
#[utoipa::path(
    get,
    path = "/files/{file_id}",
    tag = "files",
    params(
        ("file_id" = String, Path, description = "File id"),
        ("download" = Option<String>, Query, description = "Force attachment disposition")
    ),
    responses(
        (status = 200, description = "File contents"),
        (status = 403, description = "No permission", body = ErrorResponse),
        (status = 404, description = "Unknown file", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip(state, session), fields(user_id = %session.user_id))]
pub async fn get_file(
    State(state): State<Arc<AppState>>,
    session: Session,
    Path(file_id): Path<String>,
    Query(query): Query<FileQuery>,
) -> Result<Response, HttpAppError> {
    let info = file_for_read(&state, &session, &file_id).await?;
    let store = require_store(&state)?;
    let stream = open_blob(store, &info.path).await?;

    Ok(file_body_response(
        &info.name,
        &info.mime_type,
        Some(info.size),
        stream,
        force_download(&query),
    )?)
}

/// GET /files/{file_id}/thumbnail
#[utoipa::path(
    get,
    path = "/files/{file_id}/thumbnail",
    tag = "files",
    params(("file_id" = String, Path, description = "File id")),
    responses(
        (status = 200, description = "Thumbnail JPEG"),
        (status = 400, description = "File has no thumbnail", body = ErrorResponse),
        (status = 404, description = "Unknown file", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip(state, session), fields(user_id = %session.user_id))]
pub async fn get_file_thumbnail(
    State(state): State<Arc<AppState>>,
    session: Session,
    Path(file_id): Path<String>,
    Query(query): Query<FileQuery>,
) -> Result<Response, HttpAppError> {
    let info = file_for_read(&state, &session, &file_id).await?;
    if info.thumbnail_path.is_empty() {
        return Err(AppError::InvalidParam(format!("file {} has no thumbnail", info.id)).into());
    }

    let store = require_store(&state)?;
    let stream = open_blob(store, &info.thumbnail_path).await?;

    Ok(file_body_response(
        &info.name,
        DERIVATIVE_CONTENT_TYPE,
        None,
        stream,
        force_download(&query),
    )?)
}

/// GET /files/{file_id}/preview
#[utoipa::path(
    get,
    path = "/files/{file_id}/preview",
    tag = "files",
    params(("file_id" = String, Path, description = "File id")),
    responses(
        (status = 200, description = "Preview JPEG"),
        (status = 400, description = "File has no preview", body = ErrorResponse),
        (status = 404, description = "Unknown file", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip(state, session), fields(user_id = %session.user_id))]
pub async fn get_file_preview(
    State(state): State<Arc<AppState>>,
    session: Session,
    Path(file_id): Path<String>,
    Query(query): Query<FileQuery>,
) -> Result<Response, HttpAppError> {
    let info = file_for_read(&state, &session, &file_id).await?;
    if info.preview_path.is_empty() {
        return Err(AppError::InvalidParam(format!("file {} has no preview", info.id)).into());
    }

    let store = require_store(&state)?;
    let stream = open_blob(store, &info.preview_path).await?;

    Ok(file_body_response(
        &info.name,
        DERIVATIVE_CONTENT_TYPE,
        None,
        stream,
        force_download(&query),
    )?)
}

/// GET /files/{file_id}/info: metadata JSON (internal paths omitted).
#[utoipa::path(
    get,
    path = "/files/{file_id}/info",
    tag = "files",
    params(("file_id" = String, Path, description = "File id")),
    responses(
        (status = 200, description = "File metadata", body = FileInfo),
        (status = 404, description = "Unknown file", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip(state, session), fields(user_id = %session.user_id))]
pub async fn get_file_info(
    State(state): State<Arc<AppState>>,
    session: Session,
    Path(file_id): Path<String>,
) -> Result<Response, HttpAppError> {
    let info = file_for_read(&state, &session, &file_id).await?;

    Ok((
        [(header::CACHE_CONTROL, "max-age=2592000, public")],
        Json(info),
    )
        .into_response())
}

/// GET /files/{file_id}/link: issue a public link for an attached file.
#[utoipa::path(
    get,
    path = "/files/{file_id}/link",
    tag = "files",
    params(("file_id" = String, Path, description = "File id")),
    responses(
        (status = 200, description = "Public link"),
        (status = 400, description = "File is not attached to a post", body = ErrorResponse),
        (status = 501, description = "Public links disabled", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip(state, session), fields(user_id = %session.user_id))]
pub async fn get_file_link(
    State(state): State<Arc<AppState>>,
    session: Session,
    Path(file_id): Path<String>,
) -> Result<Response, HttpAppError> {
    let settings = state.settings();
    if !settings.enable_public_link {
        return Err(AppError::NotImplemented("public links are disabled".to_string()).into());
    }

    let info = file_for_read(&state, &session, &file_id).await?;
    if info.post_id.is_empty() {
        return Err(
            AppError::InvalidParam("file must be attached to a post to be shared".to_string())
                .into(),
        );
    }

    let link = public_link_url(&state.site_url, &info.id, &settings.public_link_salt);
    Ok(Json(serde_json::json!({ "link": link })).into_response())
}

/// GET /files/{file_id}/public: unauthenticated read via a signed link.
///
/// Hash failures render an HTML error page: this route is opened directly by
/// browsers, not API clients.
#[utoipa::path(
    get,
    path = "/files/{file_id}/public",
    tag = "files",
    params(
        ("file_id" = String, Path, description = "File id"),
        ("h" = String, Query, description = "Link hash")
    ),
    responses(
        (status = 200, description = "File contents"),
        (status = 400, description = "Missing or invalid hash"),
        (status = 501, description = "Public links disabled", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip(state, query))]
pub async fn get_public_file(
    State(state): State<Arc<AppState>>,
    Path(file_id): Path<String>,
    Query(query): Query<PublicFileQuery>,
) -> Result<Response, HttpAppError> {
    let settings = state.settings();
    if !settings.enable_public_link {
        return Err(AppError::NotImplemented("public links are disabled".to_string()).into());
    }

    let info = fetch_live_info(&state, &file_id).await?;

    let hash = query.h.unwrap_or_default();
    if hash.is_empty()
        || !verify_public_link_hash(&hash, &info.id, &settings.public_link_salt)
    {
        return Ok(error_page_response(&AppError::InvalidParam(
            "public link is not valid".to_string(),
        )));
    }

    let store = require_store(&state)?;
    let stream = open_blob(store, &info.path).await?;

    Ok(file_body_response(
        &info.name,
        &info.mime_type,
        Some(info.size),
        stream,
        false,
    )?)
}
