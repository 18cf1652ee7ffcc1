//! HTTP error response conversion
//!
//! Handlers return `Result<impl IntoResponse, HttpAppError>`; any `AppError`
//! (or collaborator error with an `Into` impl) converts into `HttpAppError`
//! and renders consistently: status from the error, JSON body, structured log
//! at the variant's level. The public-file route renders errors as an HTML
//! page instead; see [`error_page_response`].

use attach_core::{AppError, LogLevel};
use attach_db::StoreError;
use attach_storage::StorageError;
use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use utoipa::ToSchema;

#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
    /// Machine-readable error code for programmatic handling
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// Wrapper type for AppError to implement IntoResponse
/// (orphan rules: IntoResponse is external, AppError lives in attach-core).
#[derive(Debug)]
pub struct HttpAppError(pub AppError);

impl From<AppError> for HttpAppError {
    fn from(err: AppError) -> Self {
        HttpAppError(err)
    }
}

impl From<anyhow::Error> for HttpAppError {
    fn from(err: anyhow::Error) -> Self {
        HttpAppError(AppError::from(err))
    }
}

impl From<StorageError> for HttpAppError {
    fn from(err: StorageError) -> Self {
        HttpAppError(storage_error("storage", err))
    }
}

impl From<StoreError> for HttpAppError {
    fn from(err: StoreError) -> Self {
        HttpAppError(store_error("file_info_store", err))
    }
}

/// Map a blob-store failure into the domain taxonomy, tagged with the
/// operation that hit it.
pub fn storage_error(op: &str, err: StorageError) -> AppError {
    match err {
        StorageError::NotFound(path) => AppError::NotFound(format!("blob not found: {}", path)),
        StorageError::InvalidPath(msg) => AppError::InvalidParam(msg),
        other => AppError::Storage(format!("{}: {}", op, other)),
    }
}

/// Map a metadata-store failure into the domain taxonomy.
pub fn store_error(op: &str, err: StoreError) -> AppError {
    match err {
        StoreError::NotFound(id) => AppError::NotFound(format!("file not found: {}", id)),
        other => AppError::internal_op(op, other),
    }
}

fn log_error(error: &AppError) {
    let code = error.error_code();
    match error.log_level() {
        LogLevel::Debug => {
            tracing::debug!(error = %error.detailed_message(), code = code, "Request failed");
        }
        LogLevel::Warn => {
            tracing::warn!(error = %error.detailed_message(), code = code, "Request failed");
        }
        LogLevel::Error => {
            tracing::error!(error = %error.detailed_message(), code = code, "Request failed");
        }
    }
}

fn is_production_env() -> bool {
    std::env::var("ENVIRONMENT")
        .map(|env| matches!(env.to_lowercase().as_str(), "production" | "prod"))
        .unwrap_or(false)
}

impl IntoResponse for HttpAppError {
    fn into_response(self) -> Response {
        let app_error = &self.0;

        let status = StatusCode::from_u16(app_error.http_status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        log_error(app_error);

        let details = if is_production_env() || app_error.is_sensitive() {
            None
        } else {
            Some(app_error.detailed_message())
        };

        let body = Json(ErrorResponse {
            error: app_error.client_message(),
            code: app_error.error_code().to_string(),
            details,
        });

        (status, body).into_response()
    }
}

/// Render an error as a minimal HTML page. Used by the public file route,
/// which is loaded directly by browsers rather than API clients.
pub fn error_page_response(error: &AppError) -> Response {
    let status = StatusCode::from_u16(error.http_status_code())
        .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

    log_error(error);

    let body = format!(
        "<!DOCTYPE html>\n<html><head><title>Error</title></head>\
         <body><h1>{}</h1><p>{}</p></body></html>\n",
        status.as_u16(),
        error.client_message()
    );

    (
        status,
        [(header::CONTENT_TYPE, "text/html; charset=utf-8")],
        body,
    )
        .into_response()
}
