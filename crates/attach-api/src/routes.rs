//! Router construction.

use crate::handlers::{files, upload};
use crate::state::AppState;
use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// Build the file service router.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/files", post(upload::upload_file_stream))
        .route("/files/{file_id}", get(files::get_file))
        .route("/files/{file_id}/thumbnail", get(files::get_file_thumbnail))
        .route("/files/{file_id}/preview", get(files::get_file_preview))
        .route("/files/{file_id}/info", get(files::get_file_info))
        .route("/files/{file_id}/link", get(files::get_file_link))
        .route("/files/{file_id}/public", get(files::get_public_file))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
