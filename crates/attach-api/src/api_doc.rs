//! OpenAPI document for the file service.

use crate::error::ErrorResponse;
use attach_core::{FileInfo, FileUploadResponse};
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::handlers::upload::upload_file_stream,
        crate::handlers::files::get_file,
        crate::handlers::files::get_file_thumbnail,
        crate::handlers::files::get_file_preview,
        crate::handlers::files::get_file_info,
        crate::handlers::files::get_file_link,
        crate::handlers::files::get_public_file,
    ),
    components(schemas(FileInfo, FileUploadResponse, ErrorResponse)),
    tags((name = "files", description = "File upload and retrieval"))
)]
pub struct ApiDoc;
