//! File body response construction.
//!
//! Every endpoint that returns file bytes goes through [`file_body_response`]
//! so the header contract is applied uniformly: private caching, sniffing and
//! framing disabled, script-capable content types neutralized, and the
//! disposition chosen from the media allowlist unless a download was forced.

use attach_core::AppError;
use attach_storage::ByteStream;
use axum::{
    body::Body,
    http::{header, StatusCode},
    response::Response,
};
use futures::StreamExt;
use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};

/// Content types a browser could execute; rewritten to `text/plain`.
const UNSAFE_CONTENT_TYPES: &[&str] = &[
    "application/javascript",
    "application/ecmascript",
    "text/javascript",
    "text/ecmascript",
    "application/x-javascript",
    "text/html",
];

/// Content types browsers render inline.
const MEDIA_CONTENT_TYPES: &[&str] = &[
    "image/jpeg",
    "image/png",
    "image/bmp",
    "image/gif",
    "video/avi",
    "video/mpeg",
    "video/mp4",
    "audio/mpeg",
    "audio/wav",
];

const FILENAME_ESCAPE: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'%')
    .add(b'\'')
    .add(b'/')
    .add(b';')
    .add(b'\\');

/// Build a streamed file response with the safe header set.
///
/// `size` is emitted as `Content-Length` when positive (derivative sizes are
/// not tracked, so those responses omit it).
pub fn file_body_response(
    filename: &str,
    content_type: &str,
    size: Option<i64>,
    stream: ByteStream,
    force_download: bool,
) -> Result<Response, AppError> {
    let content_type = effective_content_type(content_type);

    let inline = !force_download
        && MEDIA_CONTENT_TYPES
            .iter()
            .any(|media| content_type.starts_with(media));
    let disposition_kind = if inline { "inline" } else { "attachment" };

    let escaped = utf8_percent_encode(filename, FILENAME_ESCAPE).to_string();
    let disposition = format!(
        "{};filename=\"{}\"; filename*=UTF-8''{}",
        disposition_kind, escaped, escaped
    );

    let mut builder = Response::builder()
        .status(StatusCode::OK)
        .header(header::CACHE_CONTROL, "max-age=2592000, private")
        .header(header::X_CONTENT_TYPE_OPTIONS, "nosniff")
        .header(header::X_FRAME_OPTIONS, "DENY")
        .header(header::CONTENT_SECURITY_POLICY, "Frame-ancestors 'none'")
        .header(header::CONTENT_TYPE, content_type)
        .header(header::CONTENT_DISPOSITION, disposition);

    if let Some(size) = size.filter(|s| *s > 0) {
        builder = builder.header(header::CONTENT_LENGTH, size);
    }

    let body = Body::from_stream(
        stream.map(|chunk| chunk.map_err(|err| std::io::Error::other(err.to_string()))),
    );

    builder
        .body(body)
        .map_err(|err| AppError::Internal(format!("failed to build file response: {}", err)))
}

/// Normalize the stored content type for serving: empty becomes the opaque
/// default and script-capable types are degraded to plain text.
fn effective_content_type(content_type: &str) -> String {
    if content_type.is_empty() {
        return "application/octet-stream".to_string();
    }
    for unsafe_type in UNSAFE_CONTENT_TYPES {
        if content_type.starts_with(unsafe_type) {
            return "text/plain".to_string();
        }
    }
    content_type.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    fn stub_stream() -> ByteStream {
        Box::pin(futures::stream::iter(vec![Ok(Bytes::from_static(b"data"))]))
    }

    fn header<'a>(response: &'a Response, name: &str) -> &'a str {
        response
            .headers()
            .get(name)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
    }

    #[test]
    fn test_effective_content_type() {
        assert_eq!(effective_content_type(""), "application/octet-stream");
        assert_eq!(effective_content_type("text/html"), "text/plain");
        assert_eq!(
            effective_content_type("text/html; charset=utf-8"),
            "text/plain"
        );
        assert_eq!(effective_content_type("application/javascript"), "text/plain");
        assert_eq!(effective_content_type("image/png"), "image/png");
        assert_eq!(effective_content_type("application/pdf"), "application/pdf");
    }

    #[test]
    fn test_media_type_served_inline() {
        let response =
            file_body_response("test.png", "image/png", Some(100), stub_stream(), false).unwrap();
        assert!(header(&response, "content-disposition").starts_with("inline;"));
        assert_eq!(header(&response, "content-type"), "image/png");
        assert_eq!(header(&response, "content-length"), "100");
        assert_eq!(header(&response, "x-content-type-options"), "nosniff");
        assert_eq!(header(&response, "x-frame-options"), "DENY");
        assert_eq!(
            header(&response, "cache-control"),
            "max-age=2592000, private"
        );
        assert_eq!(
            header(&response, "content-security-policy"),
            "Frame-ancestors 'none'"
        );
    }

    #[test]
    fn test_force_download_overrides_inline() {
        let response =
            file_body_response("test.png", "image/png", Some(100), stub_stream(), true).unwrap();
        assert!(header(&response, "content-disposition").starts_with("attachment;"));
    }

    #[test]
    fn test_non_media_type_is_attachment() {
        let response =
            file_body_response("doc.pdf", "application/pdf", None, stub_stream(), false).unwrap();
        assert!(header(&response, "content-disposition").starts_with("attachment;"));
        assert_eq!(header(&response, "content-length"), "");
    }

    #[test]
    fn test_filename_is_escaped() {
        let response = file_body_response(
            "my file\"x.png",
            "image/png",
            None,
            stub_stream(),
            false,
        )
        .unwrap();
        let disposition = header(&response, "content-disposition");
        assert!(disposition.contains("my%20file%22x.png"));
        assert!(disposition.contains("filename*=UTF-8''my%20file%22x.png"));
    }
}
