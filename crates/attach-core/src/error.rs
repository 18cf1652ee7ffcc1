//! Error types module
//!
//! All errors surfaced by the file service are unified under the [`AppError`]
//! enum. Each variant self-describes its HTTP status code, a machine-readable
//! error code, the log level it should be reported at, and a client-safe
//! message. Internal causes are kept for logging and never emitted to clients.

use std::io;

/// Log level for error reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Expected errors like validation failures
    Debug,
    /// Recoverable issues like permission denials
    Warn,
    /// Unexpected failures
    Error,
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("invalid parameter: {0}")]
    InvalidParam(String),

    #[error("payload too large: {0}")]
    PayloadTooLarge(String),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("not implemented: {0}")]
    NotImplemented(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("internal error: {0}")]
    Internal(String),

    #[error("{message}")]
    InternalWithSource {
        message: String,
        #[source]
        source: anyhow::Error,
    },
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::InternalWithSource {
            message: err.to_string(),
            source: err,
        }
    }
}

impl From<io::Error> for AppError {
    fn from(err: io::Error) -> Self {
        AppError::Internal(format!("IO error: {}", err))
    }
}

/// Static metadata for each variant: (http_status, error_code, sensitive, log_level).
fn static_metadata(err: &AppError) -> (u16, &'static str, bool, LogLevel) {
    match err {
        AppError::InvalidParam(_) => (400, "INVALID_PARAM", false, LogLevel::Debug),
        AppError::PayloadTooLarge(_) => (413, "PAYLOAD_TOO_LARGE", false, LogLevel::Debug),
        AppError::Unauthorized(_) => (401, "UNAUTHORIZED", false, LogLevel::Debug),
        AppError::Forbidden(_) => (403, "FORBIDDEN", false, LogLevel::Warn),
        AppError::NotFound(_) => (404, "NOT_FOUND", false, LogLevel::Debug),
        AppError::NotImplemented(_) => (501, "NOT_IMPLEMENTED", false, LogLevel::Debug),
        AppError::Storage(_) => (500, "STORAGE_ERROR", true, LogLevel::Error),
        AppError::Internal(_) => (500, "INTERNAL_ERROR", true, LogLevel::Error),
        AppError::InternalWithSource { .. } => (500, "INTERNAL_ERROR", true, LogLevel::Error),
    }
}

impl AppError {
    /// Wrap a collaborator failure with the operation that triggered it.
    /// The cause stays in the chain for logging but is not shown to clients.
    pub fn internal_op(op: &str, err: impl Into<anyhow::Error>) -> Self {
        let source = err.into();
        AppError::InternalWithSource {
            message: format!("{}: {}", op, source),
            source,
        }
    }

    pub fn http_status_code(&self) -> u16 {
        static_metadata(self).0
    }

    pub fn error_code(&self) -> &'static str {
        static_metadata(self).1
    }

    /// Whether the detailed message must be hidden from clients.
    pub fn is_sensitive(&self) -> bool {
        static_metadata(self).2
    }

    pub fn log_level(&self) -> LogLevel {
        static_metadata(self).3
    }

    /// Client-facing message (may differ from the internal error message).
    pub fn client_message(&self) -> String {
        match self {
            AppError::Storage(_) => "Failed to access file storage".to_string(),
            AppError::Internal(_) | AppError::InternalWithSource { .. } => {
                "Internal server error".to_string()
            }
            other => other.to_string(),
        }
    }

    /// Full message including the source chain, for logging.
    pub fn detailed_message(&self) -> String {
        use std::error::Error;

        let mut details = self.to_string();
        let mut source = self.source();
        let mut depth = 0;
        while let Some(err) = source {
            depth += 1;
            if depth > 5 {
                details.push_str("\n  ... (truncated)");
                break;
            }
            details.push_str(&format!("\n  caused by: {}", err));
            source = err.source();
        }
        details
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_param_metadata() {
        let err = AppError::InvalidParam("channel_id".to_string());
        assert_eq!(err.http_status_code(), 400);
        assert_eq!(err.error_code(), "INVALID_PARAM");
        assert!(!err.is_sensitive());
        assert_eq!(err.log_level(), LogLevel::Debug);
        assert_eq!(err.client_message(), "invalid parameter: channel_id");
    }

    #[test]
    fn test_internal_hides_details() {
        let err = AppError::Internal("database exploded".to_string());
        assert_eq!(err.http_status_code(), 500);
        assert!(err.is_sensitive());
        assert_eq!(err.client_message(), "Internal server error");
    }

    #[test]
    fn test_internal_op_keeps_chain() {
        let cause = anyhow::anyhow!("disk full");
        let err = AppError::internal_op("upload_file", cause);
        assert_eq!(err.http_status_code(), 500);
        assert!(err.detailed_message().contains("upload_file"));
        assert!(err.detailed_message().contains("disk full"));
        assert_eq!(err.client_message(), "Internal server error");
    }

    #[test]
    fn test_payload_too_large() {
        let err = AppError::PayloadTooLarge("5000 bytes exceeds limit".to_string());
        assert_eq!(err.http_status_code(), 413);
        assert_eq!(err.error_code(), "PAYLOAD_TOO_LARGE");
    }
}
