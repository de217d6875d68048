//! Error types for Omsorg.

use axum::http::StatusCode;
use thiserror::Error;

/// Library-level error type for Omsorg operations.
#[derive(Error, Debug)]
pub enum OmsorgError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid request: {0}")]
    Validation(String),

    #[error("Audio probe failed: {0}")]
    Probe(String),

    #[error("Audio transcode failed: {0}")]
    Transcode(String),

    #[error("External tool not found: {0}. Please install it and ensure it's in your PATH.")]
    ToolNotFound(String),

    #[error("Recognition service error ({status}): {body}")]
    Recognition { status: u16, body: String },

    #[error("Generation service error ({status}): {body}")]
    Generation { status: u16, body: String },

    #[error("Operation timed out: {0}")]
    Timeout(String),

    #[error("Upstream protocol error: {0}")]
    Protocol(String),

    #[error("Summary output did not match schema: {message}")]
    SchemaParse { message: String, excerpt: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl OmsorgError {
    /// HTTP status this error surfaces as at the relay boundary.
    ///
    /// Recognition errors pass the upstream status through verbatim; an
    /// unrepresentable code falls back to 502.
    pub fn status_code(&self) -> StatusCode {
        match self {
            OmsorgError::Validation(_) => StatusCode::BAD_REQUEST,
            OmsorgError::Recognition { status, .. } | OmsorgError::Generation { status, .. } => {
                StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY)
            }
            OmsorgError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            OmsorgError::Protocol(_) | OmsorgError::SchemaParse { .. } => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Result type alias for Omsorg operations.
pub type Result<T> = std::result::Result<T, OmsorgError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            OmsorgError::Validation("bad".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            OmsorgError::Timeout("poll".into()).status_code(),
            StatusCode::GATEWAY_TIMEOUT
        );
        assert_eq!(
            OmsorgError::Protocol("no op name".into()).status_code(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            OmsorgError::Config("missing key".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_recognition_status_passthrough() {
        let err = OmsorgError::Recognition {
            status: 429,
            body: "quota".into(),
        };
        assert_eq!(err.status_code(), StatusCode::TOO_MANY_REQUESTS);

        let err = OmsorgError::Recognition {
            status: 0,
            body: "transport".into(),
        };
        assert_eq!(err.status_code(), StatusCode::BAD_GATEWAY);
    }
}
