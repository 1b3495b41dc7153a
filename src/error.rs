//! Error handling for the campair device service

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Error types
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Validation error (missing/malformed request parameter)
    #[error("Validation error: {0}")]
    Validation(String),

    /// Endpoint hit on a device with the wrong configured role
    #[error("Role mismatch: {0}")]
    RoleMismatch(String),

    /// A capture session is already running
    #[error("Capture busy: {0}")]
    Busy(String),

    /// Camera driver error
    #[error("Camera error: {0}")]
    Camera(String),

    /// Storage mount/write error
    #[error("Storage error: {0}")]
    Storage(String),

    /// Peer preparation / HTTP client error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match &self {
            Error::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
            Error::RoleMismatch(msg) => (StatusCode::BAD_REQUEST, "ROLE_MISMATCH", msg.clone()),
            Error::Busy(msg) => (StatusCode::CONFLICT, "ALREADY_RUNNING", msg.clone()),
            Error::Camera(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "CAMERA_ERROR",
                msg.clone(),
            ),
            Error::Storage(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "STORAGE_ERROR",
                msg.clone(),
            ),
            Error::Http(e) => (StatusCode::BAD_GATEWAY, "HTTP_ERROR", e.to_string()),
            Error::Io(e) => (StatusCode::INTERNAL_SERVER_ERROR, "IO_ERROR", e.to_string()),
            Error::Internal(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                msg.clone(),
            ),
        };

        tracing::error!(
            status = %status,
            error_code = %error_code,
            message = %message,
            "Request error"
        );

        let body = Json(json!({
            "error_code": error_code,
            "message": message
        }));

        (status, body).into_response()
    }
}
