//! Error types for karaoke-server
//!
//! Admission and arbitration failures are typed results that the HTTP layer
//! maps to status codes; nothing here is used for control flow by panicking.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Main error type for karaoke-server
#[derive(Error, Debug)]
pub enum Error {
    /// Duplicate submission or double commit of playback (409)
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Editing another requester's entry (403)
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Missing queue entry, empty queue, missing folder (404)
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid request (400)
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Database connection or query errors
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// File I/O errors
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Other errors
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Convenience Result type using karaoke-server Error
pub type Result<T> = std::result::Result<T, Error>;

impl From<karaoke_common::Error> for Error {
    fn from(err: karaoke_common::Error) -> Self {
        match err {
            karaoke_common::Error::Database(e) => Error::Database(e),
            karaoke_common::Error::Io(e) => Error::Io(e),
            karaoke_common::Error::Config(msg) => Error::Config(msg),
        }
    }
}

impl Error {
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            Error::Conflict(_) => (StatusCode::CONFLICT, "CONFLICT"),
            Error::Forbidden(_) => (StatusCode::FORBIDDEN, "FORBIDDEN"),
            Error::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            Error::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            Error::Config(_) => (StatusCode::INTERNAL_SERVER_ERROR, "CONFIG_ERROR"),
            Error::Database(_) => (StatusCode::INTERNAL_SERVER_ERROR, "DATABASE_ERROR"),
            Error::Io(_) => (StatusCode::INTERNAL_SERVER_ERROR, "IO_ERROR"),
            Error::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let (status, error_code) = self.status_and_code();

        if status.is_server_error() {
            tracing::error!(code = error_code, "Request failed: {}", self);
        }

        let message = match &self {
            Error::Conflict(msg)
            | Error::Forbidden(msg)
            | Error::NotFound(msg)
            | Error::BadRequest(msg) => msg.clone(),
            other => other.to_string(),
        };

        let body = Json(json!({
            "error": {
                "code": error_code,
                "message": message,
            }
        }));

        (status, body).into_response()
    }
}
