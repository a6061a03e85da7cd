use crate::services::StreamError;
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::fmt;

/// A lightweight wrapper for request-level errors that keeps the message
/// local.
#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub message: String,
}

impl AppError {
    /// Create a new AppError with a specific status and message.
    pub fn new(status: StatusCode, msg: impl Into<String>) -> Self {
        Self {
            status,
            message: msg.into(),
        }
    }

    /// Shortcut for a 500 Internal Server Error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, msg)
    }

    /// Shortcut for 404 Not Found
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, msg)
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for AppError {}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "error": self.message,
            "status": self.status.as_u16()
        }));

        (self.status, body).into_response()
    }
}

/// Map pipeline failures onto HTTP statuses.
///
/// An upstream failure during resolution means the stored media cannot be
/// reached, which the outside world sees as the file not existing. Range
/// errors carry a dedicated status; the handler adds the `Content-Range`
/// hint itself since headers do not fit through this error shape.
impl From<StreamError> for AppError {
    fn from(err: StreamError) -> Self {
        match err {
            StreamError::NotFound(_) => AppError::not_found(err.to_string()),
            StreamError::RangeNotSatisfiable { .. } => {
                AppError::new(StatusCode::RANGE_NOT_SATISFIABLE, err.to_string())
            }
            StreamError::QuotaExceeded => {
                AppError::new(StatusCode::SERVICE_UNAVAILABLE, err.to_string())
            }
            StreamError::Upstream(_) => AppError::not_found(err.to_string()),
            StreamError::Sqlx(_) => AppError::internal(err.to_string()),
        }
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::internal(err.to_string())
    }
}
