//! Error types for the lock server

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use pwalock_core::{ApiStatus, LockError, StatusBody};
use thiserror::Error;
use tracing::error;

/// Result type alias for server setup
pub type Result<T> = std::result::Result<T, ServerError>;

/// Errors raised while starting the server
#[derive(Debug, Error)]
pub enum ServerError {
    /// Core library error
    #[error("Core error: {0}")]
    Core(#[from] LockError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Error returned by a handler
#[derive(Debug)]
pub enum ApiError {
    Unauthenticated,
    Forbidden,
    InvalidInput(String),
    Internal(String),
}

impl From<LockError> for ApiError {
    fn from(err: LockError) -> Self {
        match err {
            LockError::InvalidInput(message) => ApiError::InvalidInput(message),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::Unauthenticated => (
                StatusCode::UNAUTHORIZED,
                StatusBody::error("Not logged in"),
            ),
            ApiError::Forbidden => (
                StatusCode::FORBIDDEN,
                StatusBody::error("Elevated privilege required"),
            ),
            ApiError::InvalidInput(message) => (StatusCode::BAD_REQUEST, StatusBody::error(message)),
            ApiError::Internal(message) => {
                error!("Request failed: {}", message);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    StatusBody::error("Internal error"),
                )
            }
        };

        (status, Json(body)).into_response()
    }
}

/// HTTP status carried by a status body
pub fn status_code(body: &StatusBody) -> StatusCode {
    match body.status {
        ApiStatus::Ok => StatusCode::OK,
        ApiStatus::Fail => StatusCode::FORBIDDEN,
        ApiStatus::LockedOut => StatusCode::UNAUTHORIZED,
        ApiStatus::NotConfigured => StatusCode::CONFLICT,
        ApiStatus::Error => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Respond with a status body and its matching HTTP status
pub fn respond(body: StatusBody) -> Response {
    (status_code(&body), Json(body)).into_response()
}
