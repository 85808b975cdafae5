//! Error types for the PWA Lock core

use thiserror::Error;

pub type Result<T> = std::result::Result<T, LockError>;

/// Errors raised by configuration, credential and verification operations.
///
/// Wrong PINs and lockouts are not errors; they are reported through
/// [`crate::VerifyOutcome`] so callers can never confuse a storage fault
/// with a failed attempt.
#[derive(Error, Debug)]
pub enum LockError {
    #[error("{0}")]
    InvalidInput(String),

    #[error("Hashing failed: {0}")]
    Hashing(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
