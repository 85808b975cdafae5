//! Client error types

use pwalock_core::LockError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ClientError>;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Not logged in")]
    Unauthenticated,

    #[error("{0}")]
    InvalidInput(String),

    #[error("Server error {status}: {message}")]
    Server { status: u16, message: String },

    #[error("Unexpected response: {0}")]
    Decode(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Verification task failed: {0}")]
    Task(String),

    #[error(transparent)]
    Core(#[from] LockError),
}
