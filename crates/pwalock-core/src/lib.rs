//! PWA Lock Core - Configuration, credentials and PIN verification
//!
//! This crate holds everything the lock server and the lock client share:
//! - Effective configuration with bounds enforcement
//! - Server-mode PIN hashing and verification with a failure threshold
//! - Local-mode verifier derivation (PBKDF2 or salted SHA-256)
//! - The session gate that ends a session after too many failures
//! - JSON bodies of the HTTP protocol

pub mod config;
pub mod credentials;
pub mod error;
pub mod gate;
pub mod local;
pub mod lockout;
pub mod pin;
pub mod protocol;
pub mod store;

pub use config::{
    AdminSettings, AdminSettingsInput, ConfigResolver, EffectiveConfig, EncryptionMode, KeyMethod,
};
pub use credentials::CredentialStore;
pub use error::{LockError, Result};
pub use gate::{FailureNotification, NoopNotifier, Notifier, SessionGate, SessionTerminator};
pub use local::{derive_verifier, LocalCredential};
pub use lockout::LockoutPolicy;
pub use pin::{PinService, ReportOutcome, VerifyOutcome, MAX_PIN_LENGTH, MIN_PIN_LENGTH};
pub use protocol::{ApiStatus, ConfigResponse, StatusBody};
pub use store::{JsonSettingsStore, SettingsStore};

/// Application id used for namespacing stored values and routes
pub const APP_ID: &str = "pwalock";
