//! Credential store adapter
//!
//! Typed access to the per-user PIN hash and failure counter on top of a
//! [`SettingsStore`].

use std::sync::Arc;

use crate::error::Result;
use crate::store::{keys, SettingsStore};

/// Reads and writes server credentials and failure counters
#[derive(Clone)]
pub struct CredentialStore {
    settings: Arc<dyn SettingsStore>,
}

impl CredentialStore {
    pub fn new(settings: Arc<dyn SettingsStore>) -> Self {
        Self { settings }
    }

    /// Stored PHC hash for the user, if a PIN was ever set
    pub async fn pin_hash(&self, user_id: &str) -> Result<Option<String>> {
        let hash = self.settings.user_value(user_id, keys::PIN_HASH).await?;
        Ok(hash.filter(|h| !h.is_empty()))
    }

    /// Replace the stored hash and clear the failure counter
    pub async fn replace_pin_hash(&self, user_id: &str, hash: &str) -> Result<()> {
        self.settings
            .set_user_values(user_id, &[(keys::PIN_HASH, hash), (keys::FAILED_ATTEMPTS, "0")])
            .await
    }

    /// Whether a server credential exists
    pub async fn has_credential(&self, user_id: &str) -> Result<bool> {
        Ok(self.pin_hash(user_id).await?.is_some())
    }

    /// Current failure counter (unparseable values read as 0)
    pub async fn failed_attempts(&self, user_id: &str) -> Result<u32> {
        let raw = self
            .settings
            .user_value(user_id, keys::FAILED_ATTEMPTS)
            .await?;
        Ok(raw.and_then(|v| v.trim().parse().ok()).unwrap_or(0))
    }

    pub async fn set_failed_attempts(&self, user_id: &str, attempts: u32) -> Result<()> {
        self.settings
            .set_user_value(user_id, keys::FAILED_ATTEMPTS, &attempts.to_string())
            .await
    }
}
