//! Personal settings: set the PIN

use std::sync::Arc;

use tracing::info;
use zeroize::Zeroizing;

use pwalock_core::{EffectiveConfig, EncryptionMode, LocalCredential};

use crate::api::LockApi;
use crate::error::{ClientError, Result};
use crate::storage::{store_local_credential, LocalStore};

/// Save a new PIN in the configured mode
///
/// Server mode posts it; local mode derives a fresh credential and keeps it
/// in client storage only.
pub async fn save_pin(
    config: &EffectiveConfig,
    pin: &str,
    api: &dyn LockApi,
    local_store: Arc<dyn LocalStore>,
) -> Result<()> {
    match config.encryption_mode {
        EncryptionMode::Server => {
            api.set_pin(pin).await?;
            info!("Server PIN saved");
        }
        EncryptionMode::Local => {
            let pin = Zeroizing::new(pin.to_string());
            let method = config.key_method;
            let credential =
                tokio::task::spawn_blocking(move || LocalCredential::create(&pin, method))
                    .await
                    .map_err(|e| ClientError::Task(e.to_string()))??;
            store_local_credential(local_store.as_ref(), &credential);
            info!(method = method.as_str(), "Local PIN saved");
        }
    }
    Ok(())
}
