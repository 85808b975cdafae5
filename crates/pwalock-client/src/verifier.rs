//! Unlock verification, server or local
//!
//! The mode is chosen once from the resolved configuration. Both variants
//! answer the same question: does this candidate unlock?

use std::sync::Arc;

use zeroize::Zeroizing;

use pwalock_core::{EffectiveConfig, EncryptionMode, KeyMethod, VerifyOutcome};

use crate::api::LockApi;
use crate::error::{ClientError, Result};
use crate::storage::{load_local_credential, LocalStore};

/// Result of one verification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Unlocked,
    /// Wrong PIN; `remaining` is known only in server mode
    Fail { remaining: Option<u32> },
    LockedOut,
    NotConfigured,
}

impl From<VerifyOutcome> for Outcome {
    fn from(outcome: VerifyOutcome) -> Self {
        match outcome {
            VerifyOutcome::Unlocked => Outcome::Unlocked,
            VerifyOutcome::Fail { remaining } => Outcome::Fail {
                remaining: Some(remaining),
            },
            VerifyOutcome::LockedOut => Outcome::LockedOut,
            VerifyOutcome::NotConfigured => Outcome::NotConfigured,
        }
    }
}

#[derive(Clone)]
pub enum UnlockVerifier {
    /// Server compares against its stored hash
    Server { api: Arc<dyn LockApi> },
    /// Client compares against the verifier in local storage
    Local {
        store: Arc<dyn LocalStore>,
        method: KeyMethod,
    },
}

impl UnlockVerifier {
    pub fn select(
        config: &EffectiveConfig,
        api: Arc<dyn LockApi>,
        store: Arc<dyn LocalStore>,
    ) -> Self {
        match config.encryption_mode {
            EncryptionMode::Server => UnlockVerifier::Server { api },
            EncryptionMode::Local => UnlockVerifier::Local {
                store,
                method: config.key_method,
            },
        }
    }

    pub fn mode(&self) -> EncryptionMode {
        match self {
            UnlockVerifier::Server { .. } => EncryptionMode::Server,
            UnlockVerifier::Local { .. } => EncryptionMode::Local,
        }
    }

    /// Whether a credential exists in this mode
    pub fn has_credential(&self, config: &EffectiveConfig) -> bool {
        match self {
            UnlockVerifier::Server { .. } => config.has_server_pin,
            UnlockVerifier::Local { store, .. } => load_local_credential(store.as_ref()).is_some(),
        }
    }

    pub async fn verify(&self, pin: Zeroizing<String>) -> Result<Outcome> {
        match self {
            UnlockVerifier::Server { api } => Ok(api.verify_pin(&pin).await?.into()),
            UnlockVerifier::Local { store, method } => {
                let Some(credential) = load_local_credential(store.as_ref()) else {
                    return Ok(Outcome::NotConfigured);
                };
                let method = *method;

                // PBKDF2 at this iteration count is too slow for the event loop
                let matched =
                    tokio::task::spawn_blocking(move || credential.matches(&pin, method))
                        .await
                        .map_err(|e| ClientError::Task(e.to_string()))?;

                Ok(if matched {
                    Outcome::Unlocked
                } else {
                    Outcome::Fail { remaining: None }
                })
            }
        }
    }
}
