//! Key/value settings storage
//!
//! The host application owns persistent configuration. The lock only needs
//! app-wide and per-user string values addressed by key, so that is all the
//! [`SettingsStore`] trait exposes. [`JsonSettingsStore`] is the reference
//! implementation: an in-memory map that is optionally mirrored to a JSON
//! file with atomic writes.

use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::error::{LockError, Result};

/// Storage keys shared by the server and the client
pub mod keys {
    /// App-wide: `server` or `local`
    pub const ENCRYPTION_MODE: &str = "encryptionMode";
    /// App-wide: `pbkdf2` or `sha256`
    pub const KEY_METHOD: &str = "keyMethod";
    /// App-wide: `1` or `0`
    pub const ASK_ON_BACKGROUND: &str = "askOnBackground";
    /// App-wide idle timeout in seconds
    pub const DEFAULT_IDLE_SECONDS: &str = "defaultIdleSeconds";
    /// App-wide failure threshold
    pub const MAX_FAILURES: &str = "maxFailures";

    /// Per-user idle timeout override
    pub const IDLE_SECONDS: &str = "idleSeconds";
    /// Per-user PHC hash of the server PIN
    pub const PIN_HASH: &str = "pinHash";
    /// Per-user failure counter
    pub const FAILED_ATTEMPTS: &str = "failedAttempts";

    /// Client-local salt (hex) for local mode
    pub const LOCAL_SALT: &str = "pwalock_local_salt";
    /// Client-local verifier (hex) for local mode
    pub const LOCAL_VERIFIER: &str = "pwalock_local_verifier";
    /// Client session flag suppressing the setup nudge
    pub const PROMPTED: &str = "pwalock_prompted";
}

/// App-wide and per-user string storage
#[async_trait]
pub trait SettingsStore: Send + Sync {
    /// Read an app-wide value
    async fn app_value(&self, key: &str) -> Result<Option<String>>;

    /// Write an app-wide value
    async fn set_app_value(&self, key: &str, value: &str) -> Result<()>;

    /// Read a value for one user
    async fn user_value(&self, user_id: &str, key: &str) -> Result<Option<String>>;

    /// Write several values for one user; either all are stored or none
    async fn set_user_values(&self, user_id: &str, values: &[(&str, &str)]) -> Result<()>;

    /// Write a value for one user
    async fn set_user_value(&self, user_id: &str, key: &str, value: &str) -> Result<()> {
        self.set_user_values(user_id, &[(key, value)]).await
    }
}

/// Serialized layout of the settings file
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
struct SettingsData {
    #[serde(default)]
    app: BTreeMap<String, String>,
    #[serde(default)]
    users: BTreeMap<String, BTreeMap<String, String>>,
    #[serde(default = "current_version")]
    version: u32,
}

fn current_version() -> u32 {
    1
}

/// Settings store backed by memory and, optionally, a JSON file
pub struct JsonSettingsStore {
    /// File the data is mirrored to (None for memory only)
    path: Option<PathBuf>,
    /// Current data
    data: RwLock<SettingsData>,
}

impl JsonSettingsStore {
    /// Create a store that lives only in memory
    pub fn in_memory() -> Self {
        Self {
            path: None,
            data: RwLock::new(SettingsData {
                version: current_version(),
                ..Default::default()
            }),
        }
    }

    /// Open a file-backed store, loading existing data if present
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let data = if path.exists() {
            let contents = fs::read_to_string(&path)?;
            serde_json::from_str(&contents).map_err(|e| {
                LockError::Storage(format!("Failed to parse settings file: {}", e))
            })?
        } else {
            SettingsData {
                version: current_version(),
                ..Default::default()
            }
        };

        Ok(Self {
            path: Some(path),
            data: RwLock::new(data),
        })
    }

    fn persist(&self, data: &SettingsData) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        let contents = serde_json::to_string_pretty(data)?;

        // Write atomically
        let temp_path = path.with_extension("json.tmp");
        fs::write(&temp_path, &contents)?;
        fs::rename(&temp_path, path)?;

        // PIN hashes live in here
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(path, fs::Permissions::from_mode(0o600))?;
        }

        Ok(())
    }
}

#[async_trait]
impl SettingsStore for JsonSettingsStore {
    async fn app_value(&self, key: &str) -> Result<Option<String>> {
        Ok(self.data.read().await.app.get(key).cloned())
    }

    async fn set_app_value(&self, key: &str, value: &str) -> Result<()> {
        let mut data = self.data.write().await;
        let mut next = data.clone();
        next.app.insert(key.to_string(), value.to_string());
        self.persist(&next)?;
        *data = next;
        Ok(())
    }

    async fn user_value(&self, user_id: &str, key: &str) -> Result<Option<String>> {
        let data = self.data.read().await;
        Ok(data.users.get(user_id).and_then(|m| m.get(key)).cloned())
    }

    async fn set_user_values(&self, user_id: &str, values: &[(&str, &str)]) -> Result<()> {
        let mut data = self.data.write().await;
        let mut next = data.clone();
        let user = next.users.entry(user_id.to_string()).or_default();
        for (key, value) in values {
            user.insert(key.to_string(), value.to_string());
        }
        self.persist(&next)?;
        *data = next;
        Ok(())
    }
}
