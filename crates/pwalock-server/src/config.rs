//! Server configuration

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use crate::error::{Result, ServerError};

/// Environment variable naming the config file
pub const CONFIG_ENV: &str = "PWALOCK_CONFIG";

/// A bearer token accepted by the built-in session registry
#[derive(Clone, Serialize, Deserialize)]
pub struct SessionSeed {
    pub token: String,
    pub user_id: String,
    #[serde(default)]
    pub admin: bool,
}

// Keep tokens out of logs
impl std::fmt::Debug for SessionSeed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionSeed")
            .field("token", &"[REDACTED]")
            .field("user_id", &self.user_id)
            .field("admin", &self.admin)
            .finish()
    }
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address to bind the HTTP listener to
    #[serde(default = "default_bind_address")]
    pub bind_address: SocketAddr,

    /// Settings file (app defaults, PIN hashes, failure counters)
    #[serde(default = "ServerConfig::default_data_path")]
    pub data_path: PathBuf,

    /// Notifications kept in memory before the oldest are dropped
    #[serde(default = "default_notification_capacity")]
    pub notification_capacity: usize,

    /// Sessions available at startup
    #[serde(default)]
    pub sessions: Vec<SessionSeed>,
}

fn default_bind_address() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 8780))
}

fn default_notification_capacity() -> usize {
    256
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            data_path: Self::default_data_path(),
            notification_capacity: default_notification_capacity(),
            sessions: Vec::new(),
        }
    }
}

impl ServerConfig {
    fn default_data_path() -> PathBuf {
        dirs::data_local_dir()
            .unwrap_or_else(|| {
                #[cfg(unix)]
                {
                    PathBuf::from("/var/lib")
                }
                #[cfg(windows)]
                {
                    PathBuf::from(r"C:\ProgramData")
                }
            })
            .join("pwalock")
            .join("settings.json")
    }

    /// Config file location: `PWALOCK_CONFIG`, else the platform config dir
    pub fn default_path() -> PathBuf {
        std::env::var(CONFIG_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|_| {
                dirs::config_dir()
                    .unwrap_or_else(|| PathBuf::from("."))
                    .join("pwalock")
                    .join("server.json")
            })
    }

    /// Load configuration from file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)
            .map_err(|e| ServerError::Config(format!("{}: {}", path.display(), e)))?;
        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Load the file at `path`, writing defaults there first if it is missing
    pub fn load_or_create(path: &Path) -> Result<Self> {
        if path.exists() {
            return Self::load(path);
        }

        let config = Self::default();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        config.save(path)?;
        tracing::info!("Created default config at {:?}", path);
        Ok(config)
    }
}
