//! Configuration resolver
//!
//! Merges the admin-set defaults with the per-user idle override into one
//! bounded [`EffectiveConfig`]. Every value read from storage is validated on
//! the way out, so a corrupted or hand-edited store can never produce an
//! out-of-range configuration.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::credentials::CredentialStore;
use crate::error::Result;
use crate::store::{keys, SettingsStore};

/// Shortest idle window, in seconds
pub const MIN_IDLE_SECONDS: u32 = 5;
/// Longest idle window, in seconds (one day)
pub const MAX_IDLE_SECONDS: u32 = 86_400;
/// Idle window used when nothing is configured
pub const DEFAULT_IDLE_SECONDS: u32 = 300;

/// Lowest allowed failure threshold
pub const MIN_MAX_FAILURES: u32 = 1;
/// Highest allowed failure threshold
pub const MAX_MAX_FAILURES: u32 = 50;
/// Failure threshold used when nothing is configured
pub const DEFAULT_MAX_FAILURES: u32 = 5;

/// Where the PIN is verified
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EncryptionMode {
    /// Backend compares against a stored hash
    #[default]
    Server,
    /// Client compares against a verifier in local storage
    Local,
}

impl EncryptionMode {
    /// Parse a stored or submitted value, normalizing unknown input to the default
    pub fn parse_or_default(value: &str) -> Self {
        match value.trim() {
            "local" => EncryptionMode::Local,
            _ => EncryptionMode::Server,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EncryptionMode::Server => "server",
            EncryptionMode::Local => "local",
        }
    }
}

/// How local-mode verifiers are derived
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyMethod {
    /// PBKDF2-HMAC-SHA256
    #[default]
    Pbkdf2,
    /// One salted SHA-256 round
    Sha256,
}

impl KeyMethod {
    /// Parse a stored or submitted value, normalizing unknown input to the default
    pub fn parse_or_default(value: &str) -> Self {
        match value.trim() {
            "sha256" => KeyMethod::Sha256,
            _ => KeyMethod::Pbkdf2,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            KeyMethod::Pbkdf2 => "pbkdf2",
            KeyMethod::Sha256 => "sha256",
        }
    }
}

/// Merged, bounds-checked configuration for one user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EffectiveConfig {
    #[serde(default)]
    pub encryption_mode: EncryptionMode,
    #[serde(default)]
    pub key_method: KeyMethod,
    #[serde(default = "default_true")]
    pub ask_on_background: bool,
    #[serde(default = "default_idle")]
    pub default_idle_seconds: u32,
    #[serde(default = "default_idle")]
    pub idle_seconds: u32,
    #[serde(default = "default_max_failures")]
    pub max_failures: u32,
    #[serde(default)]
    pub has_server_pin: bool,
}

fn default_true() -> bool {
    true
}

fn default_idle() -> u32 {
    DEFAULT_IDLE_SECONDS
}

fn default_max_failures() -> u32 {
    DEFAULT_MAX_FAILURES
}

impl Default for EffectiveConfig {
    fn default() -> Self {
        Self {
            encryption_mode: EncryptionMode::Server,
            key_method: KeyMethod::Pbkdf2,
            ask_on_background: true,
            default_idle_seconds: DEFAULT_IDLE_SECONDS,
            idle_seconds: DEFAULT_IDLE_SECONDS,
            max_failures: DEFAULT_MAX_FAILURES,
            has_server_pin: false,
        }
    }
}

impl EffectiveConfig {
    /// Re-apply every bound, e.g. after deserializing a server response
    pub fn clamped(mut self) -> Self {
        self.default_idle_seconds = clamp_idle_seconds(i64::from(self.default_idle_seconds));
        self.idle_seconds = clamp_idle_seconds(i64::from(self.idle_seconds));
        self.max_failures = clamp_max_failures(i64::from(self.max_failures));
        self
    }
}

/// Clamp an idle window to `[MIN_IDLE_SECONDS, MAX_IDLE_SECONDS]`
pub fn clamp_idle_seconds(value: i64) -> u32 {
    value.clamp(i64::from(MIN_IDLE_SECONDS), i64::from(MAX_IDLE_SECONDS)) as u32
}

/// Clamp a failure threshold to `[MIN_MAX_FAILURES, MAX_MAX_FAILURES]`
pub fn clamp_max_failures(value: i64) -> u32 {
    value.clamp(i64::from(MIN_MAX_FAILURES), i64::from(MAX_MAX_FAILURES)) as u32
}

/// Parse an integer the way form input arrives: trimmed, saturating on overflow
pub fn parse_int(value: &str) -> Option<i64> {
    let value = value.trim();
    if let Ok(n) = value.parse::<i64>() {
        return Some(n);
    }

    let (negative, digits) = match value.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, value.strip_prefix('+').unwrap_or(value)),
    };
    if !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit()) {
        return Some(if negative { i64::MIN } else { i64::MAX });
    }

    None
}

/// Parse a boolean flag as submitted by the admin form
pub fn parse_flag(value: &str) -> bool {
    matches!(value.trim(), "1" | "true")
}

/// Raw admin form input; every field is optional
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminSettingsInput {
    #[serde(default)]
    pub encryption_mode: Option<String>,
    #[serde(default)]
    pub key_method: Option<String>,
    #[serde(default)]
    pub ask_on_background: Option<String>,
    #[serde(default)]
    pub default_idle_seconds: Option<String>,
    #[serde(default)]
    pub max_failures: Option<String>,
}

/// Validated app-wide defaults
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminSettings {
    pub encryption_mode: EncryptionMode,
    pub key_method: KeyMethod,
    pub ask_on_background: bool,
    pub default_idle_seconds: u32,
    pub max_failures: u32,
}

impl AdminSettings {
    /// Normalize raw input, filling gaps with the documented defaults
    pub fn from_input(input: &AdminSettingsInput) -> Self {
        Self {
            encryption_mode: input
                .encryption_mode
                .as_deref()
                .map(EncryptionMode::parse_or_default)
                .unwrap_or_default(),
            key_method: input
                .key_method
                .as_deref()
                .map(KeyMethod::parse_or_default)
                .unwrap_or_default(),
            ask_on_background: input.ask_on_background.as_deref().map_or(true, parse_flag),
            default_idle_seconds: clamp_idle_seconds(
                input
                    .default_idle_seconds
                    .as_deref()
                    .and_then(parse_int)
                    .unwrap_or(i64::from(DEFAULT_IDLE_SECONDS)),
            ),
            max_failures: clamp_max_failures(
                input
                    .max_failures
                    .as_deref()
                    .and_then(parse_int)
                    .unwrap_or(i64::from(DEFAULT_MAX_FAILURES)),
            ),
        }
    }
}

/// Produces effective configuration and persists settings
#[derive(Clone)]
pub struct ConfigResolver {
    settings: Arc<dyn SettingsStore>,
    credentials: CredentialStore,
}

impl ConfigResolver {
    pub fn new(settings: Arc<dyn SettingsStore>) -> Self {
        let credentials = CredentialStore::new(settings.clone());
        Self {
            settings,
            credentials,
        }
    }

    /// Merged configuration for a user. Never fails: storage faults are
    /// logged and read as missing values.
    pub async fn effective_config(&self, user_id: &str) -> EffectiveConfig {
        let encryption_mode = self
            .app_value(keys::ENCRYPTION_MODE)
            .await
            .map(|v| EncryptionMode::parse_or_default(&v))
            .unwrap_or_default();

        let key_method = self
            .app_value(keys::KEY_METHOD)
            .await
            .map(|v| KeyMethod::parse_or_default(&v))
            .unwrap_or_default();

        let ask_on_background = self
            .app_value(keys::ASK_ON_BACKGROUND)
            .await
            .map_or(true, |v| v.trim() == "1");

        let default_idle_seconds = self.default_idle_seconds().await;
        let max_failures = self.max_failures().await;

        let idle_seconds = clamp_idle_seconds(
            self.user_value(user_id, keys::IDLE_SECONDS)
                .await
                .and_then(|v| parse_int(&v))
                .unwrap_or(i64::from(default_idle_seconds)),
        );

        let has_server_pin = match self.credentials.has_credential(user_id).await {
            Ok(has) => has,
            Err(e) => {
                warn!(error = %e, "Failed to read credential, treating as absent");
                false
            }
        };

        EffectiveConfig {
            encryption_mode,
            key_method,
            ask_on_background,
            default_idle_seconds,
            idle_seconds,
            max_failures,
            has_server_pin,
        }
    }

    /// App-wide idle default, clamped
    pub async fn default_idle_seconds(&self) -> u32 {
        clamp_idle_seconds(
            self.app_value(keys::DEFAULT_IDLE_SECONDS)
                .await
                .and_then(|v| parse_int(&v))
                .unwrap_or(i64::from(DEFAULT_IDLE_SECONDS)),
        )
    }

    /// App-wide failure threshold, clamped
    pub async fn max_failures(&self) -> u32 {
        clamp_max_failures(
            self.app_value(keys::MAX_FAILURES)
                .await
                .and_then(|v| parse_int(&v))
                .unwrap_or(i64::from(DEFAULT_MAX_FAILURES)),
        )
    }

    /// Validate and persist app-wide defaults
    ///
    /// The caller is responsible for checking elevated privilege.
    pub async fn save_admin_defaults(&self, input: &AdminSettingsInput) -> Result<AdminSettings> {
        let settings = AdminSettings::from_input(input);

        self.settings
            .set_app_value(keys::ENCRYPTION_MODE, settings.encryption_mode.as_str())
            .await?;
        self.settings
            .set_app_value(keys::KEY_METHOD, settings.key_method.as_str())
            .await?;
        self.settings
            .set_app_value(
                keys::ASK_ON_BACKGROUND,
                if settings.ask_on_background { "1" } else { "0" },
            )
            .await?;
        self.settings
            .set_app_value(
                keys::DEFAULT_IDLE_SECONDS,
                &settings.default_idle_seconds.to_string(),
            )
            .await?;
        self.settings
            .set_app_value(keys::MAX_FAILURES, &settings.max_failures.to_string())
            .await?;

        info!(
            encryption_mode = settings.encryption_mode.as_str(),
            key_method = settings.key_method.as_str(),
            default_idle_seconds = settings.default_idle_seconds,
            max_failures = settings.max_failures,
            "Saved admin defaults"
        );

        Ok(settings)
    }

    /// Validate and persist the user's idle timeout
    ///
    /// Missing, zero or negative input is replaced by the current default.
    pub async fn save_user_idle(&self, user_id: &str, seconds: Option<&str>) -> Result<u32> {
        let idle_seconds = match seconds.and_then(parse_int) {
            Some(n) if n > 0 => clamp_idle_seconds(n),
            _ => self.default_idle_seconds().await,
        };

        self.settings
            .set_user_value(user_id, keys::IDLE_SECONDS, &idle_seconds.to_string())
            .await?;

        Ok(idle_seconds)
    }

    async fn app_value(&self, key: &str) -> Option<String> {
        match self.settings.app_value(key).await {
            Ok(value) => value,
            Err(e) => {
                warn!(key, error = %e, "Failed to read app setting, using default");
                None
            }
        }
    }

    async fn user_value(&self, user_id: &str, key: &str) -> Option<String> {
        match self.settings.user_value(user_id, key).await {
            Ok(value) => value,
            Err(e) => {
                warn!(key, error = %e, "Failed to read user setting, using default");
                None
            }
        }
    }
}
