use std::sync::Arc;

use pwalock_core::{
    ConfigResolver, CredentialStore, JsonSettingsStore, PinService, SessionGate, SettingsStore,
};

use crate::config::ServerConfig;
use crate::error::Result;
use crate::notify::NotificationQueue;
use crate::session::SessionRegistry;

/// Application state shared across all handlers
pub struct AppState {
    pub config: ServerConfig,
    pub resolver: ConfigResolver,
    pub pins: PinService,
    pub sessions: Arc<SessionRegistry>,
    pub notifications: Arc<NotificationQueue>,
}

impl AppState {
    /// Open the settings file named in the config
    pub fn new(config: ServerConfig) -> Result<Self> {
        let settings = Arc::new(JsonSettingsStore::open(&config.data_path)?);
        Ok(Self::with_store(config, settings))
    }

    /// Build on an existing settings store
    pub fn with_store(config: ServerConfig, settings: Arc<dyn SettingsStore>) -> Self {
        let sessions = Arc::new(SessionRegistry::from_seeds(&config.sessions));
        let notifications = Arc::new(NotificationQueue::new(config.notification_capacity));

        let resolver = ConfigResolver::new(settings.clone());
        let gate = SessionGate::new(sessions.clone(), notifications.clone());
        let pins = PinService::new(CredentialStore::new(settings), resolver.clone(), gate);

        Self {
            config,
            resolver,
            pins,
            sessions,
            notifications,
        }
    }
}
