//! Bearer-token session registry
//!
//! Stands in for the host's identity provider: maps tokens to users and
//! ends every session of a user on request.

use std::collections::HashMap;

use async_trait::async_trait;
use pwalock_core::SessionTerminator;
use tokio::sync::RwLock;

use crate::config::SessionSeed;

/// Who a token belongs to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionInfo {
    pub user_id: String,
    pub admin: bool,
}

#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: RwLock<HashMap<String, SessionInfo>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_seeds(seeds: &[SessionSeed]) -> Self {
        let sessions = seeds
            .iter()
            .map(|seed| {
                (
                    seed.token.clone(),
                    SessionInfo {
                        user_id: seed.user_id.clone(),
                        admin: seed.admin,
                    },
                )
            })
            .collect();
        Self {
            sessions: RwLock::new(sessions),
        }
    }

    pub async fn insert(&self, token: impl Into<String>, user_id: impl Into<String>, admin: bool) {
        self.sessions.write().await.insert(
            token.into(),
            SessionInfo {
                user_id: user_id.into(),
                admin,
            },
        );
    }

    pub async fn lookup(&self, token: &str) -> Option<SessionInfo> {
        self.sessions.read().await.get(token).cloned()
    }

    /// Number of live sessions for a user
    pub async fn active_sessions(&self, user_id: &str) -> usize {
        self.sessions
            .read()
            .await
            .values()
            .filter(|s| s.user_id == user_id)
            .count()
    }
}

#[async_trait]
impl SessionTerminator for SessionRegistry {
    async fn terminate(&self, user_id: &str) -> bool {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, s| s.user_id != user_id);
        sessions.len() != before
    }
}
