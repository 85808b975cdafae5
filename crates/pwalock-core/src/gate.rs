//! Session gate
//!
//! The strongest sanction the lock has: end the host session. The identity
//! provider and the notification system are external, so both are reached
//! through traits.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::Result;

/// Notification subject for failed unlock attempts
pub const FAILURE_SUBJECT: &str = "pwalock_failed";

/// Ends authenticated sessions
#[async_trait]
pub trait SessionTerminator: Send + Sync {
    /// Terminate every session of the user. Returns whether anything was
    /// terminated; calling it again is a no-op.
    async fn terminate(&self, user_id: &str) -> bool;
}

/// Delivers user notifications
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, notification: FailureNotification) -> Result<()>;
}

/// Notifier that drops everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopNotifier;

#[async_trait]
impl Notifier for NoopNotifier {
    async fn notify(&self, _notification: FailureNotification) -> Result<()> {
        Ok(())
    }
}

/// Summary of failed unlock attempts sent to the user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FailureNotification {
    pub user_id: String,
    pub attempts: u32,
    pub forced_logout: bool,
    pub created_at: DateTime<Utc>,
}

impl FailureNotification {
    pub fn new(user_id: impl Into<String>, attempts: u32, forced_logout: bool) -> Self {
        Self {
            user_id: user_id.into(),
            attempts,
            forced_logout,
            created_at: Utc::now(),
        }
    }

    pub fn subject(&self) -> &'static str {
        FAILURE_SUBJECT
    }

    pub fn title(&self) -> &'static str {
        if self.forced_logout {
            "PWA Lock: too many failed unlock attempts"
        } else {
            "PWA Lock: failed unlock attempt"
        }
    }

    pub fn message(&self) -> String {
        if self.forced_logout {
            format!(
                "Unlock failed {} times. You have been logged out for safety.",
                self.attempts
            )
        } else {
            format!("Unlock failed {} times.", self.attempts)
        }
    }
}

/// Forced logout with notification
#[derive(Clone)]
pub struct SessionGate {
    sessions: Arc<dyn SessionTerminator>,
    notifier: Arc<dyn Notifier>,
}

impl SessionGate {
    pub fn new(sessions: Arc<dyn SessionTerminator>, notifier: Arc<dyn Notifier>) -> Self {
        Self { sessions, notifier }
    }

    /// Queue a failure notification, then terminate the session
    ///
    /// Notification errors are logged and swallowed. Termination is always
    /// the last step.
    pub async fn lock_out(&self, user_id: &str, attempts: u32) -> bool {
        let notification = FailureNotification::new(user_id, attempts, true);
        if let Err(e) = self.notifier.notify(notification).await {
            warn!(user_id, error = %e, "Failed to queue lockout notification");
        }

        self.force_logout(user_id).await
    }

    /// Terminate the session without notifying
    pub async fn force_logout(&self, user_id: &str) -> bool {
        let terminated = self.sessions.terminate(user_id).await;
        if terminated {
            info!(user_id, "Session terminated");
        }
        terminated
    }
}
