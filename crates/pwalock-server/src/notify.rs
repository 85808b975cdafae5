//! In-memory notification queue

use std::collections::VecDeque;

use async_trait::async_trait;
use pwalock_core::{FailureNotification, Notifier};
use tokio::sync::Mutex;
use tracing::info;

/// Bounded queue of failure notifications; the oldest entry is dropped when full
#[derive(Debug)]
pub struct NotificationQueue {
    entries: Mutex<VecDeque<FailureNotification>>,
    capacity: usize,
}

impl NotificationQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Mutex::new(VecDeque::new()),
            capacity: capacity.max(1),
        }
    }

    /// Notifications queued for a user
    pub async fn for_user(&self, user_id: &str) -> Vec<FailureNotification> {
        self.entries
            .lock()
            .await
            .iter()
            .filter(|n| n.user_id == user_id)
            .cloned()
            .collect()
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }
}

#[async_trait]
impl Notifier for NotificationQueue {
    async fn notify(&self, notification: FailureNotification) -> pwalock_core::Result<()> {
        info!(
            user_id = %notification.user_id,
            subject = notification.subject(),
            attempts = notification.attempts,
            "{}",
            notification.title()
        );

        let mut entries = self.entries.lock().await;
        if entries.len() >= self.capacity {
            entries.pop_front();
        }
        entries.push_back(notification);
        Ok(())
    }
}
