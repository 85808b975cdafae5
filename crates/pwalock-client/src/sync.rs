//! Cross-instance lock synchronization
//!
//! Best-effort broadcast of `locked`/`unlocked` between open instances of
//! the app. Sending never fails and never retries; a missing transport is
//! simply a [`NoopBroadcaster`].
//!
//! Wire format: `{"type":"locked","payload":{}}`.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{debug, trace};
use uuid::Uuid;

/// Default capacity of an in-process bus
pub const DEFAULT_BUS_CAPACITY: usize = 16;

/// Kind of sync message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncKind {
    Locked,
    Unlocked,
}

/// One message as it travels over the channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncMessage {
    #[serde(rename = "type")]
    pub kind: SyncKind,
    #[serde(default = "empty_payload")]
    pub payload: serde_json::Value,
}

fn empty_payload() -> serde_json::Value {
    serde_json::Value::Object(Default::default())
}

impl SyncMessage {
    pub fn new(kind: SyncKind) -> Self {
        Self {
            kind,
            payload: empty_payload(),
        }
    }

    pub fn encode(&self) -> String {
        // Serializing a closed enum plus a JSON value cannot fail
        serde_json::to_string(self).unwrap_or_default()
    }

    /// Parse a raw message; anything malformed is `None`
    pub fn decode(raw: &str) -> Option<Self> {
        serde_json::from_str(raw).ok()
    }
}

/// Fire-and-forget sender
pub trait Broadcaster: Send + Sync {
    fn post(&self, kind: SyncKind);
}

/// Used when no transport exists
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopBroadcaster;

impl Broadcaster for NoopBroadcaster {
    fn post(&self, _kind: SyncKind) {}
}

#[derive(Debug, Clone)]
struct Envelope {
    origin: Uuid,
    body: String,
}

/// In-process bus shared by several instances
#[derive(Debug, Clone)]
pub struct LocalBus {
    sender: broadcast::Sender<Envelope>,
}

impl Default for LocalBus {
    fn default() -> Self {
        Self::new(DEFAULT_BUS_CAPACITY)
    }
}

impl LocalBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Attach one instance, returning its sending and receiving halves
    pub fn join(&self) -> (BusSender, BusReceiver) {
        let origin = Uuid::new_v4();
        (
            BusSender {
                origin,
                sender: self.sender.clone(),
            },
            BusReceiver {
                origin,
                receiver: self.sender.subscribe(),
            },
        )
    }

    /// Inject a raw message from outside any instance
    pub fn post_raw(&self, body: impl Into<String>) {
        let _ = self.sender.send(Envelope {
            origin: Uuid::nil(),
            body: body.into(),
        });
    }
}

/// Sending half for one instance
#[derive(Debug, Clone)]
pub struct BusSender {
    origin: Uuid,
    sender: broadcast::Sender<Envelope>,
}

impl Broadcaster for BusSender {
    fn post(&self, kind: SyncKind) {
        let envelope = Envelope {
            origin: self.origin,
            body: SyncMessage::new(kind).encode(),
        };
        // No receivers is fine
        if self.sender.send(envelope).is_err() {
            trace!("No sync listeners");
        }
    }
}

/// Receiving half for one instance
#[derive(Debug)]
pub struct BusReceiver {
    origin: Uuid,
    receiver: broadcast::Receiver<Envelope>,
}

impl BusReceiver {
    /// Next valid message from another instance; `None` once the bus is gone
    pub async fn recv(&mut self) -> Option<SyncKind> {
        loop {
            match self.receiver.recv().await {
                Ok(envelope) => {
                    if envelope.origin == self.origin {
                        continue;
                    }
                    match SyncMessage::decode(&envelope.body) {
                        Some(message) => return Some(message.kind),
                        None => debug!("Ignoring malformed sync message"),
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    debug!(skipped, "Sync receiver lagged");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}
