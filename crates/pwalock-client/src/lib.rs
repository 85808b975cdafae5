//! PWA Lock Client - Lock controller for installed web apps
//!
//! - [`LockController`]: the lock/unlock state machine
//! - [`Driver`]: tokio event loop feeding it ticks, host events and sync messages
//! - [`HttpLockApi`]: the server API over HTTP
//! - Sync, marker, storage and overlay seams with in-memory implementations

pub mod api;
pub mod clock;
pub mod controller;
pub mod driver;
pub mod error;
pub mod marker;
pub mod messages;
pub mod overlay;
pub mod settings;
pub mod storage;
pub mod sync;
pub mod verifier;

pub use api::{HttpLockApi, LockApi};
pub use clock::{Clock, ManualClock, SystemClock};
pub use controller::{
    ClientServices, DisplayMode, LockController, LockState, Submission, SubmitResult,
};
pub use driver::{ClientEvent, Driver};
pub use error::{ClientError, Result};
pub use marker::{CookieJar, CookieMarker, MemoryCookieJar, MemoryMarker, UnlockMarker};
pub use overlay::{Overlay, OverlayState, RecordingOverlay};
pub use storage::{LocalStore, MemoryLocalStore};
pub use sync::{Broadcaster, LocalBus, NoopBroadcaster, SyncKind, SyncMessage};
pub use verifier::{Outcome, UnlockVerifier};
