//! Lock overlay view
//!
//! The controller drives the view through [`Overlay`]; rendering is up to
//! the host. All calls are synchronous.

use std::sync::Mutex;
use std::time::Duration;

use zeroize::Zeroizing;

pub trait Overlay: Send + Sync {
    fn show(&self);
    fn hide(&self);
    fn focus_input(&self);
    /// Inline error under the input; empty clears it
    fn set_error(&self, message: &str);
    /// Reason line above the input; empty clears it
    fn set_hint(&self, message: &str);
    /// Transient notice outside the overlay
    fn toast(&self, message: &str);
    /// Hard reload of the client after `delay`
    fn schedule_reload(&self, delay: Duration);
    /// Return the typed PIN and clear the field
    fn take_input(&self) -> Zeroizing<String>;
}

/// Snapshot of a [`RecordingOverlay`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OverlayState {
    pub visible: bool,
    pub error: String,
    pub hint: String,
    pub input: String,
    pub toasts: Vec<String>,
    pub reloads: Vec<Duration>,
    pub show_count: u32,
    pub hide_count: u32,
    pub focus_count: u32,
}

/// Headless overlay that records every call
#[derive(Debug, Default)]
pub struct RecordingOverlay {
    state: Mutex<OverlayState>,
}

impl RecordingOverlay {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate typing into the PIN field
    pub fn type_input(&self, text: &str) {
        self.with(|s| s.input = text.to_string());
    }

    pub fn snapshot(&self) -> OverlayState {
        self.with(|s| s.clone())
    }

    fn with<R>(&self, f: impl FnOnce(&mut OverlayState) -> R) -> R {
        let mut state = match self.state.lock() {
            Ok(state) => state,
            Err(poisoned) => poisoned.into_inner(),
        };
        f(&mut state)
    }
}

impl Overlay for RecordingOverlay {
    fn show(&self) {
        self.with(|s| {
            s.visible = true;
            s.show_count += 1;
        });
    }

    fn hide(&self) {
        self.with(|s| {
            s.visible = false;
            s.hide_count += 1;
        });
    }

    fn focus_input(&self) {
        self.with(|s| s.focus_count += 1);
    }

    fn set_error(&self, message: &str) {
        self.with(|s| s.error = message.to_string());
    }

    fn set_hint(&self, message: &str) {
        self.with(|s| s.hint = message.to_string());
    }

    fn toast(&self, message: &str) {
        self.with(|s| s.toasts.push(message.to_string()));
    }

    fn schedule_reload(&self, delay: Duration) {
        self.with(|s| s.reloads.push(delay));
    }

    fn take_input(&self) -> Zeroizing<String> {
        Zeroizing::new(self.with(|s| std::mem::take(&mut s.input)))
    }
}
