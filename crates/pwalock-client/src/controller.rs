//! Lock state machine
//!
//! One controller per app instance. It decides when the overlay is shown,
//! runs PIN submissions and mirrors transitions to other instances.
//!
//! Two states, `Unlocked` and `Locked`. Whatever the trigger, the controller
//! never enters `Locked` unless a credential exists in the active mode.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};
use zeroize::Zeroizing;

use pwalock_core::store::keys;
use pwalock_core::{EffectiveConfig, EncryptionMode, LockoutPolicy, MIN_PIN_LENGTH};

use crate::api::LockApi;
use crate::clock::Clock;
use crate::error::{ClientError, Result};
use crate::marker::UnlockMarker;
use crate::messages;
use crate::overlay::Overlay;
use crate::storage::LocalStore;
use crate::sync::{Broadcaster, SyncKind};
use crate::verifier::{Outcome, UnlockVerifier};

/// Delay before the hard reload that follows a lockout
pub const RELOAD_DELAY: Duration = Duration::from_millis(750);

/// Shortest idle window the controller will use
pub const MIN_IDLE_WINDOW: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockState {
    Unlocked,
    Locked,
}

/// How the client is being displayed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayMode {
    Browser,
    Standalone,
    Fullscreen,
    MinimalUi,
}

impl DisplayMode {
    /// Parse a `display-mode` media value
    pub fn parse(value: &str) -> Self {
        match value.trim() {
            "standalone" => DisplayMode::Standalone,
            "fullscreen" => DisplayMode::Fullscreen,
            "minimal-ui" => DisplayMode::MinimalUi,
            _ => DisplayMode::Browser,
        }
    }

    /// Running as an installed app
    pub fn is_installed(self) -> bool {
        !matches!(self, DisplayMode::Browser)
    }
}

/// Capabilities injected into the controller
#[derive(Clone)]
pub struct ClientServices {
    pub api: Arc<dyn LockApi>,
    pub overlay: Arc<dyn Overlay>,
    pub marker: Arc<dyn UnlockMarker>,
    pub broadcaster: Arc<dyn Broadcaster>,
    /// Persistent client storage (local credential)
    pub local_store: Arc<dyn LocalStore>,
    /// Per-session client storage (setup prompt flag)
    pub session_store: Arc<dyn LocalStore>,
    pub clock: Arc<dyn Clock>,
}

/// A validated submission waiting for verification
pub struct PendingAttempt {
    pin: Zeroizing<String>,
}

impl PendingAttempt {
    pub fn into_pin(self) -> Zeroizing<String> {
        self.pin
    }
}

/// First half of a submission
pub enum Submission {
    /// Verification should run now
    Pending(PendingAttempt),
    /// Nothing to verify
    Done(SubmitResult),
}

/// What a submission ended in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitResult {
    /// Not locked, already logged out, or another attempt in flight
    Ignored,
    TooShort,
    NotConfigured,
    Unlocked,
    Failed { remaining: u32 },
    LockedOut,
    Error,
}

pub struct LockController {
    services: ClientServices,
    config: EffectiveConfig,
    verifier: Option<UnlockVerifier>,
    state: LockState,
    /// Triggers are live (installed app with a credential at start)
    active: bool,
    last_activity: u64,
    failures: u32,
    in_flight: bool,
    logged_out: bool,
}

impl LockController {
    pub fn new(services: ClientServices) -> Self {
        let now = services.clock.now_millis();
        Self {
            services,
            config: EffectiveConfig::default(),
            verifier: None,
            state: LockState::Unlocked,
            active: false,
            last_activity: now,
            failures: 0,
            in_flight: false,
            logged_out: false,
        }
    }

    pub fn state(&self) -> LockState {
        self.state
    }

    pub fn config(&self) -> &EffectiveConfig {
        &self.config
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight
    }

    pub fn is_logged_out(&self) -> bool {
        self.logged_out
    }

    /// Failures counted by this instance since the last unlock
    pub fn failures(&self) -> u32 {
        self.failures
    }

    pub fn verifier(&self) -> Option<&UnlockVerifier> {
        self.verifier.as_ref()
    }

    /// Load configuration and take the initial state
    pub async fn start(&mut self, mode: DisplayMode) -> LockState {
        if !mode.is_installed() {
            debug!(?mode, "Not running as an installed app, lock inactive");
            return self.state;
        }

        self.config = match self.services.api.fetch_config().await {
            Ok(config) => config,
            Err(e) => {
                warn!(error = %e, "Failed to load lock configuration, using defaults");
                EffectiveConfig::default()
            }
        };
        self.verifier = Some(UnlockVerifier::select(
            &self.config,
            self.services.api.clone(),
            self.services.local_store.clone(),
        ));

        if !self.has_credential() {
            self.nudge_setup();
            return self.state;
        }

        self.active = true;
        self.last_activity = self.now();
        info!(
            mode = self.config.encryption_mode.as_str(),
            idle_seconds = self.config.idle_seconds,
            "Lock active"
        );

        if !self.services.marker.is_set() {
            self.enter_locked("");
        }

        self.state
    }

    /// Whether a credential exists in the active mode
    pub fn has_credential(&self) -> bool {
        self.verifier
            .as_ref()
            .map_or(false, |v| v.has_credential(&self.config))
    }

    /// Pointer, key or click activity
    pub fn record_activity(&mut self) {
        if self.active {
            self.last_activity = self.now();
        }
    }

    /// Periodic idle check; returns true if this tick locked
    pub fn tick(&mut self) -> bool {
        if !self.active || self.logged_out || self.state == LockState::Locked {
            return false;
        }

        let idle = self.now().saturating_sub(self.last_activity);
        if idle >= self.idle_window_millis() {
            return self.enter_locked(messages::IDLE_HINT);
        }
        false
    }

    /// Page visibility change; locks when hidden if so configured
    pub fn visibility_changed(&mut self, visible: bool) -> bool {
        if !self.active || self.logged_out || visible || !self.config.ask_on_background {
            return false;
        }
        self.enter_locked(messages::BACKGROUND_HINT)
    }

    /// Message from another instance
    pub fn on_sync(&mut self, kind: SyncKind) -> bool {
        if !self.active || self.logged_out || !self.has_credential() {
            return false;
        }
        match kind {
            SyncKind::Locked => self.enter_locked(""),
            SyncKind::Unlocked => self.enter_unlocked(),
        }
    }

    /// Lock immediately
    pub fn lock_now(&mut self) -> bool {
        if !self.active || self.logged_out {
            return false;
        }
        self.enter_locked("")
    }

    /// Lock and ask the server to end the session
    pub async fn lockdown(&mut self) -> Result<()> {
        self.lock_now();
        self.services.api.lockdown().await?;
        self.terminate();
        Ok(())
    }

    /// Take and validate the typed PIN
    ///
    /// The input field is cleared whatever happens. Only one attempt can be
    /// pending at a time.
    pub fn begin_submit(&mut self) -> Submission {
        let typed = self.services.overlay.take_input();

        if self.in_flight || self.logged_out || self.state != LockState::Locked {
            debug!("Submission ignored");
            return Submission::Done(SubmitResult::Ignored);
        }

        if !self.has_credential() {
            self.enter_unlocked();
            self.services.overlay.toast(messages::NOT_CONFIGURED);
            return Submission::Done(SubmitResult::NotConfigured);
        }

        self.services.overlay.set_error("");

        let pin = Zeroizing::new(typed.trim().to_string());
        if pin.len() < MIN_PIN_LENGTH {
            self.services.overlay.set_error(messages::TOO_SHORT);
            return Submission::Done(SubmitResult::TooShort);
        }

        self.in_flight = true;
        Submission::Pending(PendingAttempt { pin })
    }

    /// Apply the result of a verification started by [`Self::begin_submit`]
    pub async fn finish_submit(&mut self, result: Result<Outcome>) -> SubmitResult {
        self.in_flight = false;

        let outcome = match result {
            Ok(outcome) => outcome,
            Err(ClientError::Unauthenticated) => {
                warn!("Session ended while locked");
                self.terminate();
                return SubmitResult::LockedOut;
            }
            Err(e) => {
                warn!(error = %e, "PIN verification failed");
                self.services.overlay.set_error(messages::VERIFY_ERROR);
                return SubmitResult::Error;
            }
        };

        let policy = LockoutPolicy::new(self.config.max_failures);

        match outcome {
            Outcome::Unlocked => {
                self.failures = 0;
                self.enter_unlocked();
                SubmitResult::Unlocked
            }
            Outcome::NotConfigured => {
                self.enter_unlocked();
                self.services.overlay.toast(messages::NOT_CONFIGURED);
                SubmitResult::NotConfigured
            }
            Outcome::LockedOut => {
                self.failures = self.failures.saturating_add(1);
                self.services
                    .overlay
                    .set_error(&messages::incorrect_with_remaining(0));
                self.terminate();
                SubmitResult::LockedOut
            }
            Outcome::Fail { remaining } => {
                self.failures = self.failures.saturating_add(1);
                let remaining = remaining.unwrap_or_else(|| policy.remaining(self.failures));
                self.services
                    .overlay
                    .set_error(&messages::incorrect_with_remaining(remaining));

                let exhausted = match self.mode() {
                    Some(EncryptionMode::Local) => policy.is_locked_out(self.failures),
                    _ => remaining == 0,
                };
                if !exhausted {
                    return SubmitResult::Failed { remaining };
                }

                if self.mode() == Some(EncryptionMode::Local) {
                    if let Err(e) = self.services.api.report_failure(self.failures).await {
                        warn!(error = %e, "Failed to report local failures");
                    }
                }
                self.terminate();
                SubmitResult::LockedOut
            }
        }
    }

    /// Full submission: take input, verify, apply
    pub async fn submit(&mut self) -> SubmitResult {
        match self.begin_submit() {
            Submission::Done(result) => result,
            Submission::Pending(attempt) => {
                let result = match self.verifier.clone() {
                    Some(verifier) => verifier.verify(attempt.into_pin()).await,
                    None => Ok(Outcome::NotConfigured),
                };
                self.finish_submit(result).await
            }
        }
    }

    fn mode(&self) -> Option<EncryptionMode> {
        self.verifier.as_ref().map(UnlockVerifier::mode)
    }

    fn now(&self) -> u64 {
        self.services.clock.now_millis()
    }

    fn idle_window_millis(&self) -> u64 {
        let configured = Duration::from_secs(u64::from(self.config.idle_seconds));
        configured.max(MIN_IDLE_WINDOW).as_millis() as u64
    }

    fn nudge_setup(&self) {
        let store = &self.services.session_store;
        if store.get(keys::PROMPTED).is_none() {
            store.set(keys::PROMPTED, "1");
            self.services.overlay.toast(messages::SETUP_PROMPT);
        }
    }

    fn enter_locked(&mut self, hint: &str) -> bool {
        if self.state == LockState::Locked || !self.has_credential() {
            return false;
        }

        self.state = LockState::Locked;
        self.services.marker.clear();
        self.services.broadcaster.post(SyncKind::Locked);

        let overlay = &self.services.overlay;
        overlay.set_hint(hint);
        overlay.set_error("");
        overlay.show();
        overlay.focus_input();

        info!(reason = hint, "Locked");
        true
    }

    fn enter_unlocked(&mut self) -> bool {
        if self.state == LockState::Unlocked {
            return false;
        }

        self.state = LockState::Unlocked;
        self.services.marker.set();
        self.services.broadcaster.post(SyncKind::Unlocked);

        self.services.overlay.set_error("");
        self.services.overlay.hide();
        self.last_activity = self.now();

        info!("Unlocked");
        true
    }

    fn terminate(&mut self) {
        self.logged_out = true;
        self.services.overlay.toast(messages::LOCKED_OUT);
        self.services.overlay.schedule_reload(RELOAD_DELAY);
        warn!(failures = self.failures, "Locked out, reloading");
    }
}
