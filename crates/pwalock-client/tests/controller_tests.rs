//! Lock controller behaviour against a scripted server API

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use proptest::prelude::*;

use pwalock_client::controller::RELOAD_DELAY;
use pwalock_client::storage::{clear_local_credential, store_local_credential};
use pwalock_client::{
    messages, Broadcaster, ClientError, ClientServices, DisplayMode, LockApi, LockController,
    LocalStore, LockState, ManualClock, MemoryLocalStore, MemoryMarker, RecordingOverlay, Submission,
    SubmitResult, SyncKind, UnlockMarker,
};
use pwalock_core::store::keys;
use pwalock_core::{
    EffectiveConfig, EncryptionMode, KeyMethod, LocalCredential, ReportOutcome, VerifyOutcome,
};

#[derive(Default)]
struct StubApi {
    config: Mutex<Option<EffectiveConfig>>,
    verify_results: Mutex<VecDeque<pwalock_client::Result<VerifyOutcome>>>,
    verified: Mutex<Vec<String>>,
    reports: Mutex<Vec<u32>>,
    config_fetches: AtomicU32,
}

impl StubApi {
    fn with_config(config: EffectiveConfig) -> Self {
        let api = Self::default();
        *api.config.lock().unwrap() = Some(config);
        api
    }

    fn push_verify(&self, result: pwalock_client::Result<VerifyOutcome>) {
        self.verify_results.lock().unwrap().push_back(result);
    }
}

#[async_trait]
impl LockApi for StubApi {
    async fn fetch_config(&self) -> pwalock_client::Result<EffectiveConfig> {
        self.config_fetches.fetch_add(1, Ordering::SeqCst);
        self.config
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| ClientError::Decode("offline".into()))
    }

    async fn verify_pin(&self, pin: &str) -> pwalock_client::Result<VerifyOutcome> {
        self.verified.lock().unwrap().push(pin.to_string());
        self.verify_results
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(ClientError::Decode("no scripted result".into())))
    }

    async fn report_failure(&self, count: u32) -> pwalock_client::Result<ReportOutcome> {
        self.reports.lock().unwrap().push(count);
        Ok(ReportOutcome::LockedOut)
    }

    async fn set_pin(&self, _pin: &str) -> pwalock_client::Result<()> {
        Ok(())
    }

    async fn save_idle(&self, _seconds: u32) -> pwalock_client::Result<()> {
        Ok(())
    }

    async fn lockdown(&self) -> pwalock_client::Result<()> {
        Ok(())
    }
}

#[derive(Default)]
struct RecordingBroadcaster {
    sent: Mutex<Vec<SyncKind>>,
}

impl Broadcaster for RecordingBroadcaster {
    fn post(&self, kind: SyncKind) {
        self.sent.lock().unwrap().push(kind);
    }
}

struct Fixture {
    api: Arc<StubApi>,
    overlay: Arc<RecordingOverlay>,
    marker: Arc<MemoryMarker>,
    broadcasts: Arc<RecordingBroadcaster>,
    local: Arc<MemoryLocalStore>,
    session: Arc<MemoryLocalStore>,
    clock: Arc<ManualClock>,
}

impl Fixture {
    fn new(api: StubApi) -> Self {
        Self {
            api: Arc::new(api),
            overlay: Arc::new(RecordingOverlay::new()),
            marker: Arc::new(MemoryMarker::new()),
            broadcasts: Arc::new(RecordingBroadcaster::default()),
            local: Arc::new(MemoryLocalStore::new()),
            session: Arc::new(MemoryLocalStore::new()),
            clock: Arc::new(ManualClock::new(1_000_000)),
        }
    }

    fn controller(&self) -> LockController {
        LockController::new(ClientServices {
            api: self.api.clone(),
            overlay: self.overlay.clone(),
            marker: self.marker.clone(),
            broadcaster: self.broadcasts.clone(),
            local_store: self.local.clone(),
            session_store: self.session.clone(),
            clock: self.clock.clone(),
        })
    }

    fn broadcasts(&self) -> Vec<SyncKind> {
        self.broadcasts.sent.lock().unwrap().clone()
    }
}

fn server_config(has_pin: bool) -> EffectiveConfig {
    EffectiveConfig {
        has_server_pin: has_pin,
        ..Default::default()
    }
}

/// Started in server mode with a PIN and the marker set, so unlocked
async fn unlocked_server(config: EffectiveConfig) -> (Fixture, LockController) {
    let fx = Fixture::new(StubApi::with_config(config));
    fx.marker.set();
    let mut controller = fx.controller();
    assert_eq!(
        controller.start(DisplayMode::Standalone).await,
        LockState::Unlocked
    );
    (fx, controller)
}

/// Started in server mode with a PIN and no marker, so locked
async fn locked_server(max_failures: u32) -> (Fixture, LockController) {
    let fx = Fixture::new(StubApi::with_config(EffectiveConfig {
        max_failures,
        ..server_config(true)
    }));
    let mut controller = fx.controller();
    assert_eq!(
        controller.start(DisplayMode::Standalone).await,
        LockState::Locked
    );
    (fx, controller)
}

#[tokio::test]
async fn test_browser_tab_stays_inert() {
    let fx = Fixture::new(StubApi::with_config(server_config(true)));
    let mut controller = fx.controller();

    assert_eq!(controller.start(DisplayMode::Browser).await, LockState::Unlocked);
    assert_eq!(fx.api.config_fetches.load(Ordering::SeqCst), 0);

    fx.clock.advance(Duration::from_secs(3600));
    assert!(!controller.tick());
    assert!(!controller.on_sync(SyncKind::Locked));
    assert!(!controller.is_active());
}

#[tokio::test]
async fn test_no_credential_never_locks() {
    let fx = Fixture::new(StubApi::with_config(EffectiveConfig {
        idle_seconds: 5,
        ..server_config(false)
    }));
    let mut controller = fx.controller();

    assert_eq!(
        controller.start(DisplayMode::Standalone).await,
        LockState::Unlocked
    );

    fx.clock.advance(Duration::from_secs(10));
    assert!(!controller.tick());
    assert!(!controller.visibility_changed(false));
    assert!(!controller.on_sync(SyncKind::Locked));
    assert!(!controller.lock_now());

    let overlay = fx.overlay.snapshot();
    assert!(!overlay.visible);
    assert_eq!(overlay.show_count, 0);
}

#[tokio::test]
async fn test_setup_prompt_once_per_session() {
    let fx = Fixture::new(StubApi::with_config(server_config(false)));

    fx.controller().start(DisplayMode::Standalone).await;
    fx.controller().start(DisplayMode::Standalone).await;

    assert_eq!(fx.overlay.snapshot().toasts, vec![messages::SETUP_PROMPT]);
    assert_eq!(fx.session.get(keys::PROMPTED).as_deref(), Some("1"));
}

#[tokio::test]
async fn test_config_failure_falls_back_to_unlocked() {
    let fx = Fixture::new(StubApi::default());
    let mut controller = fx.controller();

    assert_eq!(
        controller.start(DisplayMode::Standalone).await,
        LockState::Unlocked
    );
    assert_eq!(controller.config(), &EffectiveConfig::default());
    assert!(!controller.has_credential());
}

#[tokio::test]
async fn test_locks_on_load_without_marker() {
    let (fx, controller) = locked_server(5).await;

    let overlay = fx.overlay.snapshot();
    assert!(overlay.visible);
    assert_eq!(overlay.hint, "");
    assert_eq!(overlay.focus_count, 1);
    assert!(!fx.marker.is_set());
    assert_eq!(fx.broadcasts(), vec![SyncKind::Locked]);
    assert!(controller.is_active());
}

#[tokio::test]
async fn test_idle_threshold() {
    let (fx, mut controller) = unlocked_server(EffectiveConfig {
        idle_seconds: 300,
        ..server_config(true)
    })
    .await;

    fx.clock.advance(Duration::from_secs(299));
    assert!(!controller.tick());
    assert_eq!(controller.state(), LockState::Unlocked);

    fx.clock.advance(Duration::from_secs(1));
    assert!(controller.tick());
    assert_eq!(controller.state(), LockState::Locked);
    assert_eq!(fx.overlay.snapshot().hint, messages::IDLE_HINT);
    assert!(!fx.marker.is_set());
}

#[tokio::test]
async fn test_activity_resets_idle_clock() {
    let (fx, mut controller) = unlocked_server(EffectiveConfig {
        idle_seconds: 60,
        ..server_config(true)
    })
    .await;

    fx.clock.advance(Duration::from_secs(59));
    controller.record_activity();
    fx.clock.advance(Duration::from_secs(59));
    assert!(!controller.tick());

    fx.clock.advance(Duration::from_secs(1));
    assert!(controller.tick());
}

#[tokio::test]
async fn test_background_lock_follows_setting() {
    let (fx, mut controller) = unlocked_server(server_config(true)).await;
    assert!(!controller.visibility_changed(true));
    assert!(controller.visibility_changed(false));
    assert_eq!(fx.overlay.snapshot().hint, messages::BACKGROUND_HINT);

    let (_fx, mut controller) = unlocked_server(EffectiveConfig {
        ask_on_background: false,
        ..server_config(true)
    })
    .await;
    assert!(!controller.visibility_changed(false));
    assert_eq!(controller.state(), LockState::Unlocked);
}

#[tokio::test]
async fn test_duplicate_sync_is_a_no_op() {
    let (fx, mut controller) = locked_server(5).await;
    let writes = fx.marker.writes();
    let shows = fx.overlay.snapshot().show_count;

    assert!(!controller.on_sync(SyncKind::Locked));
    assert!(!controller.on_sync(SyncKind::Locked));

    assert_eq!(fx.marker.writes(), writes);
    assert_eq!(fx.overlay.snapshot().show_count, shows);
    assert_eq!(fx.broadcasts(), vec![SyncKind::Locked]);

    assert!(controller.on_sync(SyncKind::Unlocked));
    assert!(!controller.on_sync(SyncKind::Unlocked));
    assert!(fx.marker.is_set());
    assert!(!fx.overlay.snapshot().visible);
}

#[tokio::test]
async fn test_server_three_failures_lock_out() {
    let (fx, mut controller) = locked_server(3).await;
    fx.api.push_verify(Ok(VerifyOutcome::Fail { remaining: 2 }));
    fx.api.push_verify(Ok(VerifyOutcome::Fail { remaining: 1 }));
    fx.api.push_verify(Ok(VerifyOutcome::LockedOut));

    fx.overlay.type_input("0000");
    assert_eq!(controller.submit().await, SubmitResult::Failed { remaining: 2 });
    assert_eq!(fx.overlay.snapshot().error, "Incorrect code. Remaining attempts: 2");
    assert_eq!(fx.overlay.snapshot().input, "");

    fx.overlay.type_input("1111");
    assert_eq!(controller.submit().await, SubmitResult::Failed { remaining: 1 });

    fx.overlay.type_input("2222");
    assert_eq!(controller.submit().await, SubmitResult::LockedOut);

    let overlay = fx.overlay.snapshot();
    assert_eq!(overlay.error, "Incorrect code. Remaining attempts: 0");
    assert_eq!(overlay.toasts.last().map(String::as_str), Some(messages::LOCKED_OUT));
    assert_eq!(overlay.reloads, vec![RELOAD_DELAY]);
    assert_eq!(RELOAD_DELAY, Duration::from_millis(750));
    assert!(controller.is_logged_out());

    // Nothing further is accepted
    fx.overlay.type_input("4821");
    assert_eq!(controller.submit().await, SubmitResult::Ignored);
    assert_eq!(fx.api.verified.lock().unwrap().len(), 3);
}

#[tokio::test]
async fn test_correct_pin_unlocks() {
    let (fx, mut controller) = locked_server(5).await;
    fx.api.push_verify(Ok(VerifyOutcome::Fail { remaining: 4 }));
    fx.api.push_verify(Ok(VerifyOutcome::Unlocked));

    fx.overlay.type_input("0000");
    controller.submit().await;
    assert_eq!(controller.failures(), 1);

    fx.overlay.type_input("  4821 ");
    assert_eq!(controller.submit().await, SubmitResult::Unlocked);
    assert_eq!(controller.failures(), 0);
    assert_eq!(controller.state(), LockState::Unlocked);
    assert!(fx.marker.is_set());
    assert_eq!(fx.broadcasts().last(), Some(&SyncKind::Unlocked));
    assert_eq!(fx.api.verified.lock().unwrap()[1], "4821");
}

#[tokio::test]
async fn test_short_input_rejected_without_request() {
    let (fx, mut controller) = locked_server(5).await;

    fx.overlay.type_input(" 12 ");
    assert_eq!(controller.submit().await, SubmitResult::TooShort);
    assert_eq!(fx.overlay.snapshot().error, messages::TOO_SHORT);
    assert_eq!(fx.overlay.snapshot().input, "");
    assert!(fx.api.verified.lock().unwrap().is_empty());
    assert_eq!(controller.failures(), 0);
}

#[tokio::test]
async fn test_network_error_changes_nothing() {
    let (fx, mut controller) = locked_server(5).await;
    fx.api.push_verify(Err(ClientError::Server {
        status: 502,
        message: "bad gateway".into(),
    }));

    fx.overlay.type_input("4821");
    assert_eq!(controller.submit().await, SubmitResult::Error);
    assert_eq!(fx.overlay.snapshot().error, messages::VERIFY_ERROR);
    assert_eq!(controller.failures(), 0);
    assert_eq!(controller.state(), LockState::Locked);
    assert!(!controller.is_in_flight());
}

#[tokio::test]
async fn test_expired_session_sends_to_login() {
    let (fx, mut controller) = locked_server(5).await;
    fx.api.push_verify(Err(ClientError::Unauthenticated));

    fx.overlay.type_input("4821");
    assert_eq!(controller.submit().await, SubmitResult::LockedOut);
    assert!(controller.is_logged_out());
    assert_eq!(controller.state(), LockState::Locked);

    let overlay = fx.overlay.snapshot();
    assert_eq!(overlay.reloads, vec![RELOAD_DELAY]);
    assert!(overlay.toasts.iter().any(|t| t == messages::LOCKED_OUT));

    // Nothing more is sent once logged out
    fx.overlay.type_input("4821");
    assert_eq!(controller.submit().await, SubmitResult::Ignored);
    assert_eq!(fx.api.verified.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn test_not_configured_response_releases_overlay() {
    let (fx, mut controller) = locked_server(5).await;
    fx.api.push_verify(Ok(VerifyOutcome::NotConfigured));

    fx.overlay.type_input("4821");
    assert_eq!(controller.submit().await, SubmitResult::NotConfigured);
    assert_eq!(controller.state(), LockState::Unlocked);
    assert!(!fx.overlay.snapshot().visible);
    assert_eq!(
        fx.overlay.snapshot().toasts.last().map(String::as_str),
        Some(messages::NOT_CONFIGURED)
    );
}

#[tokio::test]
async fn test_second_submit_ignored_while_pending() {
    let (fx, mut controller) = locked_server(5).await;

    fx.overlay.type_input("4821");
    let first = controller.begin_submit();
    assert!(matches!(first, Submission::Pending(_)));
    assert!(controller.is_in_flight());

    fx.overlay.type_input("4821");
    assert!(matches!(
        controller.begin_submit(),
        Submission::Done(SubmitResult::Ignored)
    ));
    // Input is still cleared
    assert_eq!(fx.overlay.snapshot().input, "");

    let result = controller
        .finish_submit(Ok(pwalock_client::Outcome::Fail { remaining: Some(4) }))
        .await;
    assert_eq!(result, SubmitResult::Failed { remaining: 4 });
    assert_eq!(controller.failures(), 1);
}

#[tokio::test]
async fn test_local_mode_unlock_and_report() {
    let config = EffectiveConfig {
        encryption_mode: EncryptionMode::Local,
        key_method: KeyMethod::Sha256,
        max_failures: 3,
        ..Default::default()
    };
    let fx = Fixture::new(StubApi::with_config(config));
    let credential = LocalCredential::create("4821", KeyMethod::Sha256).unwrap();
    store_local_credential(fx.local.as_ref(), &credential);

    let mut controller = fx.controller();
    assert_eq!(
        controller.start(DisplayMode::Standalone).await,
        LockState::Locked
    );

    fx.overlay.type_input("4821");
    assert_eq!(controller.submit().await, SubmitResult::Unlocked);
    assert!(fx.api.verified.lock().unwrap().is_empty());

    controller.lock_now();
    for expected in [2, 1] {
        fx.overlay.type_input("0000");
        assert_eq!(
            controller.submit().await,
            SubmitResult::Failed { remaining: expected }
        );
    }
    assert!(fx.api.reports.lock().unwrap().is_empty());

    fx.overlay.type_input("0000");
    assert_eq!(controller.submit().await, SubmitResult::LockedOut);
    assert_eq!(*fx.api.reports.lock().unwrap(), vec![3]);
    assert_eq!(fx.overlay.snapshot().reloads, vec![RELOAD_DELAY]);
}

#[tokio::test]
async fn test_sync_ignored_once_credential_removed() {
    let fx = Fixture::new(StubApi::with_config(EffectiveConfig {
        encryption_mode: EncryptionMode::Local,
        key_method: KeyMethod::Sha256,
        ..Default::default()
    }));
    let credential = LocalCredential::create("4821", KeyMethod::Sha256).unwrap();
    store_local_credential(fx.local.as_ref(), &credential);

    let mut controller = fx.controller();
    assert_eq!(
        controller.start(DisplayMode::Standalone).await,
        LockState::Locked
    );

    clear_local_credential(fx.local.as_ref());
    assert!(!controller.on_sync(SyncKind::Unlocked));
    assert_eq!(controller.state(), LockState::Locked);
    assert!(!fx.marker.is_set());
}

#[tokio::test]
async fn test_local_mode_without_credential_is_unlocked() {
    let fx = Fixture::new(StubApi::with_config(EffectiveConfig {
        encryption_mode: EncryptionMode::Local,
        // Server PIN does not count in local mode
        has_server_pin: true,
        ..Default::default()
    }));
    let mut controller = fx.controller();

    assert_eq!(
        controller.start(DisplayMode::Standalone).await,
        LockState::Unlocked
    );
    assert!(!controller.is_active());
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn prop_idle_lock_at_window(idle_seconds in 5u32..=86_400, short_by in 1u64..5_000) {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        runtime.block_on(async {
            let (fx, mut controller) = unlocked_server(EffectiveConfig {
                idle_seconds,
                ..server_config(true)
            })
            .await;
            let window = u64::from(idle_seconds) * 1000;

            fx.clock.advance(Duration::from_millis(window - short_by.min(window)));
            assert!(!controller.tick());
            fx.clock.advance(Duration::from_millis(short_by.min(window)));
            assert!(controller.tick());
            assert_eq!(controller.state(), LockState::Locked);
        });
    }
}
