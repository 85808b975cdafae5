//! End-to-end lock flows: a live server, the HTTP client and the lock controller
//!
//! Each test binds the server to an ephemeral port, backs it with a settings
//! file in a temp directory and drives a controller against it.

use std::sync::Arc;
use std::time::Duration;

use pwalock_client::controller::RELOAD_DELAY;
use pwalock_client::settings::save_pin;
use pwalock_client::{
    messages, ClientError, ClientServices, CookieMarker, DisplayMode, HttpLockApi, LockApi,
    LockController, LockState, ManualClock, MemoryCookieJar, MemoryLocalStore, NoopBroadcaster,
    RecordingOverlay, SubmitResult, SyncKind, UnlockMarker,
};
use pwalock_core::AdminSettingsInput;
use pwalock_server::{create_router, AppState, ServerConfig, SessionSeed};
use tempfile::TempDir;

const TOKEN: &str = "alice-session";

struct Server {
    base_url: String,
    state: Arc<AppState>,
    _dir: TempDir,
}

impl Server {
    async fn start(max_failures: &str, encryption_mode: &str) -> Self {
        let dir = TempDir::new().unwrap();
        let config = ServerConfig {
            data_path: dir.path().join("settings.json"),
            sessions: vec![SessionSeed {
                token: TOKEN.into(),
                user_id: "alice".into(),
                admin: false,
            }],
            ..ServerConfig::default()
        };
        let state = Arc::new(AppState::new(config).unwrap());

        state
            .resolver
            .save_admin_defaults(&AdminSettingsInput {
                encryption_mode: Some(encryption_mode.into()),
                key_method: Some("sha256".into()),
                max_failures: Some(max_failures.into()),
                ..Default::default()
            })
            .await
            .unwrap();

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let app = create_router(state.clone());
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url: format!("http://{}", addr),
            state,
            _dir: dir,
        }
    }

    fn api(&self) -> Arc<HttpLockApi> {
        Arc::new(
            HttpLockApi::new(&self.base_url)
                .unwrap()
                .with_access_token(TOKEN),
        )
    }
}

struct Instance {
    controller: LockController,
    overlay: Arc<RecordingOverlay>,
    marker: Arc<CookieMarker>,
    clock: Arc<ManualClock>,
}

impl Instance {
    fn new(api: Arc<HttpLockApi>, local: Arc<MemoryLocalStore>) -> Self {
        let overlay = Arc::new(RecordingOverlay::new());
        let marker = Arc::new(CookieMarker::new(Arc::new(MemoryCookieJar::new()), true));
        let clock = Arc::new(ManualClock::new(10_000));
        let controller = LockController::new(ClientServices {
            api,
            overlay: overlay.clone(),
            marker: marker.clone(),
            broadcaster: Arc::new(NoopBroadcaster),
            local_store: local,
            session_store: Arc::new(MemoryLocalStore::new()),
            clock: clock.clone(),
        });
        Self {
            controller,
            overlay,
            marker,
            clock,
        }
    }

    async fn enter(&mut self, pin: &str) -> SubmitResult {
        self.overlay.type_input(pin);
        self.controller.submit().await
    }
}

#[tokio::test]
async fn test_server_mode_lock_cycle() {
    let server = Server::start("3", "server").await;
    let api = server.api();
    let local = Arc::new(MemoryLocalStore::new());

    // No PIN yet: the app stays usable
    let config = api.fetch_config().await.unwrap();
    assert!(!config.has_server_pin);

    // Idle timeout is stored clamped
    api.save_idle(2).await.unwrap();
    assert_eq!(api.fetch_config().await.unwrap().idle_seconds, 5);
    api.save_idle(300).await.unwrap();

    save_pin(&config, "4821", api.as_ref(), local.clone())
        .await
        .unwrap();

    let mut app = Instance::new(api.clone(), local);
    assert_eq!(
        app.controller.start(DisplayMode::Standalone).await,
        LockState::Locked
    );
    assert!(app.overlay.snapshot().visible);

    assert_eq!(app.enter("0000").await, SubmitResult::Failed { remaining: 2 });
    assert_eq!(
        app.overlay.snapshot().error,
        messages::incorrect_with_remaining(2)
    );
    assert_eq!(server.state.pins.failed_attempts("alice").await.unwrap(), 1);

    assert_eq!(app.enter("4821").await, SubmitResult::Unlocked);
    assert!(app.marker.is_set());
    assert!(!app.overlay.snapshot().visible);
    assert_eq!(server.state.pins.failed_attempts("alice").await.unwrap(), 0);

    // Idle timeout
    app.clock.advance(Duration::from_secs(299));
    assert!(!app.controller.tick());
    app.clock.advance(Duration::from_secs(1));
    assert!(app.controller.tick());
    assert!(!app.marker.is_set());

    assert_eq!(app.enter("1111").await, SubmitResult::Failed { remaining: 2 });
    assert_eq!(app.enter("1111").await, SubmitResult::Failed { remaining: 1 });
    assert_eq!(app.enter("1111").await, SubmitResult::LockedOut);

    let overlay = app.overlay.snapshot();
    assert_eq!(overlay.reloads, vec![RELOAD_DELAY]);
    assert!(overlay.toasts.iter().any(|t| t == messages::LOCKED_OUT));
    assert!(app.controller.is_logged_out());

    // The session is gone and the user was told why
    assert!(matches!(
        api.fetch_config().await,
        Err(ClientError::Unauthenticated)
    ));
    let queued = server.state.notifications.for_user("alice").await;
    assert_eq!(queued.len(), 1);
    assert_eq!(queued[0].attempts, 3);
}

#[tokio::test]
async fn test_local_mode_reports_lockout() {
    let server = Server::start("2", "local").await;
    let api = server.api();
    let local = Arc::new(MemoryLocalStore::new());

    let config = api.fetch_config().await.unwrap();
    save_pin(&config, "9157", api.as_ref(), local.clone())
        .await
        .unwrap();
    // Nothing reached the server
    assert!(!api.fetch_config().await.unwrap().has_server_pin);

    let mut app = Instance::new(api.clone(), local.clone());
    assert_eq!(
        app.controller.start(DisplayMode::Standalone).await,
        LockState::Locked
    );
    assert_eq!(app.enter("9157").await, SubmitResult::Unlocked);

    app.controller.lock_now();
    assert_eq!(app.enter("0000").await, SubmitResult::Failed { remaining: 1 });
    assert_eq!(app.enter("0000").await, SubmitResult::LockedOut);

    assert_eq!(server.state.pins.failed_attempts("alice").await.unwrap(), 2);
    assert_eq!(server.state.sessions.active_sessions("alice").await, 0);
    assert!(matches!(
        api.fetch_config().await,
        Err(ClientError::Unauthenticated)
    ));
}

#[tokio::test]
async fn test_second_instance_follows_sync() {
    let server = Server::start("5", "server").await;
    let api = server.api();
    let local = Arc::new(MemoryLocalStore::new());

    let config = api.fetch_config().await.unwrap();
    save_pin(&config, "4821", api.as_ref(), local.clone())
        .await
        .unwrap();

    let mut first = Instance::new(api.clone(), local.clone());
    let mut second = Instance::new(api.clone(), local);
    first.controller.start(DisplayMode::Standalone).await;
    second.controller.start(DisplayMode::Fullscreen).await;

    assert_eq!(first.enter("4821").await, SubmitResult::Unlocked);
    assert!(second.controller.on_sync(SyncKind::Unlocked));
    assert_eq!(second.controller.state(), LockState::Unlocked);
    assert!(!second.controller.on_sync(SyncKind::Unlocked));

    assert!(first.controller.lock_now());
    assert!(second.controller.on_sync(SyncKind::Locked));
    assert!(second.overlay.snapshot().visible);
}

#[tokio::test]
async fn test_lockdown_logs_out() {
    let server = Server::start("5", "server").await;
    let api = server.api();
    let local = Arc::new(MemoryLocalStore::new());

    let config = api.fetch_config().await.unwrap();
    save_pin(&config, "4821", api.as_ref(), local.clone())
        .await
        .unwrap();

    let mut app = Instance::new(api.clone(), local);
    app.controller.start(DisplayMode::Standalone).await;
    assert_eq!(app.enter("4821").await, SubmitResult::Unlocked);

    app.controller.lockdown().await.unwrap();
    assert_eq!(app.controller.state(), LockState::Locked);
    assert!(app.controller.is_logged_out());
    assert!(server.state.notifications.is_empty().await);
    assert!(matches!(
        api.fetch_config().await,
        Err(ClientError::Unauthenticated)
    ));
}
