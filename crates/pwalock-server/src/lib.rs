//! PWA Lock server
//!
//! Serves the configuration and PIN endpoints used by the lock overlay.
//! Sessions come from a built-in bearer-token registry seeded from the
//! server config; failure notifications are queued in memory.

pub mod api;
pub mod config;
pub mod error;
pub mod extract;
pub mod notify;
pub mod session;
pub mod state;

use std::sync::Arc;

use axum::Router;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::info;

pub use config::{ServerConfig, SessionSeed, CONFIG_ENV};
pub use error::{ApiError, Result, ServerError};
pub use notify::NotificationQueue;
pub use session::{SessionInfo, SessionRegistry};
pub use state::AppState;

/// Build the router with all routes and middleware
pub fn create_router(state: Arc<AppState>) -> Router {
    api::routes()
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

/// Serve until `shutdown` resolves
pub async fn serve(
    state: Arc<AppState>,
    shutdown: impl std::future::Future<Output = ()> + Send + 'static,
) -> Result<()> {
    let addr = state.config.bind_address;
    let app = create_router(state);

    let listener = TcpListener::bind(addr).await?;
    info!("Listening on http://{}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;

    Ok(())
}
