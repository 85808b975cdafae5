//! HTTP API routes

mod config;
mod health;
mod security;

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};

use crate::state::AppState;

/// All routes served by the lock server
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/health", get(health::health))
        // Configuration
        .route("/config/effective", get(config::effective))
        .route("/config", get(config::effective))
        .route("/config/admin", post(config::save_admin))
        .route("/config/user", post(config::save_user))
        // Security
        .route("/security/pin", post(security::set_pin))
        .route("/security/verify", post(security::verify))
        .route("/security/failure", post(security::report_failure))
        .route("/security/lockdown", post(security::lockdown))
}
