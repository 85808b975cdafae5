//! Configuration endpoints

use std::sync::Arc;

use axum::{extract::State, Form, Json};
use pwalock_core::{AdminSettingsInput, ConfigResponse, StatusBody};
use serde::Deserialize;
use tracing::debug;

use crate::error::ApiError;
use crate::extract::{AdminUser, CurrentUser};
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct UserIdleForm {
    #[serde(default, rename = "idleSeconds")]
    pub idle_seconds: Option<String>,
}

/// Effective configuration for the current user
pub async fn effective(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
) -> Json<ConfigResponse> {
    let config = state.resolver.effective_config(&user.user_id).await;
    Json(ConfigResponse::ok(config))
}

/// Persist app-wide defaults
pub async fn save_admin(
    State(state): State<Arc<AppState>>,
    AdminUser(admin): AdminUser,
    input: Option<Form<AdminSettingsInput>>,
) -> Result<Json<StatusBody>, ApiError> {
    let input = input.map(|Form(i)| i).unwrap_or_default();
    debug!(user_id = %admin.user_id, "Saving admin defaults");
    state.resolver.save_admin_defaults(&input).await?;
    Ok(Json(StatusBody::ok()))
}

/// Persist the current user's idle timeout
pub async fn save_user(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    form: Option<Form<UserIdleForm>>,
) -> Result<Json<StatusBody>, ApiError> {
    let form = form.map(|Form(f)| f).unwrap_or_default();
    let seconds = state
        .resolver
        .save_user_idle(&user.user_id, form.idle_seconds.as_deref())
        .await?;
    debug!(user_id = %user.user_id, seconds, "Saved idle timeout");
    Ok(Json(StatusBody::ok()))
}
