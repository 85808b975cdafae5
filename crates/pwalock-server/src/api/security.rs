//! PIN management and verification endpoints

use std::sync::Arc;

use axum::{extract::State, response::Response, Form};
use pwalock_core::{config::parse_int, ApiStatus, StatusBody};
use serde::Deserialize;
use zeroize::Zeroizing;

use crate::error::{respond, ApiError};
use crate::extract::CurrentUser;
use crate::state::AppState;

#[derive(Default, Deserialize)]
pub struct PinForm {
    #[serde(default)]
    pub pin: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct FailureForm {
    #[serde(default)]
    pub count: Option<String>,
}

// A missing or unreadable body reads as an empty PIN
fn take_pin(form: Option<Form<PinForm>>) -> Zeroizing<String> {
    Zeroizing::new(form.and_then(|Form(f)| f.pin).unwrap_or_default())
}

/// Set or change the server-side PIN
pub async fn set_pin(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    form: Option<Form<PinForm>>,
) -> Result<Response, ApiError> {
    let pin = take_pin(form);
    state.pins.set_credential(&user.user_id, &pin).await?;
    Ok(respond(StatusBody::ok()))
}

/// Verify a submitted PIN
pub async fn verify(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    form: Option<Form<PinForm>>,
) -> Result<Response, ApiError> {
    let pin = take_pin(form);
    let outcome = state.pins.verify(&user.user_id, &pin).await?;
    Ok(respond(outcome.into()))
}

/// Record the failure count of a local-mode client
pub async fn report_failure(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    form: Option<Form<FailureForm>>,
) -> Result<Response, ApiError> {
    let form = form.map(|Form(f)| f).unwrap_or_default();
    let count = form.count.as_deref().and_then(parse_int).unwrap_or(0);
    let outcome = state.pins.report_failure(&user.user_id, count).await?;
    Ok(respond(outcome.into()))
}

/// End every session of the current user
pub async fn lockdown(State(state): State<Arc<AppState>>, user: CurrentUser) -> Response {
    state.pins.lockdown(&user.user_id).await;
    respond(StatusBody::new(ApiStatus::LockedOut))
}
