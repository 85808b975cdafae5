//! Request extractors for the current user

use std::sync::Arc;

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};

use crate::error::ApiError;
use crate::state::AppState;

/// The logged-in user behind the request's bearer token
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub user_id: String,
    pub admin: bool,
}

/// A logged-in user with elevated privilege
#[derive(Debug, Clone)]
pub struct AdminUser(pub CurrentUser);

fn bearer_token(parts: &Parts) -> Option<&str> {
    parts
        .headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

#[async_trait]
impl FromRequestParts<Arc<AppState>> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts).ok_or(ApiError::Unauthenticated)?;
        let session = state
            .sessions
            .lookup(token)
            .await
            .ok_or(ApiError::Unauthenticated)?;

        Ok(CurrentUser {
            user_id: session.user_id,
            admin: session.admin,
        })
    }
}

#[async_trait]
impl FromRequestParts<Arc<AppState>> for AdminUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let user = CurrentUser::from_request_parts(parts, state).await?;
        if !user.admin {
            return Err(ApiError::Forbidden);
        }
        Ok(AdminUser(user))
    }
}
