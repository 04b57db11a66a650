use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header, request::Parts},
};

use crate::auth::errors::AuthError;
use crate::auth::repo_types::User;
use crate::auth::services;
use crate::state::AppState;

fn bearer_token(parts: &Parts) -> Result<&str, AuthError> {
    let auth = parts
        .headers
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .ok_or(AuthError::MissingCredentials)?;
    auth.strip_prefix("Bearer ")
        .or_else(|| auth.strip_prefix("bearer "))
        .ok_or(AuthError::MissingCredentials)
}

/// Authenticated principal: token verified, subject resolved in the store.
pub struct CurrentUser(pub User);

/// `CurrentUser` that also passed the active check.
pub struct ActiveUser(pub User);

/// `ActiveUser` that also passed the admin role check.
pub struct AdminUser(pub User);

#[async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = AuthError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts)?;
        let user = services::current_user(state, token).await?;
        Ok(CurrentUser(user))
    }
}

// The escalated tiers reuse the principal CurrentUser already resolved; the
// token is decoded exactly once per request.

#[async_trait]
impl FromRequestParts<AppState> for ActiveUser {
    type Rejection = AuthError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let CurrentUser(user) = CurrentUser::from_request_parts(parts, state).await?;
        Ok(ActiveUser(services::require_active(user)?))
    }
}

#[async_trait]
impl FromRequestParts<AppState> for AdminUser {
    type Rejection = AuthError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let CurrentUser(user) = CurrentUser::from_request_parts(parts, state).await?;
        Ok(AdminUser(services::require_admin(user)?))
    }
}
