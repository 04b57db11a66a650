use axum::extract::FromRef;
use tracing::warn;

use crate::auth::dto::TokenResponse;
use crate::auth::errors::AuthError;
use crate::auth::jwt::JwtKeys;
use crate::auth::password::verify_password;
use crate::auth::repo::UserStore;
use crate::auth::repo_types::{Role, User};
use crate::state::AppState;

/// Check credentials against the store. Unknown username, inactive account
/// and wrong password all come back as `Ok(None)` so the caller cannot tell
/// them apart (and neither can whoever is probing usernames). Never mutates
/// the stored record.
pub async fn authenticate(
    store: &dyn UserStore,
    username: &str,
    password: &str,
) -> Result<Option<User>, AuthError> {
    let user = store
        .find_by_username(username)
        .await
        .map_err(AuthError::Internal)?;
    let Some(user) = user else {
        warn!(username = %username, "authentication for unknown username");
        return Ok(None);
    };
    if !user.is_active {
        warn!(username = %username, "authentication for inactive account");
        return Ok(None);
    }
    if !verify_password(password, &user.password_hash) {
        warn!(username = %username, "authentication with wrong password");
        return Ok(None);
    }
    Ok(Some(user))
}

/// The only code path that mints tokens.
pub async fn login(
    state: &AppState,
    username: &str,
    password: &str,
) -> Result<TokenResponse, AuthError> {
    let user = authenticate(state.users.as_ref(), username, password)
        .await?
        .ok_or(AuthError::InvalidCredentials)?;
    let keys = JwtKeys::from_ref(state);
    let access_token = keys.sign(&user.username).map_err(AuthError::Internal)?;
    Ok(TokenResponse {
        access_token,
        token_type: "bearer".into(),
    })
}

/// Resolve a bearer token to its user: verify signature and expiry, require a
/// non-empty subject, then look the subject up. Every failure on this path is
/// the same generic 401.
pub async fn current_user(state: &AppState, token: &str) -> Result<User, AuthError> {
    let keys = JwtKeys::from_ref(state);
    let claims = keys.verify(token).map_err(|e| {
        warn!(error = %e, "token verification failed");
        AuthError::InvalidToken
    })?;
    if claims.sub.is_empty() {
        return Err(AuthError::InvalidToken);
    }
    match state.users.find_by_username(&claims.sub).await {
        Ok(Some(user)) => Ok(user),
        Ok(None) => {
            warn!(username = %claims.sub, "token subject not found");
            Err(AuthError::InvalidToken)
        }
        Err(e) => Err(AuthError::Internal(e)),
    }
}

pub fn require_active(user: User) -> Result<User, AuthError> {
    if !user.is_active {
        return Err(AuthError::InactiveUser);
    }
    Ok(user)
}

/// Tiers are ordered: the active check runs before the role check, and the
/// first failing check wins.
pub fn require_admin(user: User) -> Result<User, AuthError> {
    let user = require_active(user)?;
    if user.role != Role::Admin {
        return Err(AuthError::Forbidden);
    }
    Ok(user)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use uuid::Uuid;

    use super::*;
    use crate::auth::password::hash_password;
    use crate::auth::repo::testing::InMemoryUserStore;
    use crate::auth::repo_types::NewUser;

    async fn seed_user(
        store: &InMemoryUserStore,
        username: &str,
        password: &str,
        role: Role,
        is_active: bool,
    ) {
        store
            .insert(NewUser {
                id: Uuid::new_v4(),
                username: username.into(),
                email: format!("{username}@example.com"),
                password_hash: hash_password(password).expect("hash"),
                role,
                is_active,
            })
            .await
            .expect("seed user");
    }

    fn fake_state(store: Arc<InMemoryUserStore>) -> AppState {
        AppState::fake(store)
    }

    #[tokio::test]
    async fn unknown_user_and_wrong_password_are_indistinguishable() {
        let store = Arc::new(InMemoryUserStore::default());
        seed_user(&store, "alice", "secret123", Role::User, true).await;

        let unknown = authenticate(store.as_ref(), "ghost", "x").await.unwrap();
        let wrong = authenticate(store.as_ref(), "alice", "wrong")
            .await
            .unwrap();
        assert!(unknown.is_none());
        assert!(wrong.is_none());
    }

    #[tokio::test]
    async fn inactive_user_with_correct_password_is_rejected() {
        let store = Arc::new(InMemoryUserStore::default());
        seed_user(&store, "alice", "secret123", Role::User, false).await;

        let result = authenticate(store.as_ref(), "alice", "secret123")
            .await
            .unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn authenticate_returns_full_record_on_success() {
        let store = Arc::new(InMemoryUserStore::default());
        seed_user(&store, "alice", "secret123", Role::User, true).await;

        let user = authenticate(store.as_ref(), "alice", "secret123")
            .await
            .unwrap()
            .expect("should authenticate");
        assert_eq!(user.username, "alice");
        assert_eq!(user.role, Role::User);
    }

    #[tokio::test]
    async fn login_returns_bearer_token() {
        let store = Arc::new(InMemoryUserStore::default());
        seed_user(&store, "alice", "secret123", Role::User, true).await;
        let state = fake_state(store);

        let token = login(&state, "alice", "secret123").await.expect("login");
        assert_eq!(token.token_type, "bearer");
        assert!(!token.access_token.is_empty());
    }

    #[tokio::test]
    async fn login_for_inactive_user_is_unauthorized_not_inactive() {
        let store = Arc::new(InMemoryUserStore::default());
        seed_user(&store, "alice", "secret123", Role::User, false).await;
        let state = fake_state(store);

        let err = login(&state, "alice", "secret123").await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidCredentials));
    }

    #[tokio::test]
    async fn login_failures_share_one_error() {
        let store = Arc::new(InMemoryUserStore::default());
        seed_user(&store, "alice", "secret123", Role::User, true).await;
        let state = fake_state(store);

        let wrong = login(&state, "alice", "wrong").await.unwrap_err();
        let ghost = login(&state, "ghost", "x").await.unwrap_err();
        assert!(matches!(wrong, AuthError::InvalidCredentials));
        assert!(matches!(ghost, AuthError::InvalidCredentials));
    }

    #[tokio::test]
    async fn current_user_resolves_token_subject() {
        let store = Arc::new(InMemoryUserStore::default());
        seed_user(&store, "alice", "secret123", Role::User, true).await;
        let state = fake_state(store);

        let token = login(&state, "alice", "secret123").await.expect("login");
        let user = current_user(&state, &token.access_token)
            .await
            .expect("resolve principal");
        assert_eq!(user.username, "alice");
    }

    #[tokio::test]
    async fn current_user_rejects_token_for_vanished_subject() {
        let store = Arc::new(InMemoryUserStore::default());
        let state = fake_state(store);

        // Token is well-signed but its subject does not exist.
        let keys = JwtKeys::from_ref(&state);
        let token = keys.sign("ghost").expect("sign");
        let err = current_user(&state, &token).await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidToken));
    }

    #[tokio::test]
    async fn current_user_rejects_garbage_token() {
        let store = Arc::new(InMemoryUserStore::default());
        let state = fake_state(store);

        let err = current_user(&state, "not-a-token").await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidToken));
    }

    #[tokio::test]
    async fn active_tier_passes_and_admin_tier_fails_for_plain_user() {
        let store = Arc::new(InMemoryUserStore::default());
        seed_user(&store, "alice", "secret123", Role::User, true).await;
        let state = fake_state(store);

        let token = login(&state, "alice", "secret123").await.expect("login");
        let user = current_user(&state, &token.access_token).await.unwrap();

        let active = require_active(user.clone()).expect("active tier");
        assert_eq!(active.username, "alice");
        let err = require_admin(user).unwrap_err();
        assert!(matches!(err, AuthError::Forbidden));
    }

    #[tokio::test]
    async fn inactive_user_fails_active_tier_before_admin_tier() {
        let store = Arc::new(InMemoryUserStore::default());
        seed_user(&store, "root", "secret123", Role::Admin, false).await;
        let user = store
            .find_by_username("root")
            .await
            .unwrap()
            .expect("seeded");

        let err = require_admin(user).unwrap_err();
        assert!(matches!(err, AuthError::InactiveUser));
    }

    #[tokio::test]
    async fn admin_passes_both_tiers() {
        let store = Arc::new(InMemoryUserStore::default());
        seed_user(&store, "root", "secret123", Role::Admin, true).await;
        let user = store
            .find_by_username("root")
            .await
            .unwrap()
            .expect("seeded");

        let user = require_admin(user).expect("admin tier");
        assert_eq!(user.role, Role::Admin);
    }

    #[tokio::test]
    async fn registration_to_admin_rejection_scenario() {
        let store = Arc::new(InMemoryUserStore::default());
        // Registered accounts start inactive.
        seed_user(&store, "alice", "secret123", Role::User, false).await;
        let state = fake_state(store.clone());

        // Correct password, inactive account: 401 shape, not "Inactive user".
        let err = login(&state, "alice", "secret123").await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidCredentials));

        // Activated externally, login now succeeds.
        store.set_active("alice", true).await;
        let token = login(&state, "alice", "secret123").await.expect("login");

        // The admin tier still turns her away.
        let user = current_user(&state, &token.access_token).await.unwrap();
        let err = require_admin(user).unwrap_err();
        assert!(matches!(err, AuthError::Forbidden));
    }
}
