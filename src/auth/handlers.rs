use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Form, Json, Router,
};
use lazy_static::lazy_static;
use regex::Regex;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::{
    auth::{
        dto::{LoginForm, PublicUser, RegisterRequest, TokenResponse},
        errors::AuthError,
        extractors::{ActiveUser, AdminUser},
        password::hash_password,
        repo::UserStoreError,
        repo_types::{NewUser, Role},
        services,
    },
    state::AppState,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        // Earlier clients still post the password grant here.
        .route("/token", post(login))
}

pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/me", get(get_me))
        .route("/users", get(list_users))
}

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

fn validate_registration(payload: &RegisterRequest) -> Result<(), AuthError> {
    if payload.username.is_empty() || payload.username.len() > 20 {
        return Err(AuthError::Validation(
            "Username must be 1 to 20 characters".into(),
        ));
    }
    if !is_valid_email(&payload.email) {
        return Err(AuthError::Validation("Invalid email".into()));
    }
    if payload.password.len() < 8 {
        return Err(AuthError::Validation("Password too short".into()));
    }
    Ok(())
}

#[instrument(skip(state, payload))]
async fn register(
    State(state): State<AppState>,
    Json(mut payload): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<PublicUser>), AuthError> {
    payload.username = payload.username.trim().to_string();
    payload.email = payload.email.trim().to_lowercase();
    validate_registration(&payload)?;

    let password_hash = hash_password(&payload.password).map_err(AuthError::Internal)?;
    let user = state
        .users
        .insert(NewUser {
            id: Uuid::new_v4(),
            username: payload.username,
            email: payload.email,
            password_hash,
            role: Role::User,
            // Accounts start disabled; activation happens out of band.
            is_active: false,
        })
        .await
        .map_err(|e| match e {
            UserStoreError::DuplicateUser => {
                warn!("registration with taken username or email");
                AuthError::Conflict
            }
            UserStoreError::Other(e) => AuthError::Internal(e),
        })?;

    info!(user_id = %user.id, username = %user.username, "user registered");
    Ok((StatusCode::CREATED, Json(user.into())))
}

#[instrument(skip(state, form))]
async fn login(
    State(state): State<AppState>,
    Form(form): Form<LoginForm>,
) -> Result<(StatusCode, Json<TokenResponse>), AuthError> {
    let token = services::login(&state, &form.username, &form.password).await?;
    info!(username = %form.username, "user logged in");
    Ok((StatusCode::CREATED, Json(token)))
}

#[instrument(skip_all)]
async fn get_me(ActiveUser(user): ActiveUser) -> Json<PublicUser> {
    Json(user.into())
}

#[instrument(skip_all)]
async fn list_users(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
) -> Result<Json<Vec<PublicUser>>, AuthError> {
    let users = state.users.list_all().await.map_err(AuthError::Internal)?;
    Ok(Json(users.into_iter().map(PublicUser::from).collect()))
}
