use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::error;

/// Every failure crossing the auth boundary is one of these; lower-level
/// errors (jsonwebtoken, argon2, sqlx) never surface raw.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Not authenticated")]
    MissingCredentials,

    #[error("Could not validate credentials")]
    InvalidToken,

    #[error("Incorrect username or password or disabled user")]
    InvalidCredentials,

    #[error("Inactive user")]
    InactiveUser,

    #[error("You do not have permission for this action")]
    Forbidden,

    #[error("{0}")]
    Validation(String),

    #[error("User with that credentials already exists")]
    Conflict,

    #[error("Something was wrong")]
    Internal(anyhow::Error),
}

impl AuthError {
    fn status(&self) -> StatusCode {
        match self {
            AuthError::MissingCredentials
            | AuthError::InvalidToken
            | AuthError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            AuthError::InactiveUser | AuthError::Forbidden | AuthError::Conflict => {
                StatusCode::BAD_REQUEST
            }
            AuthError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AuthError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        if let AuthError::Internal(ref e) = self {
            // Full detail stays server-side; the client gets a generic 500.
            error!(error = ?e, "internal error in auth flow");
        }
        let status = self.status();
        let body = Json(json!({ "detail": self.to_string() }));
        let mut response = (status, body).into_response();
        if status == StatusCode::UNAUTHORIZED {
            response
                .headers_mut()
                .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
        }
        response
    }
}
