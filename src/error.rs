use crate::auth::HashError;
use crate::store::StoreError;
use axum::{
    http::{header::InvalidHeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

const INTERNAL_ERROR: &str = "Internal server error";

/// Everything an auth endpoint or the session gate can fail with.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Missing or malformed input.
    #[error("{0}")]
    Validation(String),
    /// The username is already registered.
    #[error("That username is already in use.")]
    Conflict,
    /// Unknown user or wrong password. Never tells which.
    #[error("Invalid credentials, please try again")]
    InvalidCredentials,
    /// No valid session on a protected route.
    #[error("Please sign-in to view this information.")]
    Unauthenticated,
    /// Credential store failure.
    #[error("storage error: {0}")]
    Storage(StoreError),
    /// Session store failure while checking a request.
    #[error("session store error: {0}")]
    Session(StoreError),
    /// Password hashing failure.
    #[error(transparent)]
    Hash(#[from] HashError),
    /// The session cookie could not be turned into a header.
    #[error("invalid session cookie header: {0}")]
    Cookie(#[from] InvalidHeaderValue),
    /// Session store failure while logging out.
    #[error("Error logging out, please try again.")]
    Logout(StoreError),
}

impl From<StoreError> for AuthError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::UniqueViolation => AuthError::Conflict,
            err => AuthError::Storage(err),
        }
    }
}

impl AuthError {
    /// HTTP status for this error.
    pub fn status(&self) -> StatusCode {
        match self {
            AuthError::Validation(_) => StatusCode::BAD_REQUEST,
            AuthError::Conflict => StatusCode::CONFLICT,
            AuthError::InvalidCredentials | AuthError::Unauthenticated => StatusCode::UNAUTHORIZED,
            AuthError::Storage(_)
            | AuthError::Session(_)
            | AuthError::Hash(_)
            | AuthError::Cookie(_)
            | AuthError::Logout(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let body = match &self {
            AuthError::Storage(_)
            | AuthError::Session(_)
            | AuthError::Hash(_)
            | AuthError::Cookie(_) => {
                tracing::error!("{}", self);
                json!({ "error": INTERNAL_ERROR })
            }
            AuthError::Logout(e) => {
                tracing::error!("logout failed: {}", e);
                json!({ "message": self.to_string() })
            }
            _ => json!({ "message": self.to_string() }),
        };
        (self.status(), Json(body)).into_response()
    }
}
