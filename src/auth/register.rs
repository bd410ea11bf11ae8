use crate::auth::{hash_password_blocking, AuthState, Credentials};
use crate::error::AuthError;
use crate::store::User;
use axum::{extract::rejection::JsonRejection, http::StatusCode, Extension, Json};
use serde_json::{json, Value};

/// Hash the password and store the new user. The plaintext never reaches
/// the store.
pub async fn sign_up(state: &AuthState, credentials: Credentials) -> Result<User, AuthError> {
    credentials.validate()?;
    let Credentials { username, password } = credentials;
    let password_hash = hash_password_blocking(password, state.hash_cost).await?;
    match state.users.insert(&username, &password_hash).await {
        Ok(user) => {
            tracing::info!("registered user {}", user.username);
            Ok(user)
        }
        Err(e) => {
            let err = AuthError::from(e);
            if matches!(err, AuthError::Conflict) {
                tracing::debug!("username {} already taken", username);
            }
            Err(err)
        }
    }
}

/// `POST /api/register`
pub async fn register(
    Extension(state): Extension<AuthState>,
    payload: Result<Json<Credentials>, JsonRejection>,
) -> Result<(StatusCode, Json<Value>), AuthError> {
    let Json(credentials) = payload.map_err(|e| {
        tracing::debug!("rejected registration body: {}", e);
        AuthError::Validation("Username and password are required.".into())
    })?;
    let user = sign_up(&state, credentials).await?;
    Ok((StatusCode::CREATED, Json(json!({ "data": user }))))
}
