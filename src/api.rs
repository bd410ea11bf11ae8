use crate::auth::{AuthState, CurrentUser};
use crate::error::AuthError;
use axum::{http::StatusCode, Extension, Json};
use serde_json::{json, Value};

/// `GET /api/users`: every registered user, without password hashes.
pub async fn list_users(
    Extension(state): Extension<AuthState>,
) -> Result<(StatusCode, Json<Value>), AuthError> {
    let users = state.users.list().await.map_err(AuthError::Storage)?;
    Ok((StatusCode::OK, Json(json!({ "data": users }))))
}

/// `GET /api/users/me`: the user behind the current session.
pub async fn current_user(Extension(user): Extension<CurrentUser>) -> Json<Value> {
    Json(json!({ "data": { "username": user.username } }))
}
