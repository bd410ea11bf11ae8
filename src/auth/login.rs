use crate::{
    auth::{get_cookie_map, verify_password_blocking, AuthState, Credentials},
    error::AuthError,
    store::Session,
};
use axum::{
    extract::rejection::JsonRejection,
    http::{
        header::{self, HeaderMap},
        StatusCode,
    },
    response::{IntoResponse, Response},
    Extension, Json,
};
use serde_json::{json, Value};

/// Check the credentials and open a new session. An unknown username and a
/// wrong password both end in [`AuthError::InvalidCredentials`].
///
/// `previous` is the session the client already holds, if any. It is
/// destroyed so a login always hands out a fresh id.
pub async fn log_in(
    state: &AuthState,
    credentials: Credentials,
    previous: Option<String>,
) -> Result<Session, AuthError> {
    credentials.validate()?;
    let Credentials { username, password } = credentials;
    let user = state
        .users
        .find_by_username(&username)
        .await
        .map_err(AuthError::Storage)?;
    let verified = match user {
        Some(user) => verify_password_blocking(password, user.password_hash).await?,
        None => {
            let dummy = state.unknown_user_hash().await?.to_string();
            verify_password_blocking(password, dummy).await?;
            false
        }
    };
    if !verified {
        tracing::debug!("failed login attempt");
        return Err(AuthError::InvalidCredentials);
    }

    if let Some(previous) = previous {
        state
            .sessions
            .destroy(&previous)
            .await
            .map_err(AuthError::Storage)?;
    }
    let session = state
        .sessions
        .create(&username, state.cookie.max_age)
        .await
        .map_err(AuthError::Storage)?;
    tracing::info!("user {} logged in", username);
    Ok(session)
}

/// Destroy the given session. Returns whether there was one to destroy.
pub async fn log_out(state: &AuthState, session_id: Option<String>) -> Result<bool, AuthError> {
    match session_id {
        Some(id) => state.sessions.destroy(&id).await.map_err(AuthError::Logout),
        None => Ok(false),
    }
}

/// `POST /api/login`
pub async fn login(
    Extension(state): Extension<AuthState>,
    headers: HeaderMap,
    payload: Result<Json<Credentials>, JsonRejection>,
) -> Result<(StatusCode, HeaderMap, Json<Value>), AuthError> {
    let Json(credentials) = payload.map_err(|e| {
        tracing::debug!("rejected login body: {}", e);
        AuthError::Validation("Username and password are required.".into())
    })?;
    let previous = state.cookie.session_id_from(&headers);
    let session = log_in(&state, credentials, previous).await?;

    let mut response_headers = HeaderMap::new();
    response_headers.insert(header::SET_COOKIE, state.cookie.set_cookie(&session.id)?);
    Ok((
        StatusCode::OK,
        response_headers,
        Json(json!({ "message": "Welcome!" })),
    ))
}

/// `GET /api/logout`
pub async fn logout(
    Extension(state): Extension<AuthState>,
    headers: HeaderMap,
) -> Result<Response, AuthError> {
    let presented = get_cookie_map(&headers).contains_key(&state.cookie.name);
    let destroyed = log_out(&state, state.cookie.session_id_from(&headers)).await?;

    let mut response_headers = HeaderMap::new();
    if presented {
        response_headers.insert(header::SET_COOKIE, state.cookie.clear_cookie()?);
    }
    if destroyed {
        Ok((StatusCode::NO_CONTENT, response_headers).into_response())
    } else {
        Ok((
            StatusCode::OK,
            response_headers,
            Json(json!({ "message": "Already logged out." })),
        )
            .into_response())
    }
}
