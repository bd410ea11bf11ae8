use crate::{
    auth::{AuthState, CurrentUser},
    error::AuthError,
};
use axum::{
    http::Request,
    middleware::Next,
    response::{IntoResponse, Response},
};

/// Session gate for protected routes.
///
/// A request goes through only with a correctly signed cookie naming a
/// logged-in session that has not expired. Anything else is answered with
/// a 401 and the next handler never runs. The session itself is left
/// untouched.
pub async fn auth<B>(
    mut req: Request<B>,
    next: Next<B>,
    state: AuthState,
) -> Result<Response, AuthError> {
    let session_id = match state.cookie.session_id_from(req.headers()) {
        Some(id) => id,
        None => {
            tracing::debug!("unauthorized request to {}", req.uri());
            return Err(AuthError::Unauthenticated);
        }
    };

    let session = state
        .sessions
        .find_active(&session_id)
        .await
        .map_err(AuthError::Session)?;

    match session {
        Some(session) if session.logged_in => {
            req.extensions_mut().insert(CurrentUser {
                username: session.username,
                session_id: session.id,
            });
            Ok(next.run(req).await.into_response())
        }
        _ => {
            tracing::debug!("no live session for request to {}", req.uri());
            Err(AuthError::Unauthenticated)
        }
    }
}
