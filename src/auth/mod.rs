//! Module containing all the authentication, registration, cookies, etc. logic.

mod cookie;
mod login;
mod middleware;
mod password;
mod register;

pub use cookie::{get_cookie_map, CookieConfig};
pub use login::{log_in, log_out, login, logout};
pub use middleware::auth as auth_middleware;
pub use password::{
    hash_password, hash_password_blocking, verify_password, verify_password_blocking, HashError,
    MAX_HASH_COST, MIN_HASH_COST,
};
pub use register::{register, sign_up};

use crate::error::AuthError;
use crate::store::{new_session_id, SessionStore, UserStore};
use serde::Deserialize;
use sqlx::SqlitePool;
use std::sync::Arc;
use tokio::sync::OnceCell;

/// Longest accepted username.
pub const MAX_USERNAME_LEN: usize = 64;
/// Longest accepted password, in bytes.
pub const MAX_PASSWORD_LEN: usize = 1024;

/// A structure representing the user currently logged in.
#[derive(Clone, Debug)]
pub struct CurrentUser {
    /// The user's login name.
    pub username: String,
    /// Id of the session that authenticated the request.
    pub session_id: String,
}

/// Everything the auth handlers and the session gate need, shared by all
/// requests. Only holds pool handles and immutable config.
#[derive(Clone)]
pub struct AuthState {
    /// Credential store.
    pub users: UserStore,
    /// Session store.
    pub sessions: SessionStore,
    /// Session cookie settings.
    pub cookie: CookieConfig,
    /// Argon2 time cost for new hashes.
    pub hash_cost: u32,
    /// Hash checked when the username is unknown, so both failed login
    /// paths pay for one Argon2 verification.
    dummy_hash: Arc<OnceCell<String>>,
}

impl AuthState {
    /// Builds the state over a single database pool.
    pub fn new(pool: &SqlitePool, cookie: CookieConfig, hash_cost: u32) -> Self {
        AuthState {
            users: UserStore::new(pool.clone()),
            sessions: SessionStore::new(pool.clone()),
            cookie,
            hash_cost,
            dummy_hash: Arc::new(OnceCell::new()),
        }
    }

    async fn unknown_user_hash(&self) -> Result<&str, HashError> {
        let hash = self
            .dummy_hash
            .get_or_try_init(|| hash_password_blocking(new_session_id(), self.hash_cost))
            .await?;
        Ok(hash.as_str())
    }
}

/// Username and password, as posted to `/api/register` and `/api/login`.
#[derive(Deserialize)]
pub struct Credentials {
    /// Login name.
    pub username: String,
    /// Plaintext password.
    pub password: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

impl Credentials {
    /// Convenience constructor.
    pub fn new(username: &str, password: &str) -> Credentials {
        Credentials {
            username: username.to_string(),
            password: password.to_string(),
        }
    }

    /// Both fields must be present and not too long. The username must
    /// also carry no surrounding whitespace.
    pub fn validate(&self) -> Result<(), AuthError> {
        if self.username.is_empty() || self.password.is_empty() {
            return Err(AuthError::Validation(
                "Username and password are required.".into(),
            ));
        }
        if self.username.trim() != self.username {
            return Err(AuthError::Validation(
                "Username cannot start or end with whitespace.".into(),
            ));
        }
        if self.username.chars().count() > MAX_USERNAME_LEN {
            return Err(AuthError::Validation(format!(
                "Username cannot be longer than {} characters.",
                MAX_USERNAME_LEN
            )));
        }
        if self.password.len() > MAX_PASSWORD_LEN {
            return Err(AuthError::Validation(format!(
                "Password cannot be longer than {} bytes.",
                MAX_PASSWORD_LEN
            )));
        }
        Ok(())
    }
}
