//! Persistence for users and sessions, both living in the same SQLite
//! database.

mod sessions;
mod users;

pub use sessions::{new_session_id, Session, SessionStore, SESSION_ID_LEN};
pub use users::{User, UserStore};

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;
use thiserror::Error;

/// SQLite extended result codes for `UNIQUE` and `PRIMARY KEY` violations.
const SQLITE_CONSTRAINT_UNIQUE: &str = "2067";
const SQLITE_CONSTRAINT_PRIMARYKEY: &str = "1555";

/// Errors returned by the stores.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A row with the same unique key already exists.
    #[error("unique constraint violated")]
    UniqueViolation,
    /// Any other database failure.
    #[error("database error: {0}")]
    Database(sqlx::Error),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        let unique = match &err {
            sqlx::Error::Database(db_err) => db_err.code().map_or(false, |code| {
                code == SQLITE_CONSTRAINT_UNIQUE || code == SQLITE_CONSTRAINT_PRIMARYKEY
            }),
            _ => false,
        };
        if unique {
            StoreError::UniqueViolation
        } else {
            StoreError::Database(err)
        }
    }
}

/// Opens the pool, creating the database file if needed, and applies the
/// embedded migrations.
pub async fn connect(url: &str, max_connections: u32) -> Result<SqlitePool, sqlx::Error> {
    let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(max_connections)
        .connect_with(options)
        .await?;
    sqlx::migrate!("database/migrations").run(&pool).await?;
    Ok(pool)
}

/// A migrated in-memory database. A single connection that never expires
/// keeps the data alive for the pool's lifetime.
#[cfg(test)]
pub async fn memory_pool() -> SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    sqlx::migrate!("database/migrations")
        .run(&pool)
        .await
        .unwrap();
    pool
}
