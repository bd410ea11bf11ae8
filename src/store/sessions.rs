use crate::store::StoreError;
use rand::Rng;
use sqlx::sqlite::SqlitePool;
use std::time::Duration;
use time::OffsetDateTime;
use tokio::task::JoinHandle;

/// Length of the random session identifier.
pub const SESSION_ID_LEN: usize = 64;

/// A server-side session record.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct Session {
    /// Opaque identifier, also carried by the client cookie.
    #[sqlx(rename = "sid")]
    pub id: String,
    /// Set once the credentials were checked.
    pub logged_in: bool,
    /// The user the session belongs to.
    pub username: String,
    /// Unix timestamp (seconds) after which the session is dead.
    #[sqlx(rename = "expires")]
    pub expires_at: i64,
}

/// Create a random session id with alphanumeric characters.
pub fn new_session_id() -> String {
    let mut rng = rand::thread_rng();
    (&mut rng)
        .sample_iter(rand::distributions::Alphanumeric)
        .take(SESSION_ID_LEN)
        .map(char::from)
        .collect()
}

fn now() -> i64 {
    OffsetDateTime::now_utc().unix_timestamp()
}

/// Session store backed by the `sessions` table.
#[derive(Clone)]
pub struct SessionStore {
    pool: SqlitePool,
}

impl SessionStore {
    /// Wraps an existing pool.
    pub fn new(pool: SqlitePool) -> Self {
        SessionStore { pool }
    }

    /// Writes a fresh logged-in session for `username`, valid for `max_age`
    /// from now.
    pub async fn create(&self, username: &str, max_age: Duration) -> Result<Session, StoreError> {
        let max_age = i64::try_from(max_age.as_secs()).unwrap_or(i64::MAX);
        let session = Session {
            id: new_session_id(),
            logged_in: true,
            username: username.to_string(),
            expires_at: now().saturating_add(max_age),
        };
        sqlx::query(
            r#"INSERT INTO sessions (sid, logged_in, username, expires) VALUES ( ?, ?, ?, ? )"#,
        )
        .bind(&session.id)
        .bind(session.logged_in)
        .bind(&session.username)
        .bind(session.expires_at)
        .execute(&self.pool)
        .await?;
        Ok(session)
    }

    /// Fetches a session that has not expired yet.
    pub async fn find_active(&self, id: &str) -> Result<Option<Session>, StoreError> {
        self.find_active_at(id, now()).await
    }

    /// Same as [`SessionStore::find_active`] with an explicit clock.
    pub async fn find_active_at(&self, id: &str, now: i64) -> Result<Option<Session>, StoreError> {
        let session = sqlx::query_as::<_, Session>(
            r#"SELECT sid, logged_in, username, expires FROM sessions
               WHERE sid=? AND expires > ?"#,
        )
        .bind(id)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;
        Ok(session)
    }

    /// Deletes a session. Returns whether a row was removed.
    pub async fn destroy(&self, id: &str) -> Result<bool, StoreError> {
        let result = sqlx::query(r#"DELETE FROM sessions WHERE sid=?"#)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Removes every session expired at `now`. Returns the number removed.
    pub async fn sweep_expired_at(&self, now: i64) -> Result<u64, StoreError> {
        let result = sqlx::query(r#"DELETE FROM sessions WHERE expires <= ?"#)
            .bind(now)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    /// Starts the background task clearing expired sessions every `every`.
    pub fn spawn_sweeper(&self, every: Duration) -> JoinHandle<()> {
        let store = self.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);
            loop {
                interval.tick().await;
                match store.sweep_expired_at(now()).await {
                    Ok(0) => {}
                    Ok(removed) => tracing::debug!("swept {} expired sessions", removed),
                    Err(e) => tracing::warn!("session sweep failed: {}", e),
                }
            }
        })
    }
}
