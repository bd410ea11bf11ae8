use crate::store::StoreError;
use serde::Serialize;
use sqlx::sqlite::SqlitePool;

/// A registered user.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct User {
    /// Row id.
    pub id: i64,
    /// Unique login name.
    pub username: String,
    /// PHC string of the password hash. Never sent to clients.
    #[serde(skip_serializing)]
    pub password_hash: String,
}

/// Credential store backed by the `users` table.
#[derive(Clone)]
pub struct UserStore {
    pool: SqlitePool,
}

impl UserStore {
    /// Wraps an existing pool.
    pub fn new(pool: SqlitePool) -> Self {
        UserStore { pool }
    }

    /// Inserts a new user. A taken username yields
    /// [`StoreError::UniqueViolation`] and leaves the existing row alone.
    pub async fn insert(&self, username: &str, password_hash: &str) -> Result<User, StoreError> {
        let id = sqlx::query(r#"INSERT INTO users (username, password_hash) VALUES ( ?, ? )"#)
            .bind(username)
            .bind(password_hash)
            .execute(&self.pool)
            .await?
            .last_insert_rowid();
        Ok(User {
            id,
            username: username.to_string(),
            password_hash: password_hash.to_string(),
        })
    }

    /// Retrieve the user with its password hash from a username.
    pub async fn find_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>(
            r#"SELECT id, username, password_hash FROM users WHERE username=?"#,
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    /// All users, ordered by id.
    pub async fn list(&self) -> Result<Vec<User>, StoreError> {
        let users = sqlx::query_as::<_, User>(
            r#"SELECT id, username, password_hash FROM users ORDER BY id"#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(users)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory_pool;

    #[tokio::test]
    async fn should_insert_and_find_user() {
        let store = UserStore::new(memory_pool().await);
        let user = store.insert("ana", "hash-a").await.unwrap();
        assert_eq!(user.username, "ana");

        let found = store.find_by_username("ana").await.unwrap().unwrap();
        assert_eq!(found.id, user.id);
        assert_eq!(found.password_hash, "hash-a");
        assert!(store.find_by_username("bob").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn should_flag_duplicate_usernames() {
        let store = UserStore::new(memory_pool().await);
        store.insert("ana", "hash-a").await.unwrap();
        let err = store.insert("ana", "hash-b").await.unwrap_err();
        assert!(matches!(err, StoreError::UniqueViolation));

        let found = store.find_by_username("ana").await.unwrap().unwrap();
        assert_eq!(found.password_hash, "hash-a");
    }

    #[tokio::test]
    async fn should_list_users_in_insertion_order() {
        let store = UserStore::new(memory_pool().await);
        store.insert("ana", "h1").await.unwrap();
        store.insert("bob", "h2").await.unwrap();
        let names: Vec<String> = store
            .list()
            .await
            .unwrap()
            .into_iter()
            .map(|u| u.username)
            .collect();
        assert_eq!(names, vec!["ana", "bob"]);
    }

    #[test]
    fn should_not_serialize_password_hash() {
        let user = User {
            id: 1,
            username: "ana".into(),
            password_hash: "secret".into(),
        };
        let json = serde_json::to_value(&user).unwrap();
        assert_eq!(json, serde_json::json!({"id": 1, "username": "ana"}));
    }
}
