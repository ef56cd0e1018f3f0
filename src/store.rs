use std::str::FromStr;

use chrono::Utc;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};

use crate::entities::{Todo, TodoUpdate, User};

/// Persistence operations the issuer and guard depend on.
#[async_trait::async_trait]
pub trait CredentialStore: Send + Sync {
    async fn find_user_by_username(&self, username: &str) -> sqlx::Result<Option<User>>;

    async fn find_user_by_id(&self, id: i64) -> sqlx::Result<Option<User>>;

    async fn create_user(&self, username: &str, password_hash: &str) -> sqlx::Result<User>;

    /// Overwrites the stored session token; `None` clears it.
    /// Fails with `RowNotFound` if no such user exists.
    async fn update_user_token(&self, id: i64, token: Option<&str>) -> sqlx::Result<()>;
}

#[derive(Debug, Clone)]
pub struct SqliteStore {
    pub sqlite_pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(sqlite_pool: SqlitePool) -> Self {
        Self { sqlite_pool }
    }

    /// Opens the pool and applies the embedded migrations.
    ///
    /// Connections never expire so that `sqlite::memory:` databases survive
    /// for the lifetime of the pool.
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self, StoreSetupError> {
        let options = SqliteConnectOptions::from_str(url)?
            .create_if_missing(true)
            .foreign_keys(true);

        let sqlite_pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        sqlx::migrate!().run(&sqlite_pool).await?;
        tracing::info!(url, "database ready");

        Ok(Self::new(sqlite_pool))
    }

    pub async fn create_todo(&self, user_id: i64, text: &str, completed: bool) -> sqlx::Result<Todo> {
        let now = Utc::now();
        sqlx::query_as(
            "INSERT INTO todos (user_id, text, completed, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?) RETURNING *",
        )
        .bind(user_id)
        .bind(text)
        .bind(completed)
        .bind(now)
        .bind(now)
        .fetch_one(&self.sqlite_pool)
        .await
    }

    pub async fn list_todos(&self, user_id: i64) -> sqlx::Result<Vec<Todo>> {
        sqlx::query_as("SELECT * FROM todos WHERE user_id = ? ORDER BY id")
            .bind(user_id)
            .fetch_all(&self.sqlite_pool)
            .await
    }

    /// Applies the fields present in `update`. Returns `None` if the item does
    /// not exist or belongs to someone else.
    pub async fn update_todo(
        &self,
        id: i64,
        user_id: i64,
        update: &TodoUpdate,
    ) -> sqlx::Result<Option<Todo>> {
        sqlx::query_as(
            "UPDATE todos
             SET text = COALESCE(?, text), completed = COALESCE(?, completed), updated_at = ?
             WHERE id = ? AND user_id = ?
             RETURNING *",
        )
        .bind(update.text.as_deref())
        .bind(update.completed)
        .bind(Utc::now())
        .bind(id)
        .bind(user_id)
        .fetch_optional(&self.sqlite_pool)
        .await
    }

    pub async fn delete_todo(&self, id: i64, user_id: i64) -> sqlx::Result<bool> {
        let result = sqlx::query("DELETE FROM todos WHERE id = ? AND user_id = ?")
            .bind(id)
            .bind(user_id)
            .execute(&self.sqlite_pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[async_trait::async_trait]
impl CredentialStore for SqliteStore {
    async fn find_user_by_username(&self, username: &str) -> sqlx::Result<Option<User>> {
        sqlx::query_as("SELECT * FROM users WHERE username = ?")
            .bind(username)
            .fetch_optional(&self.sqlite_pool)
            .await
    }

    async fn find_user_by_id(&self, id: i64) -> sqlx::Result<Option<User>> {
        sqlx::query_as("SELECT * FROM users WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.sqlite_pool)
            .await
    }

    async fn create_user(&self, username: &str, password_hash: &str) -> sqlx::Result<User> {
        sqlx::query_as("INSERT INTO users (username, password_hash) VALUES (?, ?) RETURNING *")
            .bind(username)
            .bind(password_hash)
            .fetch_one(&self.sqlite_pool)
            .await
    }

    async fn update_user_token(&self, id: i64, token: Option<&str>) -> sqlx::Result<()> {
        let result = sqlx::query("UPDATE users SET token = ? WHERE id = ?")
            .bind(token)
            .bind(id)
            .execute(&self.sqlite_pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(sqlx::Error::RowNotFound);
        }
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StoreSetupError {
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),

    #[error(transparent)]
    Migrate(#[from] sqlx::migrate::MigrateError),
}

pub fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}

#[cfg(test)]
pub(crate) mod memory {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use super::CredentialStore;
    use crate::entities::User;

    /// In-process store for unit tests of the issuer and guard.
    #[derive(Default)]
    pub struct MemoryStore {
        users: Mutex<HashMap<i64, User>>,
    }

    impl MemoryStore {
        pub fn stored_token(&self, id: i64) -> Option<String> {
            self.users.lock().unwrap().get(&id).and_then(|u| u.token.clone())
        }
    }

    #[async_trait::async_trait]
    impl CredentialStore for MemoryStore {
        async fn find_user_by_username(&self, username: &str) -> sqlx::Result<Option<User>> {
            let users = self.users.lock().unwrap();
            Ok(users.values().find(|u| u.username == username).cloned())
        }

        async fn find_user_by_id(&self, id: i64) -> sqlx::Result<Option<User>> {
            Ok(self.users.lock().unwrap().get(&id).cloned())
        }

        async fn create_user(&self, username: &str, password_hash: &str) -> sqlx::Result<User> {
            let mut users = self.users.lock().unwrap();
            let user = User {
                id: users.len() as i64 + 1,
                username: username.to_string(),
                password_hash: password_hash.to_string(),
                token: None,
            };
            users.insert(user.id, user.clone());
            Ok(user)
        }

        async fn update_user_token(&self, id: i64, token: Option<&str>) -> sqlx::Result<()> {
            let mut users = self.users.lock().unwrap();
            let user = users.get_mut(&id).ok_or(sqlx::Error::RowNotFound)?;
            user.token = token.map(str::to_string);
            Ok(())
        }
    }
}
