use async_trait::async_trait;
use chrono::Utc;
use sqlx::sqlite::SqlitePool;
use tokio::sync::OnceCell;
use tracing::warn;

use super::{expires_at, AuthzBackend};
use crate::configuration::SqliteBackendConfig;
use crate::server::error::Error;

/// SQLite backend. User records live in a `users` table, issued session
/// tokens in a `tokens` table with an absolute expiry timestamp, so tokens
/// survive server restarts.
///
/// The pool connects lazily and the schema is ensured on first use; module
/// creation stays synchronous.
pub struct SqliteBackend {
    pool: SqlitePool,
    schema: OnceCell<()>,
}

impl SqliteBackend {
    pub fn open(config: &SqliteBackendConfig) -> Result<Self, Error> {
        let url = format!("sqlite://{}?mode=rwc", config.path.display());
        let pool = SqlitePool::connect_lazy(&url).map_err(|e| {
            Error::Initialization(format!(
                "cannot open user database {}: {e}",
                config.path.display()
            ))
        })?;

        Ok(Self {
            pool,
            schema: OnceCell::new(),
        })
    }

    async fn ensure_schema(&self) -> Result<(), sqlx::Error> {
        self.schema
            .get_or_try_init(|| async {
                sqlx::query(
                    "CREATE TABLE IF NOT EXISTS users (
                         name TEXT PRIMARY KEY,
                         passwd TEXT NOT NULL,
                         group_name TEXT,
                         home TEXT
                     )",
                )
                .execute(&self.pool)
                .await?;

                sqlx::query(
                    "CREATE TABLE IF NOT EXISTS tokens (
                         token TEXT PRIMARY KEY,
                         user_name TEXT NOT NULL,
                         expires_at INTEGER
                     )",
                )
                .execute(&self.pool)
                .await?;

                Ok(())
            })
            .await
            .map(|_| ())
    }

    async fn user_column(&self, column: &str, user: &str) -> Option<String> {
        if let Err(e) = self.ensure_schema().await {
            warn!("user database unavailable: {e}");
            return None;
        }

        let query = format!("SELECT {column} FROM users WHERE name = ?");
        match sqlx::query_scalar::<_, Option<String>>(&query)
            .bind(user)
            .fetch_optional(&self.pool)
            .await
        {
            Ok(value) => value.flatten(),
            Err(e) => {
                warn!("user lookup failed: {e}");
                None
            }
        }
    }
}

#[async_trait]
impl AuthzBackend for SqliteBackend {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    async fn user_secret(&self, user: &str) -> Option<String> {
        self.user_column("passwd", user).await
    }

    async fn group(&self, user: &str) -> Option<String> {
        self.user_column("group_name", user).await
    }

    async fn home(&self, user: &str) -> Option<String> {
        self.user_column("home", user).await
    }

    fn supports_join(&self) -> bool {
        true
    }

    async fn join(&self, user: &str, token: &str, expire_secs: u64) -> Result<(), Error> {
        self.ensure_schema()
            .await
            .map_err(|e| Error::Execution(format!("user database unavailable: {e}")))?;

        let expires_at = expires_at(expire_secs).map(|t| t.timestamp());
        sqlx::query("INSERT OR REPLACE INTO tokens (token, user_name, expires_at) VALUES (?, ?, ?)")
            .bind(token)
            .bind(user)
            .bind(expires_at)
            .execute(&self.pool)
            .await
            .map_err(|e| Error::Execution(format!("cannot store session token: {e}")))?;

        Ok(())
    }

    async fn check_token(&self, token: &str) -> Option<String> {
        if let Err(e) = self.ensure_schema().await {
            warn!("user database unavailable: {e}");
            return None;
        }

        let row = sqlx::query_as::<_, (String, Option<i64>)>(
            "SELECT user_name, expires_at FROM tokens WHERE token = ?",
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await;

        let (user, expires_at) = match row {
            Ok(Some(row)) => row,
            Ok(None) => return None,
            Err(e) => {
                warn!("token lookup failed: {e}");
                return None;
            }
        };

        if let Some(expires_at) = expires_at {
            if expires_at < Utc::now().timestamp() {
                let _ = sqlx::query("DELETE FROM tokens WHERE token = ?")
                    .bind(token)
                    .execute(&self.pool)
                    .await;
                return None;
            }
        }

        Some(user)
    }
}
