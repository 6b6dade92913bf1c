//! Local user store
//!
//! Abstracts database operations for testability using trait-based dependency injection.
//! Every write is a single statement keyed by local id or email, so each one is atomic
//! without cross-record transactions.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::SqlitePool;

use crate::error::{Error, Result};
use crate::models::{NewUser, SyncedUser, User};

/// User store trait - abstracts database operations for testability
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Insert a new unsynced (queued) user
    async fn insert(&self, user: NewUser) -> Result<User>;

    /// Find user by local ID
    async fn find_by_id(&self, id: &str) -> Result<Option<User>>;

    /// Find user by email
    async fn find_by_email(&self, email: &str) -> Result<Option<User>>;

    /// All users still waiting for remote confirmation
    async fn list_unsynced(&self) -> Result<Vec<User>>;

    /// All users, oldest first
    async fn list_all(&self) -> Result<Vec<User>>;

    async fn count_unsynced(&self) -> Result<i64>;

    /// Replace the details of a queued registration. No-op on synced rows.
    async fn update_pending(
        &self,
        id: &str,
        name: &str,
        password_hash: &str,
        sealed_password: &str,
    ) -> Result<()>;

    /// Insert or update a user confirmed by the backend (keyed by email)
    async fn upsert_synced(&self, user: SyncedUser) -> Result<User>;

    /// Flip a queued row to synced, clearing its sealed password.
    /// Returns false when the row was already synced or is gone.
    async fn mark_synced(&self, id: &str, server_id: &str) -> Result<bool>;

    /// Remember why the last sync attempt for a row failed
    async fn record_sync_failure(&self, id: &str, error: &str) -> Result<()>;
}

/// SQLite implementation of UserStore
#[derive(Clone)]
pub struct SqliteUserStore {
    pool: SqlitePool,
}

impl SqliteUserStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserStore for SqliteUserStore {
    async fn insert(&self, user: NewUser) -> Result<User> {
        let now = Utc::now();

        sqlx::query(
            r#"
            INSERT INTO users (id, email, name, password_hash, sealed_password, is_synced, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, 0, ?, ?)
            "#,
        )
        .bind(&user.id)
        .bind(&user.email)
        .bind(&user.name)
        .bind(&user.password_hash)
        .bind(&user.sealed_password)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;

        self.find_by_id(&user.id)
            .await?
            .ok_or_else(|| Error::internal("Failed to fetch created user"))
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<User>> {
        Ok(sqlx::query_as("SELECT * FROM users WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        Ok(sqlx::query_as("SELECT * FROM users WHERE email = ?")
            .bind(email)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn list_unsynced(&self) -> Result<Vec<User>> {
        Ok(
            sqlx::query_as("SELECT * FROM users WHERE is_synced = 0 ORDER BY created_at")
                .fetch_all(&self.pool)
                .await?,
        )
    }

    async fn list_all(&self) -> Result<Vec<User>> {
        Ok(sqlx::query_as("SELECT * FROM users ORDER BY created_at")
            .fetch_all(&self.pool)
            .await?)
    }

    async fn count_unsynced(&self) -> Result<i64> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users WHERE is_synced = 0")
            .fetch_one(&self.pool)
            .await?;
        Ok(count.0)
    }

    async fn update_pending(
        &self,
        id: &str,
        name: &str,
        password_hash: &str,
        sealed_password: &str,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE users
            SET name = ?, password_hash = ?, sealed_password = ?, last_sync_error = NULL, updated_at = ?
            WHERE id = ? AND is_synced = 0
            "#,
        )
        .bind(name)
        .bind(password_hash)
        .bind(sealed_password)
        .bind(Utc::now())
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn upsert_synced(&self, user: SyncedUser) -> Result<User> {
        let now = Utc::now();

        sqlx::query(
            r#"
            INSERT INTO users (id, server_id, email, name, password_hash, sealed_password, is_synced, last_sync_at, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, NULL, 1, ?, ?, ?)
            ON CONFLICT(email) DO UPDATE SET
                server_id = excluded.server_id,
                name = CASE WHEN excluded.name = '' THEN users.name ELSE excluded.name END,
                password_hash = excluded.password_hash,
                sealed_password = NULL,
                is_synced = 1,
                last_sync_error = NULL,
                last_sync_at = excluded.last_sync_at,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(uuid::Uuid::new_v4().to_string())
        .bind(&user.server_id)
        .bind(&user.email)
        .bind(&user.name)
        .bind(&user.password_hash)
        .bind(now)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;

        self.find_by_email(&user.email)
            .await?
            .ok_or_else(|| Error::internal("Failed to fetch upserted user"))
    }

    async fn mark_synced(&self, id: &str, server_id: &str) -> Result<bool> {
        let now = Utc::now();
        let result = sqlx::query(
            r#"
            UPDATE users
            SET is_synced = 1,
                server_id = ?,
                sealed_password = NULL,
                last_sync_error = NULL,
                sync_attempts = sync_attempts + 1,
                last_sync_at = ?,
                updated_at = ?
            WHERE id = ? AND is_synced = 0
            "#,
        )
        .bind(server_id)
        .bind(now)
        .bind(now)
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn record_sync_failure(&self, id: &str, error: &str) -> Result<()> {
        let now = Utc::now();
        sqlx::query(
            r#"
            UPDATE users
            SET sync_attempts = sync_attempts + 1, last_sync_error = ?, last_sync_at = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(error)
        .bind(now)
        .bind(now)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
