//! Database module - SQLx with SQLite

use crate::error::{Error, Result};
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use std::path::PathBuf;

/// Database state
#[derive(Clone)]
pub struct Database {
    pub pool: SqlitePool,
}

impl Database {
    /// Create a new database connection with a specific path
    pub async fn open(db_path: PathBuf) -> Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let db_url = format!("sqlite:{}?mode=rwc", db_path.display());
        log::info!("Connecting to database: {}", db_path.display());

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(&db_url)
            .await?;

        let db = Self { pool };
        db.run_migrations().await?;

        Ok(db)
    }

    /// Run database migrations
    async fn run_migrations(&self) -> Result<()> {
        log::info!("Running database migrations...");

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS users (
                id TEXT PRIMARY KEY,
                server_id TEXT,
                email TEXT UNIQUE NOT NULL,
                name TEXT NOT NULL,
                password_hash TEXT NOT NULL,
                sealed_password TEXT,
                is_synced BOOLEAN NOT NULL DEFAULT 0,
                created_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP,
                updated_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        // Sync bookkeeping columns
        sqlx::query("ALTER TABLE users ADD COLUMN sync_attempts INTEGER NOT NULL DEFAULT 0")
            .execute(&self.pool)
            .await
            .ok(); // Ignore error if column already exists
        sqlx::query("ALTER TABLE users ADD COLUMN last_sync_error TEXT")
            .execute(&self.pool)
            .await
            .ok();
        sqlx::query("ALTER TABLE users ADD COLUMN last_sync_at DATETIME")
            .execute(&self.pool)
            .await
            .ok();

        // The sync task scans by this flag on every run
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_users_is_synced ON users(is_synced)")
            .execute(&self.pool)
            .await?;

        sqlx::query(
            "CREATE UNIQUE INDEX IF NOT EXISTS idx_users_server_id ON users(server_id) WHERE server_id IS NOT NULL",
        )
        .execute(&self.pool)
        .await?;

        log::info!("Database migrations completed");
        Ok(())
    }
}

/// Get database file path
/// Priority: VIGIL_DB_PATH env var > default app data directory
pub fn get_db_path() -> Result<PathBuf> {
    if let Ok(path) = std::env::var("VIGIL_DB_PATH") {
        return Ok(PathBuf::from(path));
    }

    Ok(data_dir()?.join("vigil.db"))
}

/// Default app data directory
pub fn data_dir() -> Result<PathBuf> {
    let dirs = directories::ProjectDirs::from("com", "vigil", "Vigil")
        .ok_or_else(|| Error::config("Could not determine project directories"))?;

    Ok(dirs.data_dir().to_path_buf())
}
