//! SQLite-backed plate storage
//!
//! The collection lives in one row of the key/value `settings` table under
//! [`WATCHLIST_KEY`]. Each write is a single UPSERT statement, so readers see
//! either the previous or the new collection, never a mix.

use async_trait::async_trait;
use sqlx::SqlitePool;
use std::path::Path;
use tracing::debug;
use vpw_common::{Error, Result};

use super::PlateStorage;

/// Settings key holding the serialized plate collection
pub const WATCHLIST_KEY: &str = "plate_watchlist";

pub struct SqliteStorage {
    pool: SqlitePool,
}

impl SqliteStorage {
    /// Open (creating if needed) the database file and its settings table
    pub async fn open(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
        debug!("Connecting to database: {}", db_url);

        let pool = SqlitePool::connect(&db_url).await?;
        Self::from_pool(pool).await
    }

    /// Wrap an existing pool, ensuring the settings table exists
    pub async fn from_pool(pool: SqlitePool) -> Result<Self> {
        create_settings_table(&pool).await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

/// Create the key/value settings table if missing
pub async fn create_settings_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS settings (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;
    Ok(())
}

#[async_trait]
impl PlateStorage for SqliteStorage {
    async fn read_raw(&self) -> Result<Option<String>> {
        let row: Option<(String,)> = sqlx::query_as("SELECT value FROM settings WHERE key = ?")
            .bind(WATCHLIST_KEY)
            .fetch_optional(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(row.map(|(value,)| value))
    }

    async fn write_raw(&self, payload: &str) -> Result<()> {
        sqlx::query(
            "INSERT INTO settings (key, value) VALUES (?, ?)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        )
        .bind(WATCHLIST_KEY)
        .bind(payload)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(())
    }

    fn describe(&self) -> String {
        format!("sqlite settings[{}]", WATCHLIST_KEY)
    }
}
