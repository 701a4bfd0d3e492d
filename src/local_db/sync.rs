//! # Sync Metadata Operations
//!
//! Key/value bookkeeping for the sync engine, such as the time of the last
//! confirmed sync.

use chrono::{DateTime, Utc};
use sqlx::Row;

use crate::local_db::{parse_timestamp, LocalDatabase, Result};

const LAST_SYNC_KEY: &str = "last_sync_time";

impl LocalDatabase {
    /// Set sync metadata
    pub async fn set_sync_metadata(&self, key: &str, value: &str) -> Result<()> {
        sqlx::query(
            "INSERT OR REPLACE INTO sync_metadata (key, value, updated_at)
             VALUES (?, ?, ?)",
        )
        .bind(key)
        .bind(value)
        .bind(Utc::now().to_rfc3339())
        .execute(self.pool())
        .await?;
        Ok(())
    }

    /// Get sync metadata
    pub async fn get_sync_metadata(&self, key: &str) -> Result<Option<String>> {
        let row = sqlx::query("SELECT value FROM sync_metadata WHERE key = ?")
            .bind(key)
            .fetch_optional(self.pool())
            .await?;

        match row {
            Some(row) => Ok(Some(row.try_get("value")?)),
            None => Ok(None),
        }
    }

    /// Get last sync timestamp
    pub async fn get_last_sync_time(&self) -> Result<Option<DateTime<Utc>>> {
        self.get_sync_metadata(LAST_SYNC_KEY)
            .await?
            .as_deref()
            .map(parse_timestamp)
            .transpose()
    }

    /// Set last sync timestamp
    pub async fn set_last_sync_time(&self, at: DateTime<Utc>) -> Result<()> {
        self.set_sync_metadata(LAST_SYNC_KEY, &at.to_rfc3339()).await
    }
}
