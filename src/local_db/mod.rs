//! # Local Database Module
//!
//! Durable local storage for everything that must survive a process restart
//! while the device is offline.
//!
//! ## Architecture
//!
//! - **Offline Queue**: pending mutations awaiting remote confirmation
//! - **Plan Snapshot**: the last known state of every float plan
//! - **Contact Snapshot**: emergency contacts pulled from the server
//! - **Sync Metadata**: key/value bookkeeping such as the last sync time
//!
//! ## Key Components
//!
//! - `LocalDatabase`: connection pool and schema management
//! - `schema.rs`: schema statements and migration versions
//! - `queue.rs`: offline queue persistence
//! - `plans.rs`: plan and contact snapshots
//! - `sync.rs`: sync metadata
//!
//! ## Usage
//!
//! ```rust,no_run
//! use floatplan::local_db::LocalDatabase;
//!
//! # async fn example() -> sqlx::Result<()> {
//! let db = LocalDatabase::open("/tmp/floatplan.db").await?;
//! let stats = db.get_stats().await?;
//! println!("{} pending operations", stats.pending_operations);
//! # Ok(())
//! # }
//! ```

pub mod schema;
pub mod queue;
pub mod plans;
pub mod sync;

use std::path::{Path, PathBuf};
use std::str::FromStr;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Result as SqlxResult, SqlitePool};

/// Result type for local database operations
pub type Result<T> = SqlxResult<T>;

/// Local database connection manager
///
/// Wraps the SQLite connection pool. Cheap to share behind an `Arc`.
#[derive(Debug, Clone)]
pub struct LocalDatabase {
    pool: SqlitePool,
}

impl LocalDatabase {
    /// Open or create the database file at `path`
    ///
    /// Uses WAL mode so readers never block the drain loop's writes.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await?;

        let db = Self { pool };
        db.init_schema().await?;
        tracing::debug!("[DB] Opened local database at {}", path.display());
        Ok(db)
    }

    /// Open a private in-memory database
    ///
    /// Pinned to a single long-lived connection because every SQLite
    /// in-memory connection is its own database.
    pub async fn in_memory() -> Result<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?;
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        let db = Self { pool };
        db.init_schema().await?;
        Ok(db)
    }

    /// Default database file path
    ///
    /// Uses the platform data directory when available.
    pub fn default_path() -> PathBuf {
        let mut path = dirs::data_dir().unwrap_or_else(std::env::temp_dir);
        path.push("floatplan");
        path.push("local.db");
        path
    }

    /// Initialize database schema
    async fn init_schema(&self) -> Result<()> {
        for statement in schema::SCHEMA_V1 {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        self.run_migrations().await
    }

    /// Run database migrations
    async fn run_migrations(&self) -> Result<()> {
        let current_version: (i32,) =
            sqlx::query_as("SELECT COALESCE(MAX(version), 0) FROM schema_migrations")
                .fetch_one(&self.pool)
                .await?;

        for version in schema::get_pending_migrations(current_version.0) {
            sqlx::query("INSERT INTO schema_migrations (version, applied_at) VALUES (?, ?)")
                .bind(version)
                .bind(chrono::Utc::now().to_rfc3339())
                .execute(&self.pool)
                .await?;
            tracing::info!("[DB] Applied schema migration {}", version);
        }

        Ok(())
    }

    /// Get connection pool reference
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Get database statistics
    pub async fn get_stats(&self) -> Result<DatabaseStats> {
        let plan_count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM float_plans")
            .fetch_one(&self.pool)
            .await?;

        let contact_count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM emergency_contacts")
            .fetch_one(&self.pool)
            .await?;

        let pending_operations: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM offline_queue")
            .fetch_one(&self.pool)
            .await?;

        Ok(DatabaseStats {
            plan_count: plan_count.0 as u64,
            contact_count: contact_count.0 as u64,
            pending_operations: pending_operations.0 as u64,
        })
    }
}

/// Database statistics
#[derive(Debug, Clone)]
pub struct DatabaseStats {
    /// Float plans in the local snapshot
    pub plan_count: u64,
    /// Emergency contacts in the local snapshot
    pub contact_count: u64,
    /// Operations waiting in the offline queue
    pub pending_operations: u64,
}

/// Parse an RFC 3339 timestamp column
pub(crate) fn parse_timestamp(value: &str) -> Result<chrono::DateTime<chrono::Utc>> {
    chrono::DateTime::parse_from_rfc3339(value)
        .map(|t| t.with_timezone(&chrono::Utc))
        .map_err(|e| sqlx::Error::Decode(Box::new(e)))
}

/// Parse a UUID column
pub(crate) fn parse_uuid(value: &str) -> Result<uuid::Uuid> {
    uuid::Uuid::parse_str(value).map_err(|e| sqlx::Error::Decode(Box::new(e)))
}
