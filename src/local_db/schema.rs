//! Database Schema Definitions
//!
//! Contains the schema statements and migration bookkeeping for the local
//! SQLite database.

/// Current database schema version
pub const CURRENT_SCHEMA_VERSION: i32 = 1;

/// Schema migration versions
pub const MIGRATION_VERSIONS: &[i32] = &[1];

/// Statements creating the version 1 schema.
///
/// Each statement is idempotent so the list can run on every open.
pub const SCHEMA_V1: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS offline_queue (
        seq INTEGER PRIMARY KEY AUTOINCREMENT,
        id TEXT NOT NULL UNIQUE,
        operation_type TEXT NOT NULL,
        plan_id TEXT NOT NULL,
        resource_path TEXT NOT NULL,
        verb TEXT NOT NULL,
        data TEXT NOT NULL,
        created_at TEXT NOT NULL,
        retry_count INTEGER NOT NULL DEFAULT 0,
        last_attempt TEXT,
        error_message TEXT
    )",
    "CREATE INDEX IF NOT EXISTS idx_offline_queue_created ON offline_queue (created_at, seq)",
    "CREATE TABLE IF NOT EXISTS float_plans (
        id TEXT PRIMARY KEY,
        status TEXT NOT NULL,
        check_in_deadline TEXT NOT NULL,
        data TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS emergency_contacts (
        id TEXT PRIMARY KEY,
        data TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS sync_metadata (
        key TEXT PRIMARY KEY,
        value TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS schema_migrations (
        version INTEGER PRIMARY KEY,
        applied_at TEXT NOT NULL
    )",
];

/// Check if database needs migration
pub fn needs_migration(current_version: i32) -> bool {
    current_version < CURRENT_SCHEMA_VERSION
}

/// Get pending migrations
pub fn get_pending_migrations(current_version: i32) -> Vec<i32> {
    MIGRATION_VERSIONS
        .iter()
        .filter(|&&v| v > current_version)
        .cloned()
        .collect()
}
