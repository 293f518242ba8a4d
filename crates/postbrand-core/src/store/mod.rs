//! SQLite storage layer for postbrand.
//!
//! Provides database initialization, connection pooling, and CRUD
//! operations for all persistent entities. Uses SQLx with WAL mode for
//! concurrent access.

pub mod daily_auto_schedules;
pub mod embeddings;
pub mod performance_log;
pub mod post_insights;
pub mod posts;
pub mod review_requests;
pub mod revisions;
pub mod scheduler_config;
pub mod templates;
pub mod threads_accounts;
pub mod threads_auth;
pub mod time_slots;

use crate::config::expand_tilde;
use crate::error::StoreError;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use std::str::FromStr;
use std::time::Duration;

/// Type alias for the SQLite connection pool.
pub type DbPool = sqlx::SqlitePool;

/// Initialize the SQLite database with settings suited to a background
/// daemon: WAL mode, foreign keys enforced, embedded migrations applied.
pub async fn init_db(db_path: &str) -> Result<DbPool, StoreError> {
    let expanded = expand_tilde(db_path);

    if let Some(parent) = expanded.parent() {
        std::fs::create_dir_all(parent).map_err(|e| StoreError::Connection {
            source: sqlx::Error::Configuration(
                format!("failed to create directory {}: {e}", parent.display()).into(),
            ),
        })?;
    }

    let connect_options =
        SqliteConnectOptions::from_str(&format!("sqlite:{}", expanded.display()))
            .map_err(|e| StoreError::Connection { source: e })?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(Duration::from_secs(5))
            .optimize_on_close(true, None)
            .foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(8)
        .min_connections(1)
        .idle_timeout(Duration::from_secs(300))
        .connect_with(connect_options)
        .await
        .map_err(|e| StoreError::Connection { source: e })?;

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .map_err(|e| StoreError::Migration { source: e })?;

    Ok(pool)
}

/// Initialize an in-memory SQLite database for testing.
#[cfg(any(test, feature = "test-helpers"))]
pub async fn init_test_db() -> Result<DbPool, StoreError> {
    let connect_options = SqliteConnectOptions::from_str("sqlite::memory:")
        .map_err(|e| StoreError::Connection { source: e })?
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Normal)
        .foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(connect_options)
        .await
        .map_err(|e| StoreError::Connection { source: e })?;

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .map_err(|e| StoreError::Migration { source: e })?;

    Ok(pool)
}
