//! Shared database types and utilities.
//!
//! Provides `DatabaseError`, `unix_timestamp()` and pool creation helpers used
//! by the access engine's storage layer.

use std::path::Path;
use std::str::FromStr;
use std::time::{SystemTime, UNIX_EPOCH};

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use tracing::info;

use crate::config::DatabaseConfig;

/// Database errors.
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("I/O error: {0}")]
    Io(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Migration error: {0}")]
    Migration(String),

    #[error("Query error: {0}")]
    Query(String),

    #[error("Not found: {0}")]
    NotFound(String),

    /// A unique or primary-key constraint rejected the write.
    #[error("Constraint violation: {0}")]
    Constraint(String),
}

impl DatabaseError {
    pub const fn is_constraint(&self) -> bool {
        matches!(self, Self::Constraint(_))
    }
}

impl From<sqlx::Error> for DatabaseError {
    fn from(e: sqlx::Error) -> Self {
        let unique = e
            .as_database_error()
            .is_some_and(|db| db.is_unique_violation());
        if unique {
            Self::Constraint(e.to_string())
        } else {
            Self::Query(e.to_string())
        }
    }
}

/// Open (or create) a `SQLite` connection pool at the given file path.
///
/// Creates the parent directory if it does not exist, enables WAL journal
/// mode and foreign keys, and sizes the pool from `settings`. Several game
/// server processes and the proxy may share the same file, so the busy
/// timeout matters.
pub async fn open_pool(path: &Path, settings: &DatabaseConfig) -> Result<Pool<Sqlite>, DatabaseError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| DatabaseError::Io(e.to_string()))?;
    }

    let options = SqliteConnectOptions::from_str(&format!("sqlite:{}?mode=rwc", path.display()))
        .map_err(|e| DatabaseError::Connection(e.to_string()))?
        .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
        .foreign_keys(true)
        .busy_timeout(settings.busy_timeout());

    let pool = SqlitePoolOptions::new()
        .max_connections(settings.max_connections.max(1))
        .acquire_timeout(settings.acquire_timeout())
        .idle_timeout(settings.idle_timeout())
        .max_lifetime(settings.max_lifetime())
        .connect_with(options)
        .await
        .map_err(|e| DatabaseError::Connection(e.to_string()))?;

    info!(
        path = %path.display(),
        max_connections = settings.max_connections,
        "Database opened"
    );

    Ok(pool)
}

/// Open an in-memory `SQLite` connection pool (for testing).
///
/// A single connection keeps every query on the same in-memory database.
pub async fn open_pool_in_memory() -> Result<Pool<Sqlite>, DatabaseError> {
    let options = SqliteConnectOptions::from_str("sqlite::memory:")
        .map_err(|e| DatabaseError::Connection(e.to_string()))?
        .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
        .foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(options)
        .await
        .map_err(|e| DatabaseError::Connection(e.to_string()))?;

    Ok(pool)
}

/// Returns the current time as a Unix timestamp (seconds since epoch).
#[allow(clippy::cast_possible_wrap)]
pub fn unix_timestamp() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64
}
