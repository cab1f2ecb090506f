//! `SQLite` database shared by every game server process and the proxy.

use std::path::Path;

use sqlx::{Pool, Sqlite};
use tracing::info;

use pairgate_core::config::DatabaseConfig;
use pairgate_core::db::{open_pool, open_pool_in_memory};

pub use pairgate_core::db::DatabaseError;

/// Persistence gateway for entries, codes, links and servers.
///
/// Cloning is cheap: clones share one connection pool.
#[derive(Clone)]
pub struct AccessDatabase {
    pool: Pool<Sqlite>,
}

impl AccessDatabase {
    /// Open or create the database at `path` and apply migrations.
    pub async fn open(path: &Path, settings: &DatabaseConfig) -> Result<Self, DatabaseError> {
        let pool = open_pool(path, settings).await?;
        let db = Self { pool };
        db.run_migrations().await?;
        Ok(db)
    }

    /// Open an in-memory database (for testing).
    pub async fn open_in_memory() -> Result<Self, DatabaseError> {
        let pool = open_pool_in_memory().await?;
        let db = Self { pool };
        db.run_migrations().await?;
        Ok(db)
    }

    async fn run_migrations(&self) -> Result<(), DatabaseError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| DatabaseError::Migration(e.to_string()))?;

        info!("Access database migrations complete");
        Ok(())
    }

    pub const fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    /// Close the pool, waiting for checked-out connections to return.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}
