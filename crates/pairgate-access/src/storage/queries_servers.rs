//! Server registry queries.

use pairgate_core::db::unix_timestamp;

use super::db::{AccessDatabase, DatabaseError};
use super::models::ServerInfo;

impl AccessDatabase {
    /// Insert or refresh a server row. Registration counts as a heartbeat.
    pub async fn upsert_server(
        &self,
        name: &str,
        display_name: &str,
        whitelist_enabled: bool,
    ) -> Result<ServerInfo, DatabaseError> {
        sqlx::query(
            "INSERT INTO whitelist_servers (name, display_name, whitelist_enabled, last_heartbeat) \
             VALUES (?, ?, ?, ?) \
             ON CONFLICT(name) DO UPDATE SET \
             display_name = excluded.display_name, \
             whitelist_enabled = excluded.whitelist_enabled, \
             last_heartbeat = excluded.last_heartbeat",
        )
        .bind(name)
        .bind(display_name)
        .bind(whitelist_enabled)
        .bind(unix_timestamp())
        .execute(self.pool())
        .await?;

        self.get_server(name)
            .await?
            .ok_or_else(|| DatabaseError::NotFound(format!("Server {name}")))
    }

    /// Update a server's `last_heartbeat`. Returns whether the server exists.
    pub async fn touch_server(&self, name: &str) -> Result<bool, DatabaseError> {
        let result = sqlx::query("UPDATE whitelist_servers SET last_heartbeat = ? WHERE name = ?")
            .bind(unix_timestamp())
            .bind(name)
            .execute(self.pool())
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Update a server's whitelist toggle. Returns whether the server exists.
    pub async fn set_server_whitelist_enabled(
        &self,
        name: &str,
        enabled: bool,
    ) -> Result<bool, DatabaseError> {
        let result =
            sqlx::query("UPDATE whitelist_servers SET whitelist_enabled = ? WHERE name = ?")
                .bind(enabled)
                .bind(name)
                .execute(self.pool())
                .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn get_server(&self, name: &str) -> Result<Option<ServerInfo>, DatabaseError> {
        let server =
            sqlx::query_as::<_, ServerInfo>("SELECT * FROM whitelist_servers WHERE name = ?")
                .bind(name)
                .fetch_optional(self.pool())
                .await?;

        Ok(server)
    }

    pub async fn list_servers(&self) -> Result<Vec<ServerInfo>, DatabaseError> {
        let servers =
            sqlx::query_as::<_, ServerInfo>("SELECT * FROM whitelist_servers ORDER BY name")
                .fetch_all(self.pool())
                .await?;

        Ok(servers)
    }
}
