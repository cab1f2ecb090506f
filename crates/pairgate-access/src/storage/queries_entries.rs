//! Whitelist entry queries.

use pairgate_core::db::unix_timestamp;
use uuid::Uuid;

use super::db::{AccessDatabase, DatabaseError};
use super::dialect;
use super::models::{RegistrationType, WhitelistEntry};

/// Parameters for writing a whitelist entry.
#[derive(Debug, Clone)]
pub struct EntryParams<'a> {
    pub player_id: Uuid,
    pub player_name: &'a str,
    pub server_name: &'a str,
    pub registration_type: RegistrationType,
    pub reason: Option<&'a str>,
    pub added_by: Option<&'a str>,
    pub inviter_chat_id: Option<i64>,
    pub expires_at: Option<i64>,
    pub active: bool,
}

impl<'a> EntryParams<'a> {
    /// An active, non-expiring entry with no provenance details.
    pub const fn new(
        player_id: Uuid,
        player_name: &'a str,
        server_name: &'a str,
        registration_type: RegistrationType,
    ) -> Self {
        Self {
            player_id,
            player_name,
            server_name,
            registration_type,
            reason: None,
            added_by: None,
            inviter_chat_id: None,
            expires_at: None,
            active: true,
        }
    }
}

impl AccessDatabase {
    /// Insert or overwrite the entry for `(player_id, server_name)`.
    pub async fn upsert_entry(
        &self,
        params: &EntryParams<'_>,
    ) -> Result<WhitelistEntry, DatabaseError> {
        dialect::upsert_entry(self.pool(), params, unix_timestamp()).await?;
        self.get_entry(params.player_id, params.server_name)
            .await?
            .ok_or_else(|| {
                DatabaseError::NotFound(format!(
                    "Entry {} on {} after upsert",
                    params.player_id, params.server_name
                ))
            })
    }

    /// Get the entry for a player on a server, whatever its state.
    pub async fn get_entry(
        &self,
        player_id: Uuid,
        server_name: &str,
    ) -> Result<Option<WhitelistEntry>, DatabaseError> {
        let entry = sqlx::query_as::<_, WhitelistEntry>(
            "SELECT * FROM whitelist_entries WHERE player_id = ? AND server_name = ?",
        )
        .bind(player_id.to_string())
        .bind(server_name)
        .fetch_optional(self.pool())
        .await?;

        Ok(entry)
    }

    /// Hard delete. Returns whether a row existed.
    pub async fn delete_entry(
        &self,
        player_id: Uuid,
        server_name: &str,
    ) -> Result<bool, DatabaseError> {
        let result =
            sqlx::query("DELETE FROM whitelist_entries WHERE player_id = ? AND server_name = ?")
                .bind(player_id.to_string())
                .bind(server_name)
                .execute(self.pool())
                .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Overwrite the editable fields of an existing entry without touching
    /// its provenance or creation time.
    pub async fn update_entry(&self, params: &EntryParams<'_>) -> Result<bool, DatabaseError> {
        let result = sqlx::query(
            "UPDATE whitelist_entries SET player_name = ?, reason = ?, added_by = ?, expires_at = ?, active = ? \
             WHERE player_id = ? AND server_name = ?",
        )
        .bind(params.player_name)
        .bind(params.reason)
        .bind(params.added_by)
        .bind(params.expires_at)
        .bind(params.active)
        .bind(params.player_id.to_string())
        .bind(params.server_name)
        .execute(self.pool())
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Flip the active flag (soft removal / restore).
    pub async fn set_entry_active(
        &self,
        player_id: Uuid,
        server_name: &str,
        active: bool,
    ) -> Result<bool, DatabaseError> {
        let result = sqlx::query(
            "UPDATE whitelist_entries SET active = ? WHERE player_id = ? AND server_name = ?",
        )
        .bind(active)
        .bind(player_id.to_string())
        .bind(server_name)
        .execute(self.pool())
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// All entries for a player across servers, active or not.
    pub async fn entries_by_player(
        &self,
        player_id: Uuid,
    ) -> Result<Vec<WhitelistEntry>, DatabaseError> {
        let entries = sqlx::query_as::<_, WhitelistEntry>(
            "SELECT * FROM whitelist_entries WHERE player_id = ? ORDER BY server_name",
        )
        .bind(player_id.to_string())
        .fetch_all(self.pool())
        .await?;

        Ok(entries)
    }

    /// Active entries on a server, oldest first.
    pub async fn entries_by_server(
        &self,
        server_name: &str,
    ) -> Result<Vec<WhitelistEntry>, DatabaseError> {
        let entries = sqlx::query_as::<_, WhitelistEntry>(
            "SELECT * FROM whitelist_entries WHERE server_name = ? AND active = 1 ORDER BY created_at, id",
        )
        .bind(server_name)
        .fetch_all(self.pool())
        .await?;

        Ok(entries)
    }

    /// Active entries on every server.
    pub async fn all_active_entries(&self) -> Result<Vec<WhitelistEntry>, DatabaseError> {
        let entries = sqlx::query_as::<_, WhitelistEntry>(
            "SELECT * FROM whitelist_entries WHERE active = 1 ORDER BY server_name, created_at, id",
        )
        .fetch_all(self.pool())
        .await?;

        Ok(entries)
    }

    /// Whether a valid entry exists for the exact `(player_id, server_name)` pair.
    pub async fn has_valid_entry(
        &self,
        player_id: Uuid,
        server_name: &str,
    ) -> Result<bool, DatabaseError> {
        let row: Option<(i64,)> = sqlx::query_as(
            "SELECT 1 FROM whitelist_entries WHERE player_id = ? AND server_name = ? \
             AND active = 1 AND (expires_at IS NULL OR expires_at > ?) LIMIT 1",
        )
        .bind(player_id.to_string())
        .bind(server_name)
        .bind(unix_timestamp())
        .fetch_optional(self.pool())
        .await?;

        Ok(row.is_some())
    }

    /// Whether a valid entry on `server_name` carries `player_name`
    /// (case-insensitive) under a different player id.
    pub async fn has_valid_entry_by_name(
        &self,
        player_id: Uuid,
        player_name: &str,
        server_name: &str,
    ) -> Result<bool, DatabaseError> {
        let row: Option<(i64,)> = sqlx::query_as(
            "SELECT 1 FROM whitelist_entries WHERE player_name = ? COLLATE NOCASE AND server_name = ? \
             AND player_id != ? AND active = 1 AND (expires_at IS NULL OR expires_at > ?) LIMIT 1",
        )
        .bind(player_name)
        .bind(server_name)
        .bind(player_id.to_string())
        .bind(unix_timestamp())
        .fetch_optional(self.pool())
        .await?;

        Ok(row.is_some())
    }

    /// Whether any active entry on any server uses this name.
    pub async fn is_name_taken(&self, player_name: &str) -> Result<bool, DatabaseError> {
        let row: Option<(i64,)> = sqlx::query_as(
            "SELECT 1 FROM whitelist_entries WHERE player_name = ? COLLATE NOCASE AND active = 1 LIMIT 1",
        )
        .bind(player_name)
        .fetch_optional(self.pool())
        .await?;

        Ok(row.is_some())
    }

    /// Servers on which the player currently holds a valid entry.
    pub async fn player_servers(&self, player_id: Uuid) -> Result<Vec<String>, DatabaseError> {
        let rows: Vec<(String,)> = sqlx::query_as(
            "SELECT server_name FROM whitelist_entries WHERE player_id = ? \
             AND active = 1 AND (expires_at IS NULL OR expires_at > ?) ORDER BY server_name",
        )
        .bind(player_id.to_string())
        .bind(unix_timestamp())
        .fetch_all(self.pool())
        .await?;

        Ok(rows.into_iter().map(|(name,)| name).collect())
    }

    /// Count active entries on a server.
    pub async fn count_entries(&self, server_name: &str) -> Result<i64, DatabaseError> {
        let row: (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM whitelist_entries WHERE server_name = ? AND active = 1",
        )
        .bind(server_name)
        .fetch_one(self.pool())
        .await?;

        Ok(row.0)
    }

    /// Count active entries across all servers.
    pub async fn count_all_entries(&self) -> Result<i64, DatabaseError> {
        let row: (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM whitelist_entries WHERE active = 1")
                .fetch_one(self.pool())
                .await?;

        Ok(row.0)
    }
}
