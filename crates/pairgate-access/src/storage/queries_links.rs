//! Player link queries.

use pairgate_core::db::unix_timestamp;
use uuid::Uuid;

use super::db::{AccessDatabase, DatabaseError};
use super::models::PlayerLink;

/// Parameters for pairing a player with a chat identity.
#[derive(Debug, Clone)]
pub struct LinkParams<'a> {
    pub player_id: Uuid,
    pub player_name: &'a str,
    pub chat_id: i64,
    pub chat_username: Option<&'a str>,
}

pub(super) const INSERT_LINK_SQL: &str = "INSERT INTO player_links \
     (player_id, player_name, chat_id, chat_username, linked_at, active) VALUES (?, ?, ?, ?, ?, 1)";

impl AccessDatabase {
    /// Create an active link. Fails with [`DatabaseError::Constraint`] if the
    /// player or the chat identity already has an active link.
    pub async fn insert_link(&self, params: &LinkParams<'_>) -> Result<PlayerLink, DatabaseError> {
        let result = sqlx::query(INSERT_LINK_SQL)
            .bind(params.player_id.to_string())
            .bind(params.player_name)
            .bind(params.chat_id)
            .bind(params.chat_username)
            .bind(unix_timestamp())
            .execute(self.pool())
            .await?;

        self.get_link(result.last_insert_rowid()).await
    }

    /// Get a link by row id, active or not.
    pub async fn get_link(&self, id: i64) -> Result<PlayerLink, DatabaseError> {
        sqlx::query_as::<_, PlayerLink>("SELECT * FROM player_links WHERE id = ?")
            .bind(id)
            .fetch_optional(self.pool())
            .await?
            .ok_or_else(|| DatabaseError::NotFound(format!("Link {id}")))
    }

    /// The active link for a player, if any.
    pub async fn link_by_player(&self, player_id: Uuid) -> Result<Option<PlayerLink>, DatabaseError> {
        let link = sqlx::query_as::<_, PlayerLink>(
            "SELECT * FROM player_links WHERE player_id = ? AND active = 1",
        )
        .bind(player_id.to_string())
        .fetch_optional(self.pool())
        .await?;

        Ok(link)
    }

    /// The active link for a chat identity, if any.
    pub async fn link_by_chat(&self, chat_id: i64) -> Result<Option<PlayerLink>, DatabaseError> {
        let link = sqlx::query_as::<_, PlayerLink>(
            "SELECT * FROM player_links WHERE chat_id = ? AND active = 1",
        )
        .bind(chat_id)
        .fetch_optional(self.pool())
        .await?;

        Ok(link)
    }

    /// Soft-unlink a player. Returns whether an active link was deactivated.
    pub async fn deactivate_link(&self, player_id: Uuid) -> Result<bool, DatabaseError> {
        let result =
            sqlx::query("UPDATE player_links SET active = 0 WHERE player_id = ? AND active = 1")
                .bind(player_id.to_string())
                .execute(self.pool())
                .await?;

        Ok(result.rows_affected() > 0)
    }

    /// All active links, newest first.
    pub async fn active_links(&self) -> Result<Vec<PlayerLink>, DatabaseError> {
        let links = sqlx::query_as::<_, PlayerLink>(
            "SELECT * FROM player_links WHERE active = 1 ORDER BY linked_at DESC, id DESC",
        )
        .fetch_all(self.pool())
        .await?;

        Ok(links)
    }
}
