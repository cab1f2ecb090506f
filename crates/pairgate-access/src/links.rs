//! One-to-one pairing between a player identity and a chat identity.

use tracing::info;
use uuid::Uuid;

use crate::error::{AccessError, Result};
use crate::storage::{AccessDatabase, LinkParams, PlayerLink};

#[derive(Clone)]
pub struct LinkStore {
    db: AccessDatabase,
}

impl LinkStore {
    pub const fn new(db: AccessDatabase) -> Self {
        Self { db }
    }

    pub async fn link_by_chat(&self, chat_id: i64) -> Result<Option<PlayerLink>> {
        Ok(self.db.link_by_chat(chat_id).await?)
    }

    pub async fn link_by_player(&self, player_id: Uuid) -> Result<Option<PlayerLink>> {
        Ok(self.db.link_by_player(player_id).await?)
    }

    pub async fn is_chat_linked(&self, chat_id: i64) -> Result<bool> {
        Ok(self.db.link_by_chat(chat_id).await?.is_some())
    }

    pub async fn is_player_linked(&self, player_id: Uuid) -> Result<bool> {
        Ok(self.db.link_by_player(player_id).await?.is_some())
    }

    pub async fn active_links(&self) -> Result<Vec<PlayerLink>> {
        Ok(self.db.active_links().await?)
    }

    /// Pair a player with a chat identity outside of code activation.
    ///
    /// Fails with [`AccessError::Conflict`] when either side already has an
    /// active link.
    pub async fn create_link(&self, params: &LinkParams<'_>) -> Result<PlayerLink> {
        if self.is_chat_linked(params.chat_id).await? {
            return Err(AccessError::Conflict(format!(
                "Chat {} is already linked",
                params.chat_id
            )));
        }
        if self.is_player_linked(params.player_id).await? {
            return Err(AccessError::Conflict(format!(
                "Player {} is already linked",
                params.player_name
            )));
        }

        let link = self.db.insert_link(params).await.map_err(|e| {
            if e.is_constraint() {
                AccessError::Conflict(format!("Player {} is already linked", params.player_name))
            } else {
                AccessError::Storage(e)
            }
        })?;
        info!(player_id = %params.player_id, chat_id = params.chat_id, "Player linked");
        Ok(link)
    }

    /// Deactivate the player's link. Returns whether one was active.
    pub async fn unlink_player(&self, player_id: Uuid) -> Result<bool> {
        let removed = self.db.deactivate_link(player_id).await?;
        if removed {
            info!(player_id = %player_id, "Player unlinked");
        }
        Ok(removed)
    }
}
