//! Whitelist business rules on top of the entry store.

use pairgate_core::config::ServerConfig;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::Result;
use crate::storage::{AccessDatabase, EntryParams, RegistrationType, WhitelistEntry};

/// Reason recorded on entries created by the join-time auto-add policy.
pub const AUTO_ADD_REASON: &str = "automatically added on join";

/// Actor recorded on entries created by the join-time auto-add policy.
pub const AUTO_ADD_ACTOR: &str = "system";

/// One page of a listing, numbered from 1.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: usize,
    pub total_pages: usize,
    pub total: usize,
}

/// Slice `items` into pages of `per_page`. Out-of-range pages are clamped.
pub fn paginate<T>(items: Vec<T>, page: usize, per_page: usize) -> Page<T> {
    let per_page = per_page.max(1);
    let total = items.len();
    let total_pages = total.div_ceil(per_page).max(1);
    let page = page.clamp(1, total_pages);

    let items = items
        .into_iter()
        .skip((page - 1) * per_page)
        .take(per_page)
        .collect();

    Page {
        items,
        page,
        total_pages,
        total,
    }
}

/// Whitelist operations scoped to the local server.
#[derive(Clone)]
pub struct WhitelistManager {
    db: AccessDatabase,
    server: ServerConfig,
}

impl WhitelistManager {
    pub const fn new(db: AccessDatabase, server: ServerConfig) -> Self {
        Self { db, server }
    }

    /// Name of the server this manager acts for.
    pub fn server_name(&self) -> &str {
        &self.server.name
    }

    pub async fn is_whitelisted(&self, player_id: Uuid, server_name: &str) -> Result<bool> {
        Ok(self.db.has_valid_entry(player_id, server_name).await?)
    }

    /// Id lookup first. Only on a miss, fall back to a case-insensitive name
    /// match, which covers entries imported before the player's id was known.
    pub async fn is_whitelisted_with_name(
        &self,
        player_id: Uuid,
        player_name: &str,
        server_name: &str,
    ) -> Result<bool> {
        if self.db.has_valid_entry(player_id, server_name).await? {
            return Ok(true);
        }
        let by_name = self
            .db
            .has_valid_entry_by_name(player_id, player_name, server_name)
            .await?;
        if by_name {
            debug!(player_id = %player_id, player_name, server_name, "Whitelisted by name");
        }
        Ok(by_name)
    }

    /// Upsert an entry. Every mutable field of an existing row is overwritten.
    pub async fn add_entry(&self, params: &EntryParams<'_>) -> Result<WhitelistEntry> {
        let entry = self.db.upsert_entry(params).await?;
        info!(
            player_id = %params.player_id,
            server_name = params.server_name,
            registration_type = %params.registration_type,
            "Whitelist entry saved"
        );
        Ok(entry)
    }

    /// Add a player to each of `servers`, or to the local server when the
    /// list is empty. Returns the entries in the order written.
    pub async fn add_to_servers(
        &self,
        player_id: Uuid,
        player_name: &str,
        servers: &[String],
        registration_type: RegistrationType,
        reason: Option<&str>,
        added_by: Option<&str>,
    ) -> Result<Vec<WhitelistEntry>> {
        let local = [self.server.name.clone()];
        let targets = if servers.is_empty() { &local[..] } else { servers };

        let mut entries = Vec::with_capacity(targets.len());
        for server in targets {
            let params = EntryParams {
                reason,
                added_by,
                ..EntryParams::new(player_id, player_name, server, registration_type)
            };
            entries.push(self.add_entry(&params).await?);
        }
        Ok(entries)
    }

    /// Whitelist a player on the local server on behalf of an inviting user.
    pub async fn add_with_invite(
        &self,
        player_id: Uuid,
        player_name: &str,
        reason: Option<&str>,
        inviter_name: &str,
        inviter_chat_id: Option<i64>,
    ) -> Result<WhitelistEntry> {
        let params = EntryParams {
            reason,
            added_by: Some(inviter_name),
            inviter_chat_id,
            ..EntryParams::new(
                player_id,
                player_name,
                &self.server.name,
                RegistrationType::Invite,
            )
        };
        self.add_entry(&params).await
    }

    /// Hard delete. Returns whether an entry existed.
    pub async fn remove_entry(&self, player_id: Uuid, server_name: &str) -> Result<bool> {
        let removed = self.db.delete_entry(player_id, server_name).await?;
        if removed {
            info!(player_id = %player_id, server_name, "Whitelist entry removed");
        }
        Ok(removed)
    }

    /// Soft removal: the row stays for auditing but no longer grants access.
    pub async fn deactivate(&self, player_id: Uuid, server_name: &str) -> Result<bool> {
        let changed = self.db.set_entry_active(player_id, server_name, false).await?;
        if changed {
            info!(player_id = %player_id, server_name, "Whitelist entry deactivated");
        }
        Ok(changed)
    }

    /// Edit name, reason, actor, expiry and active flag of an existing entry.
    pub async fn update_entry(&self, params: &EntryParams<'_>) -> Result<bool> {
        Ok(self.db.update_entry(params).await?)
    }

    pub async fn get_entry(
        &self,
        player_id: Uuid,
        server_name: &str,
    ) -> Result<Option<WhitelistEntry>> {
        Ok(self.db.get_entry(player_id, server_name).await?)
    }

    pub async fn entries_by_server(&self, server_name: &str) -> Result<Vec<WhitelistEntry>> {
        Ok(self.db.entries_by_server(server_name).await?)
    }

    pub async fn entries_by_player(&self, player_id: Uuid) -> Result<Vec<WhitelistEntry>> {
        Ok(self.db.entries_by_player(player_id).await?)
    }

    pub async fn all_active_entries(&self) -> Result<Vec<WhitelistEntry>> {
        Ok(self.db.all_active_entries().await?)
    }

    pub async fn count(&self, server_name: &str) -> Result<i64> {
        Ok(self.db.count_entries(server_name).await?)
    }

    pub async fn count_all(&self) -> Result<i64> {
        Ok(self.db.count_all_entries().await?)
    }

    /// Servers on which the player currently holds a valid entry.
    pub async fn player_servers(&self, player_id: Uuid) -> Result<Vec<String>> {
        Ok(self.db.player_servers(player_id).await?)
    }

    pub async fn is_name_taken(&self, player_name: &str) -> Result<bool> {
        Ok(self.db.is_name_taken(player_name).await?)
    }

    /// Apply the join-time auto-add policy to a player who was let in.
    ///
    /// Does nothing unless the local whitelist and auto-add are both enabled
    /// and the player is not already whitelisted. Returns the created entry.
    pub async fn on_player_join(
        &self,
        player_id: Uuid,
        player_name: &str,
    ) -> Result<Option<WhitelistEntry>> {
        if !self.server.whitelist_enabled || !self.server.auto_add {
            return Ok(None);
        }
        if self
            .is_whitelisted_with_name(player_id, player_name, &self.server.name)
            .await?
        {
            return Ok(None);
        }

        let params = EntryParams {
            reason: Some(AUTO_ADD_REASON),
            added_by: Some(AUTO_ADD_ACTOR),
            ..EntryParams::new(
                player_id,
                player_name,
                &self.server.name,
                RegistrationType::Manual,
            )
        };
        match self.add_entry(&params).await {
            Ok(entry) => {
                info!(player_id = %player_id, player_name, "Player automatically added to whitelist");
                Ok(Some(entry))
            }
            Err(e) => {
                warn!(player_id = %player_id, player_name, error = %e, "Failed to auto-add player");
                Err(e)
            }
        }
    }
}
