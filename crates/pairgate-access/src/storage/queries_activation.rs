//! The multi-entity write performed when a registration code is activated.

use pairgate_core::db::unix_timestamp;
use uuid::Uuid;

use super::db::{AccessDatabase, DatabaseError};
use super::dialect;
use super::models::{PlayerLink, RegistrationType, WhitelistEntry};
use super::queries_entries::EntryParams;
use super::queries_links::INSERT_LINK_SQL;

/// Everything needed to consume a code and grant access in one transaction.
#[derive(Debug, Clone)]
pub struct ActivationWrite<'a> {
    pub code: &'a str,
    pub player_id: Uuid,
    pub player_name: &'a str,
    pub chat_id: i64,
    pub chat_username: Option<&'a str>,
    /// Servers to whitelist, in order. The last one is reported back.
    pub servers: &'a [String],
    pub reason: &'a str,
    pub added_by: &'a str,
}

/// Result of [`AccessDatabase::complete_activation`].
#[derive(Debug, Clone)]
pub enum ActivationOutcome {
    /// The code was consumed and access granted.
    Granted {
        link: PlayerLink,
        entries: Vec<WhitelistEntry>,
    },
    /// The guarded consume touched no row: the code was used or expired
    /// between validation and this write. Nothing was changed.
    CodeUnavailable,
}

impl AccessDatabase {
    /// Consume the code, create (or reuse) the player link and upsert one
    /// whitelist entry per server, all inside a single transaction.
    ///
    /// Any failure after the consume rolls the consume back with it, so a
    /// code is never burned without the grant being recorded.
    pub async fn complete_activation(
        &self,
        write: &ActivationWrite<'_>,
    ) -> Result<ActivationOutcome, DatabaseError> {
        let now = unix_timestamp();
        let player_id = write.player_id.to_string();
        let mut tx = self.pool().begin().await?;

        let consumed = dialect::consume_code(
            &mut *tx,
            write.code,
            write.player_id,
            write.player_name,
            now,
        )
        .await?;
        if !consumed {
            tx.rollback().await?;
            return Ok(ActivationOutcome::CodeUnavailable);
        }

        let existing = sqlx::query_as::<_, PlayerLink>(
            "SELECT * FROM player_links WHERE player_id = ? AND chat_id = ? AND active = 1",
        )
        .bind(&player_id)
        .bind(write.chat_id)
        .fetch_optional(&mut *tx)
        .await?;

        let link = if let Some(link) = existing {
            link
        } else {
            let inserted = sqlx::query(INSERT_LINK_SQL)
                .bind(&player_id)
                .bind(write.player_name)
                .bind(write.chat_id)
                .bind(write.chat_username)
                .bind(now)
                .execute(&mut *tx)
                .await?;

            sqlx::query_as::<_, PlayerLink>("SELECT * FROM player_links WHERE id = ?")
                .bind(inserted.last_insert_rowid())
                .fetch_one(&mut *tx)
                .await?
        };

        let mut entries = Vec::with_capacity(write.servers.len());
        for server in write.servers {
            let params = EntryParams {
                reason: Some(write.reason),
                added_by: Some(write.added_by),
                ..EntryParams::new(
                    write.player_id,
                    write.player_name,
                    server,
                    RegistrationType::Code,
                )
            };
            dialect::upsert_entry(&mut *tx, &params, now).await?;

            let entry = sqlx::query_as::<_, WhitelistEntry>(
                "SELECT * FROM whitelist_entries WHERE player_id = ? AND server_name = ?",
            )
            .bind(&player_id)
            .bind(server.as_str())
            .fetch_one(&mut *tx)
            .await?;
            entries.push(entry);
        }

        tx.commit().await?;

        Ok(ActivationOutcome::Granted { link, entries })
    }
}
