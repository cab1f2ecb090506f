//! Code activation: the one operation that writes several entity kinds.
//!
//! Checks run strictly in order and stop at the first failure:
//! code lookup, code validity, existing whitelist entry, existing links.
//! Consumption, link creation and entry creation then commit together in a
//! single transaction.

use std::fmt;

use pairgate_core::config::ActivationConfig;
use tracing::{info, warn};
use uuid::Uuid;

use crate::codes::CodeIssuer;
use crate::error::Result;
use crate::links::LinkStore;
use crate::storage::{
    AccessDatabase, ActivationOutcome, ActivationWrite, RegistrationCode, WhitelistEntry,
};
use crate::whitelist::WhitelistManager;

/// Why an activation succeeded or failed. Each reason has its own message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivationReason {
    Success,
    /// Unknown, used or expired code.
    CodeInvalid,
    AlreadyWhitelisted,
    /// The code's chat identity is linked to a different player.
    TelegramAlreadyLinked,
    /// The player is linked to a different chat identity.
    PlayerAlreadyLinked,
}

impl ActivationReason {
    /// Stable key for message catalogues and logs.
    pub const fn key(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::CodeInvalid => "code-invalid",
            Self::AlreadyWhitelisted => "already-whitelisted",
            Self::TelegramAlreadyLinked => "telegram-already-linked",
            Self::PlayerAlreadyLinked => "player-already-linked",
        }
    }

    pub const fn user_message(self) -> &'static str {
        match self {
            Self::Success => "Your account is linked and you have been whitelisted.",
            Self::CodeInvalid => "This code is invalid or has expired. Request a new one.",
            Self::AlreadyWhitelisted => "You are already whitelisted.",
            Self::TelegramAlreadyLinked => {
                "This chat account is already linked to another player."
            }
            Self::PlayerAlreadyLinked => "Your player is already linked to another chat account.",
        }
    }
}

impl fmt::Display for ActivationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

#[derive(Debug, Clone)]
pub struct ActivationResult {
    pub success: bool,
    pub reason: ActivationReason,
    /// The last entry written, on success.
    pub entry: Option<WhitelistEntry>,
}

impl ActivationResult {
    const fn failed(reason: ActivationReason) -> Self {
        Self {
            success: false,
            reason,
            entry: None,
        }
    }
}

/// Reason recorded on entries granted by a code.
pub fn link_reason(code: &RegistrationCode) -> String {
    match code.chat_username.as_deref() {
        Some(username) if !username.is_empty() => format!("linked via chat: @{username}"),
        _ => format!("linked via chat: {}", code.chat_id),
    }
}

#[derive(Clone)]
pub struct ActivationOrchestrator {
    db: AccessDatabase,
    issuer: CodeIssuer,
    whitelist: WhitelistManager,
    links: LinkStore,
    config: ActivationConfig,
}

impl ActivationOrchestrator {
    pub const fn new(
        db: AccessDatabase,
        issuer: CodeIssuer,
        whitelist: WhitelistManager,
        links: LinkStore,
        config: ActivationConfig,
    ) -> Self {
        Self {
            db,
            issuer,
            whitelist,
            links,
            config,
        }
    }

    /// Servers an activation whitelists the player on.
    pub fn target_servers(&self) -> Vec<String> {
        if self.config.servers.is_empty() {
            vec![self.whitelist.server_name().to_string()]
        } else {
            self.config.servers.clone()
        }
    }

    /// Redeem `input` for the given player.
    ///
    /// Expected failures come back as an unsuccessful [`ActivationResult`].
    /// Only storage failures are returned as errors.
    pub async fn activate(
        &self,
        input: &str,
        player_id: Uuid,
        player_name: &str,
    ) -> Result<ActivationResult> {
        let Some(code) = self.issuer.find_code(input).await? else {
            info!(player_name, "Activation rejected: unknown code");
            return Ok(ActivationResult::failed(ActivationReason::CodeInvalid));
        };

        if !code.is_valid() {
            info!(player_name, code = %code.code, used = code.used, "Activation rejected: code not redeemable");
            return Ok(ActivationResult::failed(ActivationReason::CodeInvalid));
        }

        let issuing_server = self.whitelist.server_name();
        if self
            .whitelist
            .is_whitelisted_with_name(player_id, player_name, issuing_server)
            .await?
        {
            return Ok(ActivationResult::failed(
                ActivationReason::AlreadyWhitelisted,
            ));
        }

        if let Some(link) = self.links.link_by_chat(code.chat_id).await? {
            if !link.is_player(player_id) {
                return Ok(ActivationResult::failed(
                    ActivationReason::TelegramAlreadyLinked,
                ));
            }
        }
        if let Some(link) = self.links.link_by_player(player_id).await? {
            if link.chat_id != code.chat_id {
                return Ok(ActivationResult::failed(
                    ActivationReason::PlayerAlreadyLinked,
                ));
            }
        }

        let servers = self.target_servers();
        let reason = link_reason(&code);
        let write = ActivationWrite {
            code: &code.code,
            player_id,
            player_name,
            chat_id: code.chat_id,
            chat_username: code.chat_username.as_deref(),
            servers: &servers,
            reason: &reason,
            added_by: &self.config.added_by,
        };

        match self.db.complete_activation(&write).await {
            Ok(ActivationOutcome::Granted { link, mut entries }) => {
                info!(
                    player_id = %player_id,
                    player_name,
                    chat_id = link.chat_id,
                    servers = ?servers,
                    "Code activated"
                );
                Ok(ActivationResult {
                    success: true,
                    reason: ActivationReason::Success,
                    entry: entries.pop(),
                })
            }
            Ok(ActivationOutcome::CodeUnavailable) => {
                info!(player_name, code = %code.code, "Activation lost the race for the code");
                Ok(ActivationResult::failed(ActivationReason::CodeInvalid))
            }
            Err(e) if e.is_constraint() => {
                // A concurrent activation linked one side between the checks
                // and the transaction.
                warn!(player_id = %player_id, chat_id = code.chat_id, "Link created concurrently");
                let reason = if self.links.is_player_linked(player_id).await? {
                    ActivationReason::PlayerAlreadyLinked
                } else {
                    ActivationReason::TelegramAlreadyLinked
                };
                Ok(ActivationResult::failed(reason))
            }
            Err(e) => {
                warn!(player_id = %player_id, error = %e, "Activation failed");
                Err(e.into())
            }
        }
    }
}
