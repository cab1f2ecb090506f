//! Data models for Pairgate access storage.

use std::fmt;

use pairgate_core::db::unix_timestamp;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A server whose last heartbeat is older than this is considered offline.
pub const SERVER_STALE_AFTER_SECS: i64 = 60;

/// How a whitelist entry came to exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum RegistrationType {
    /// Granted by activating a chat registration code.
    Code,
    Invite,
    Manual,
    Import,
}

impl RegistrationType {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Code => "code",
            Self::Invite => "invite",
            Self::Manual => "manual",
            Self::Import => "import",
        }
    }
}

impl fmt::Display for RegistrationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct WhitelistEntry {
    pub id: i64,
    pub player_id: String,
    pub player_name: String,
    pub server_name: String,
    pub registration_type: RegistrationType,
    pub reason: Option<String>,
    pub added_by: Option<String>,
    pub inviter_chat_id: Option<i64>,
    pub created_at: i64,
    pub expires_at: Option<i64>,
    pub active: bool,
}

impl WhitelistEntry {
    pub fn is_expired_at(&self, now: i64) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }

    /// Active and not past its expiry.
    pub fn is_valid(&self) -> bool {
        self.active && !self.is_expired_at(unix_timestamp())
    }

    pub fn player_uuid(&self) -> Option<Uuid> {
        Uuid::parse_str(&self.player_id).ok()
    }
}

/// A one-time pairing credential issued to a chat identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct RegistrationCode {
    pub code: String,
    pub chat_id: i64,
    pub chat_username: Option<String>,
    pub player_name: Option<String>,
    pub created_at: i64,
    pub expires_at: i64,
    pub used: bool,
    pub used_by_id: Option<String>,
    pub used_by_name: Option<String>,
    pub used_at: Option<i64>,
}

impl RegistrationCode {
    pub const fn is_expired_at(&self, now: i64) -> bool {
        now >= self.expires_at
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(unix_timestamp())
    }

    /// Unused and unexpired.
    pub fn is_valid(&self) -> bool {
        !self.used && !self.is_expired()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct PlayerLink {
    pub id: i64,
    pub player_id: String,
    pub player_name: String,
    pub chat_id: i64,
    pub chat_username: Option<String>,
    pub linked_at: i64,
    pub active: bool,
}

impl PlayerLink {
    pub fn player_uuid(&self) -> Option<Uuid> {
        Uuid::parse_str(&self.player_id).ok()
    }

    pub fn is_player(&self, player_id: Uuid) -> bool {
        self.player_uuid() == Some(player_id)
    }
}

/// A game server backend known to the registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct ServerInfo {
    pub name: String,
    pub display_name: String,
    pub whitelist_enabled: bool,
    pub last_heartbeat: i64,
}

impl ServerInfo {
    pub const fn is_online_at(&self, now: i64) -> bool {
        now - self.last_heartbeat < SERVER_STALE_AFTER_SECS
    }

    /// Computed from the heartbeat timestamp at call time, never stored.
    pub fn is_online(&self) -> bool {
        self.is_online_at(unix_timestamp())
    }
}
