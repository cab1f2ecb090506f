//! Connection-time access decisions with a hard deadline.
//!
//! Host hooks (the proxy's pre-connect handler, the game server's login
//! handler) call [`AccessGate::check_access`] and act on the returned
//! [`AccessDecision`]. A lookup that fails or exceeds the deadline denies the
//! player.

use std::future::Future;
use std::time::Duration;

use pairgate_core::config::GateConfig;
use tracing::{debug, error, warn};
use uuid::Uuid;

use crate::cache::WhitelistCache;
use crate::error::{AccessError, Result};
use crate::whitelist::WhitelistManager;

/// Source of whitelist answers the gate consults.
pub trait AccessLookup: Send + Sync {
    fn is_allowed(
        &self,
        player_id: Uuid,
        player_name: &str,
        server_name: &str,
    ) -> impl Future<Output = Result<bool>> + Send;
}

/// The proxy path: id-only lookups served from the TTL cache.
impl AccessLookup for WhitelistCache {
    async fn is_allowed(&self, player_id: Uuid, _player_name: &str, server_name: &str) -> Result<bool> {
        self.is_whitelisted(player_id, server_name).await
    }
}

/// The game-server path: direct store lookups with the name fallback.
impl AccessLookup for WhitelistManager {
    async fn is_allowed(&self, player_id: Uuid, player_name: &str, server_name: &str) -> Result<bool> {
        self.is_whitelisted_with_name(player_id, player_name, server_name)
            .await
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllowReason {
    Whitelisted,
    /// The server does not require a whitelist.
    Bypass,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenyReason {
    NotWhitelisted,
    /// The lookup did not finish within the gate deadline.
    Timeout,
    /// The lookup failed.
    StorageError,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessDecision {
    Allow(AllowReason),
    Deny(DenyReason),
}

impl AccessDecision {
    pub const fn is_allowed(self) -> bool {
        matches!(self, Self::Allow(_))
    }

    /// Text shown to a denied player.
    pub fn deny_message(self, server_name: &str) -> Option<String> {
        match self {
            Self::Allow(_) => None,
            Self::Deny(DenyReason::NotWhitelisted) => Some(format!(
                "You are not whitelisted on {server_name}. Link your account to get access."
            )),
            Self::Deny(DenyReason::Timeout | DenyReason::StorageError) => Some(
                "An error occurred while checking access. Please try again later.".to_string(),
            ),
        }
    }
}

/// Fail-closed access gate.
#[derive(Clone)]
pub struct AccessGate<L> {
    lookup: L,
    config: GateConfig,
}

impl<L: AccessLookup> AccessGate<L> {
    pub const fn new(lookup: L, config: GateConfig) -> Self {
        Self { lookup, config }
    }

    pub const fn timeout(&self) -> Duration {
        self.config.timeout()
    }

    /// Decide whether a player may connect to `server_name`.
    pub async fn check_access(
        &self,
        player_id: Uuid,
        player_name: &str,
        server_name: &str,
    ) -> AccessDecision {
        if !self.config.requires_whitelist(server_name) {
            debug!(player_name, server_name, "Bypassing whitelist check");
            return AccessDecision::Allow(AllowReason::Bypass);
        }

        let deadline = self.timeout();
        let lookup = self.lookup.is_allowed(player_id, player_name, server_name);
        match tokio::time::timeout(deadline, lookup).await {
            Ok(Ok(true)) => {
                debug!(player_name, server_name, "Allowed: whitelisted");
                AccessDecision::Allow(AllowReason::Whitelisted)
            }
            Ok(Ok(false)) => {
                debug!(player_name, server_name, "Denied: not whitelisted");
                AccessDecision::Deny(DenyReason::NotWhitelisted)
            }
            Ok(Err(e)) => {
                warn!(
                    player_id = %player_id,
                    player_name,
                    server_name,
                    error = %e,
                    "Whitelist lookup failed, denying"
                );
                AccessDecision::Deny(DenyReason::StorageError)
            }
            Err(_) => {
                let err = AccessError::Timeout(deadline);
                error!(
                    player_id = %player_id,
                    player_name,
                    server_name,
                    error = %err,
                    "Whitelist check timed out, denying"
                );
                AccessDecision::Deny(DenyReason::Timeout)
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::storage::DatabaseError;

    struct Slow {
        delay: Duration,
        answer: bool,
    }

    impl AccessLookup for Slow {
        async fn is_allowed(&self, _: Uuid, _: &str, _: &str) -> Result<bool> {
            tokio::time::sleep(self.delay).await;
            Ok(self.answer)
        }
    }

    struct Broken;

    impl AccessLookup for Broken {
        async fn is_allowed(&self, _: Uuid, _: &str, _: &str) -> Result<bool> {
            Err(AccessError::Storage(DatabaseError::Connection(
                "pool closed".into(),
            )))
        }
    }

    struct Counting(Arc<AtomicUsize>);

    impl AccessLookup for Counting {
        async fn is_allowed(&self, _: Uuid, _: &str, _: &str) -> Result<bool> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(false)
        }
    }

    fn gate_config(timeout_ms: u64) -> GateConfig {
        GateConfig {
            timeout_ms,
            bypass_servers: vec!["lobby".to_string()],
        }
    }

    #[tokio::test]
    async fn whitelisted_player_is_allowed() {
        let gate = AccessGate::new(
            Slow {
                delay: Duration::ZERO,
                answer: true,
            },
            gate_config(1000),
        );
        let decision = gate.check_access(Uuid::new_v4(), "Steve", "survival").await;
        assert_eq!(decision, AccessDecision::Allow(AllowReason::Whitelisted));
        assert!(decision.deny_message("survival").is_none());
    }

    #[tokio::test]
    async fn unknown_player_is_denied() {
        let gate = AccessGate::new(
            Slow {
                delay: Duration::ZERO,
                answer: false,
            },
            gate_config(1000),
        );
        let decision = gate.check_access(Uuid::new_v4(), "Steve", "survival").await;
        assert_eq!(decision, AccessDecision::Deny(DenyReason::NotWhitelisted));
        assert!(decision.deny_message("survival").unwrap().contains("survival"));
    }

    #[tokio::test]
    async fn slow_lookup_fails_closed() {
        let gate = AccessGate::new(
            Slow {
                delay: Duration::from_secs(10),
                answer: true,
            },
            gate_config(50),
        );
        let decision = gate.check_access(Uuid::new_v4(), "Steve", "survival").await;
        assert_eq!(decision, AccessDecision::Deny(DenyReason::Timeout));
    }

    #[tokio::test]
    async fn storage_failure_denies() {
        let gate = AccessGate::new(Broken, gate_config(1000));
        let decision = gate.check_access(Uuid::new_v4(), "Steve", "survival").await;
        assert_eq!(decision, AccessDecision::Deny(DenyReason::StorageError));
        assert!(!decision.is_allowed());
    }

    #[tokio::test]
    async fn bypass_server_skips_lookup() {
        let calls = Arc::new(AtomicUsize::new(0));
        let gate = AccessGate::new(Counting(Arc::clone(&calls)), gate_config(1000));

        let decision = gate.check_access(Uuid::new_v4(), "Steve", "LOBBY").await;
        assert_eq!(decision, AccessDecision::Allow(AllowReason::Bypass));
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        gate.check_access(Uuid::new_v4(), "Steve", "survival").await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
