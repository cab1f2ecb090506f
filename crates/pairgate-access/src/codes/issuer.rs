//! Issues registration codes to chat identities and consumes them.

use pairgate_core::config::CodeConfig;
use pairgate_core::db::unix_timestamp;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::generator::{generate_code, normalize_code};
use crate::error::{AccessError, Result};
use crate::storage::{AccessDatabase, CodeParams, RegistrationCode};

/// Registration code issuer and validator.
#[derive(Clone)]
pub struct CodeIssuer {
    db: AccessDatabase,
    config: CodeConfig,
}

impl CodeIssuer {
    pub const fn new(db: AccessDatabase, config: CodeConfig) -> Self {
        Self { db, config }
    }

    /// Issue a fresh code for a chat identity.
    ///
    /// Every unused code the chat already holds is deleted in the same
    /// transaction that stores the new one, so at most one code per chat can
    /// be redeemed at any time, even under concurrent requests. A generated
    /// code that collides with an existing one is replaced, up to
    /// `max_generation_attempts` times.
    pub async fn issue_code(
        &self,
        chat_id: i64,
        chat_username: Option<&str>,
        player_name: Option<&str>,
    ) -> Result<RegistrationCode> {
        let expires_at = unix_timestamp() + self.config.ttl_secs();
        let attempts = self.config.max_generation_attempts.max(1);

        for attempt in 1..=attempts {
            let code = generate_code();
            let params = CodeParams {
                code: &code,
                chat_id,
                chat_username,
                player_name,
                expires_at,
            };
            match self.db.replace_code_for_chat(&params).await {
                Ok((issued, removed)) => {
                    if removed > 0 {
                        debug!(chat_id, removed, "Invalidated previous registration codes");
                    }
                    info!(chat_id, code = %issued.code, "Registration code issued");
                    return Ok(issued);
                }
                Err(e) if e.is_constraint() => {
                    debug!(chat_id, attempt, "Generated code collided, retrying");
                }
                Err(e) => {
                    warn!(chat_id, error = %e, "Failed to store registration code");
                    return Err(e.into());
                }
            }
        }

        warn!(chat_id, attempts, "Gave up generating a unique registration code");
        Err(AccessError::Conflict(format!(
            "No unique code after {attempts} attempts"
        )))
    }

    /// The most recent redeemable code for a chat identity.
    pub async fn active_code(&self, chat_id: i64) -> Result<Option<RegistrationCode>> {
        Ok(self.db.active_code_for_chat(chat_id).await?)
    }

    /// Look a code up by user input, case-insensitively.
    pub async fn find_code(&self, input: &str) -> Result<Option<RegistrationCode>> {
        Ok(self.db.get_code(&normalize_code(input)).await?)
    }

    /// Mark the code used by `player_id` if it is still unused and unexpired.
    ///
    /// Returns whether this call consumed it. Of several concurrent callers at
    /// most one sees `true`.
    pub async fn validate_and_consume(
        &self,
        input: &str,
        player_id: Uuid,
        player_name: &str,
    ) -> Result<bool> {
        let code = normalize_code(input);
        let consumed = self.db.consume_code(&code, player_id, player_name).await?;
        if consumed {
            info!(code = %code, player_id = %player_id, "Registration code consumed");
        }
        Ok(consumed)
    }

    /// Delete codes past their expiry. Returns how many were removed.
    pub async fn sweep_expired(&self) -> Result<u64> {
        Ok(self.db.delete_expired_codes().await?)
    }

    pub fn ttl_secs(&self) -> i64 {
        self.config.ttl_secs()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::codes::is_well_formed;

    async fn test_issuer() -> CodeIssuer {
        let db = AccessDatabase::open_in_memory().await.unwrap();
        CodeIssuer::new(db, CodeConfig::default())
    }

    #[tokio::test]
    async fn issued_code_expires_after_ttl() {
        let issuer = test_issuer().await;
        let before = unix_timestamp();
        let code = issuer.issue_code(42, Some("alice"), None).await.unwrap();

        assert!(is_well_formed(&code.code));
        assert_eq!(code.chat_id, 42);
        assert_eq!(code.chat_username.as_deref(), Some("alice"));
        assert!(code.expires_at >= before + 1800);
        assert!(code.expires_at <= unix_timestamp() + 1800);
        assert!(code.is_valid());
    }

    #[tokio::test]
    async fn second_issue_invalidates_first() {
        let issuer = test_issuer().await;
        let first = issuer.issue_code(42, None, None).await.unwrap();
        let second = issuer.issue_code(42, None, None).await.unwrap();

        let active = issuer.active_code(42).await.unwrap().unwrap();
        assert_eq!(active.code, second.code);
        assert!(
            !issuer
                .validate_and_consume(&first.code, Uuid::new_v4(), "Steve")
                .await
                .unwrap()
        );
    }

    #[tokio::test]
    async fn other_chats_keep_their_codes() {
        let issuer = test_issuer().await;
        let mine = issuer.issue_code(1, None, None).await.unwrap();
        issuer.issue_code(2, None, None).await.unwrap();

        assert_eq!(issuer.active_code(1).await.unwrap().unwrap().code, mine.code);
    }

    #[tokio::test]
    async fn consume_accepts_lowercase_input_once() {
        let issuer = test_issuer().await;
        let code = issuer.issue_code(42, None, Some("Steve")).await.unwrap();
        let input = format!("  {} ", code.code.to_lowercase());

        let player = Uuid::new_v4();
        assert!(issuer.validate_and_consume(&input, player, "Steve").await.unwrap());
        assert!(!issuer.validate_and_consume(&input, player, "Steve").await.unwrap());
        assert!(issuer.active_code(42).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn find_code_normalizes_input() {
        let issuer = test_issuer().await;
        let code = issuer.issue_code(42, None, None).await.unwrap();

        let found = issuer
            .find_code(&code.code.to_lowercase())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.code, code.code);
        assert!(issuer.find_code("not-a-code").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn zero_ttl_codes_are_never_redeemable() {
        let db = AccessDatabase::open_in_memory().await.unwrap();
        let issuer = CodeIssuer::new(
            db,
            CodeConfig {
                ttl_minutes: 0,
                ..CodeConfig::default()
            },
        );
        let code = issuer.issue_code(42, None, None).await.unwrap();

        assert!(!code.is_valid());
        assert!(issuer.active_code(42).await.unwrap().is_none());
        assert_eq!(issuer.sweep_expired().await.unwrap(), 1);
    }
}
