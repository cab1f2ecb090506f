//! Registration code queries.

use pairgate_core::db::unix_timestamp;
use uuid::Uuid;

use super::db::{AccessDatabase, DatabaseError};
use super::dialect;
use super::models::RegistrationCode;

/// Parameters for persisting a freshly generated code.
#[derive(Debug, Clone)]
pub struct CodeParams<'a> {
    pub code: &'a str,
    pub chat_id: i64,
    pub chat_username: Option<&'a str>,
    pub player_name: Option<&'a str>,
    pub expires_at: i64,
}

impl AccessDatabase {
    /// Store a code. Fails with [`DatabaseError::Constraint`] when the code
    /// string already exists.
    pub async fn insert_code(
        &self,
        params: &CodeParams<'_>,
    ) -> Result<RegistrationCode, DatabaseError> {
        let now = unix_timestamp();

        sqlx::query(
            "INSERT INTO registration_codes (code, chat_id, chat_username, player_name, created_at, expires_at) \
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(params.code)
        .bind(params.chat_id)
        .bind(params.chat_username)
        .bind(params.player_name)
        .bind(now)
        .bind(params.expires_at)
        .execute(self.pool())
        .await?;

        self.get_code(params.code)
            .await?
            .ok_or_else(|| DatabaseError::NotFound(format!("Code {}", params.code)))
    }

    /// Delete the chat's unused codes and store `params` in one transaction.
    ///
    /// The DELETE takes the write lock first, so concurrent callers for one
    /// chat serialize and exactly one unused code survives. A colliding code
    /// string rolls back the DELETE too and fails with
    /// [`DatabaseError::Constraint`]. Returns the stored code and how many
    /// codes it replaced.
    pub async fn replace_code_for_chat(
        &self,
        params: &CodeParams<'_>,
    ) -> Result<(RegistrationCode, u64), DatabaseError> {
        let now = unix_timestamp();
        let mut tx = self.pool().begin().await?;

        let removed = sqlx::query("DELETE FROM registration_codes WHERE chat_id = ? AND used = 0")
            .bind(params.chat_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        sqlx::query(
            "INSERT INTO registration_codes (code, chat_id, chat_username, player_name, created_at, expires_at) \
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(params.code)
        .bind(params.chat_id)
        .bind(params.chat_username)
        .bind(params.player_name)
        .bind(now)
        .bind(params.expires_at)
        .execute(&mut *tx)
        .await?;

        let code = sqlx::query_as::<_, RegistrationCode>(
            "SELECT * FROM registration_codes WHERE code = ?",
        )
        .bind(params.code)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok((code, removed))
    }

    /// Get a code by its exact (already normalized) text.
    pub async fn get_code(&self, code: &str) -> Result<Option<RegistrationCode>, DatabaseError> {
        let code = sqlx::query_as::<_, RegistrationCode>(
            "SELECT * FROM registration_codes WHERE code = ?",
        )
        .bind(code)
        .fetch_optional(self.pool())
        .await?;

        Ok(code)
    }

    /// The most recent unused, unexpired code for a chat identity.
    pub async fn active_code_for_chat(
        &self,
        chat_id: i64,
    ) -> Result<Option<RegistrationCode>, DatabaseError> {
        let code = sqlx::query_as::<_, RegistrationCode>(
            "SELECT * FROM registration_codes WHERE chat_id = ? AND used = 0 AND expires_at > ? \
             ORDER BY created_at DESC, rowid DESC LIMIT 1",
        )
        .bind(chat_id)
        .bind(unix_timestamp())
        .fetch_optional(self.pool())
        .await?;

        Ok(code)
    }

    /// Consume a code if it is still unused and unexpired.
    pub async fn consume_code(
        &self,
        code: &str,
        player_id: Uuid,
        player_name: &str,
    ) -> Result<bool, DatabaseError> {
        dialect::consume_code(self.pool(), code, player_id, player_name, unix_timestamp()).await
    }

    /// Remove codes past their expiry, used or not. Returns the count removed.
    pub async fn delete_expired_codes(&self) -> Result<u64, DatabaseError> {
        let result = sqlx::query("DELETE FROM registration_codes WHERE expires_at <= ?")
            .bind(unix_timestamp())
            .execute(self.pool())
            .await?;

        Ok(result.rows_affected())
    }
}
