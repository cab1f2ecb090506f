//! The two statements whose atomicity depends on the backing store's SQL
//! dialect: the guarded code consumption and the whitelist entry upsert.
//!
//! Everything else in the query layer is portable SQL. A second backend only
//! needs its own phrasing of these two statements.

use sqlx::{Executor, Sqlite};
use uuid::Uuid;

use super::db::DatabaseError;
use super::queries_entries::EntryParams;

/// Marks a code used only while it is still unused and unexpired. The
/// `WHERE` guard is what makes concurrent consumers see at most one success.
const CONSUME_CODE_SQL: &str = "UPDATE registration_codes \
     SET used = 1, used_by_id = ?, used_by_name = ?, used_at = ? \
     WHERE code = ? AND used = 0 AND expires_at > ?";

/// Insert-or-overwrite keyed by `(player_id, server_name)`. Every mutable
/// column takes the incoming value (last write wins).
const UPSERT_ENTRY_SQL: &str = "INSERT INTO whitelist_entries \
     (player_id, player_name, server_name, registration_type, reason, added_by, inviter_chat_id, created_at, expires_at, active) \
     VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?) \
     ON CONFLICT(player_id, server_name) DO UPDATE SET \
     player_name = excluded.player_name, \
     registration_type = excluded.registration_type, \
     reason = excluded.reason, \
     added_by = excluded.added_by, \
     inviter_chat_id = excluded.inviter_chat_id, \
     created_at = excluded.created_at, \
     expires_at = excluded.expires_at, \
     active = excluded.active";

/// Returns whether this call consumed the code.
pub(super) async fn consume_code<'e, E>(
    executor: E,
    code: &str,
    player_id: Uuid,
    player_name: &str,
    now: i64,
) -> Result<bool, DatabaseError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let result = sqlx::query(CONSUME_CODE_SQL)
        .bind(player_id.to_string())
        .bind(player_name)
        .bind(now)
        .bind(code)
        .bind(now)
        .execute(executor)
        .await?;

    Ok(result.rows_affected() == 1)
}

pub(super) async fn upsert_entry<'e, E>(
    executor: E,
    params: &EntryParams<'_>,
    now: i64,
) -> Result<(), DatabaseError>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query(UPSERT_ENTRY_SQL)
        .bind(params.player_id.to_string())
        .bind(params.player_name)
        .bind(params.server_name)
        .bind(params.registration_type)
        .bind(params.reason)
        .bind(params.added_by)
        .bind(params.inviter_chat_id)
        .bind(now)
        .bind(params.expires_at)
        .bind(params.active)
        .execute(executor)
        .await?;

    Ok(())
}
