//! Idempotent schema bootstrap for the session tables.
//!
//! Runs eagerly when the [`StorageHandle`](crate::StorageHandle) first
//! connects, and again reactively when an operation fails because a table is
//! missing (schema lost out of band). Only ever issues `IF NOT EXISTS`
//! statements; existing data is never dropped or altered.

use sea_orm::sea_query::Index;
use sea_orm::{ConnectionTrait, DbErr, Schema};
use tracing::debug;

use crate::entity::{session, user_session};
use crate::session_store::Error;

/// Creates the session-blob table, its expiry index, and the bundled
/// user-session table if they do not exist. Safe to call repeatedly and
/// concurrently.
pub async fn ensure_schema<C: ConnectionTrait>(conn: &C) -> Result<(), DbErr> {
    let backend = conn.get_database_backend();
    let schema = Schema::new(backend);

    let mut sessions = schema.create_table_from_entity(session::Entity);
    sessions.if_not_exists();
    conn.execute(backend.build(&sessions)).await?;

    let mut expiry_index = Index::create();
    expiry_index
        .if_not_exists()
        .name("idx_sessions_expires_at")
        .table(session::Entity)
        .col(session::Column::ExpiresAt);
    conn.execute(backend.build(&expiry_index)).await?;

    let mut user_sessions = schema.create_table_from_entity(user_session::Entity);
    user_sessions.if_not_exists();
    conn.execute(backend.build(&user_sessions)).await?;

    debug!("session schema ensured");
    Ok(())
}

/// Whether a storage error means the session table is missing, in which case
/// the caller bootstraps the schema and retries once.
pub(crate) fn is_missing_table(err: &Error) -> bool {
    match err {
        Error::Backend(msg) => {
            // SQLite: `no such table: sessions`.
            // PostgreSQL: `relation "sessions" does not exist`. Anchoring on
            // "relation" keeps e.g. missing-column errors from triggering a
            // pointless bootstrap.
            msg.contains("no such table")
                || (msg.contains("relation") && msg.contains("does not exist"))
        }
        _ => false,
    }
}
