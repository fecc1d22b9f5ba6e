//! Entity for the bundled user-session index table.

use sea_orm::entity::prelude::*;

/// A row of the `user_sessions` table: the application-level "who is logged
/// in" record for one session.
///
/// This table is a derived, best-effort projection of the authoritative
/// `sessions` table. At most one row exists per session id at any time; on
/// re-authentication the row is replaced (delete then insert), never updated
/// in place.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "user_sessions")]
pub struct Model {
    /// Session id this record is derived from.
    #[sea_orm(primary_key, auto_increment = false, column_type = "Text")]
    pub session_id: String,

    /// Identifier of the authenticated principal.
    #[sea_orm(column_type = "Text")]
    pub user_id: String,

    /// Kept in lockstep with the blob row's expiry on every write and touch.
    pub expires_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
