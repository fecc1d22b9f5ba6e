//! Entity for the authoritative session-blob table.

use sea_orm::entity::prelude::*;

/// A row of the `sessions` table: one serialized session record.
///
/// | Column     | Type               | Description                         |
/// |------------|--------------------|-------------------------------------|
/// | id         | TEXT (Primary Key) | Opaque middleware session ID        |
/// | data       | TEXT               | JSON-serialized session state       |
/// | expires_at | DATETIME           | Absolute expiry; governs visibility |
/// | created_at | DATETIME           | Set once on insert, informational   |
///
/// A row whose `expires_at` is in the past is logically absent: readers treat
/// it as nonexistent and remove it eagerly.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "sessions")]
pub struct Model {
    /// Opaque session identifier generated by the hosting middleware.
    #[sea_orm(primary_key, auto_increment = false, column_type = "Text")]
    pub id: String,

    /// JSON serialization of the session state, opaque to the store.
    #[sea_orm(column_type = "Text")]
    pub data: String,

    /// When the session stops being visible to readers.
    pub expires_at: DateTimeWithTimeZone,

    /// Insertion timestamp, never updated afterwards.
    pub created_at: Option<DateTimeWithTimeZone>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
