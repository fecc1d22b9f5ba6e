use std::sync::Arc;

use async_trait::async_trait;
use sea_orm::prelude::DateTimeWithTimeZone;
use sea_orm::sea_query::{Expr, OnConflict};
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter, Set};
use time::{Duration, OffsetDateTime};
use tracing::warn;

use crate::entity::session::{self, ActiveModel as SessionActiveModel, Entity as SessionEntity};
use crate::handle::StorageHandle;
use crate::schema;
use crate::session_store::{
    expiry_from, user_id, Error, ExpiredDeletion, Result, SessionState, SessionStore,
    DEFAULT_MAX_AGE,
};
use crate::user_sessions::{SeaOrmUserSessions, UserSessions};

/// A SQLite-backed session store using Sea-ORM.
///
/// `SqliteStore` implements the [`SessionStore`] middleware contract against
/// two tables: the authoritative `sessions` blob table, and a derived
/// `user_sessions` index that maps authenticated sessions to user ids for
/// user-centric queries. The index is maintained best-effort; its failures
/// never fail a primary operation.
///
/// Session state is serialized as JSON text for compatibility with external
/// inspection tooling.
///
/// # Usage
///
/// ```no_run
/// use sea_orm::Database;
/// use seaorm_session_store::SqliteStore;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let conn = Database::connect("sqlite://sessions.db?mode=rwc").await?;
/// let store = SqliteStore::new(conn);
/// # Ok(())
/// # }
/// ```
///
/// Or let the store connect lazily, sharing one handle process-wide:
///
/// ```no_run
/// use std::sync::Arc;
/// use seaorm_session_store::{SqliteStore, StorageHandle};
///
/// let handle = Arc::new(StorageHandle::new("sqlite://sessions.db?mode=rwc"));
/// let store = SqliteStore::with_handle(handle);
/// ```
///
/// # Database schema
///
/// | Column     | Type               | Description                      |
/// |------------|--------------------|----------------------------------|
/// | id         | TEXT (Primary Key) | Session ID                       |
/// | data       | TEXT               | JSON-serialized session state    |
/// | expires_at | DATETIME           | Expiration date of the session   |
/// | created_at | DATETIME           | Insertion timestamp              |
///
/// The table and its `expires_at` index are created automatically on first
/// use, and re-created if lost out of band: an operation that fails because
/// the table is missing bootstraps the schema and retries once.
///
/// # Error handling
///
/// - Database errors → [`Error::Backend`]
/// - Serialization errors → [`Error::Encode`]
/// - Deserialization errors → [`Error::Decode`]
///
/// Absent or expired sessions are `Ok(None)`, never errors.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    /// Shared, lazily-initialized database handle.
    handle: Arc<StorageHandle>,
    /// Collaborator maintaining the derived user-session index.
    user_sessions: Arc<dyn UserSessions>,
    /// Expiry applied when a state carries no max-age hint.
    default_max_age: Duration,
}

impl SqliteStore {
    /// Creates a store over an already-established connection.
    pub fn new(conn: DatabaseConnection) -> Self {
        Self::with_handle(Arc::new(StorageHandle::from_connection(conn)))
    }

    /// Creates a store over a shared [`StorageHandle`], connecting lazily on
    /// first use.
    pub fn with_handle(handle: Arc<StorageHandle>) -> Self {
        let user_sessions = Arc::new(SeaOrmUserSessions::new(Arc::clone(&handle)));
        Self {
            handle,
            user_sessions,
            default_max_age: DEFAULT_MAX_AGE,
        }
    }

    /// Substitutes the collaborator that maintains the user-session index.
    pub fn with_user_sessions(mut self, user_sessions: Arc<dyn UserSessions>) -> Self {
        self.user_sessions = user_sessions;
        self
    }

    /// Overrides the default expiry for states without a max-age hint.
    pub fn with_default_max_age(mut self, max_age: Duration) -> Self {
        self.default_max_age = max_age;
        self
    }

    async fn conn(&self) -> Result<&DatabaseConnection> {
        self.handle
            .acquire()
            .await
            .map_err(|e| Error::Backend(e.to_string()))
    }

    async fn bootstrap(&self) -> Result<()> {
        let conn = self.conn().await?;
        schema::ensure_schema(conn)
            .await
            .map_err(|e| Error::Backend(e.to_string()))
    }

    async fn load(&self, session_id: &str) -> Result<Option<SessionState>> {
        let conn = self.conn().await?;
        let now = to_database_time(OffsetDateTime::now_utc());

        let row = SessionEntity::find_by_id(session_id)
            .one(conn)
            .await
            .map_err(|e| Error::Backend(e.to_string()))?;

        let Some(row) = row else {
            return Ok(None);
        };

        // An expired row is logically absent; reclaim it eagerly, cascading
        // to the user-session index.
        if row.expires_at <= now {
            SessionEntity::delete_by_id(session_id)
                .exec(conn)
                .await
                .map_err(|e| Error::Backend(e.to_string()))?;
            self.drop_user_session(session_id).await;
            return Ok(None);
        }

        let state = serde_json::from_str(&row.data).map_err(|e| Error::Decode(e.to_string()))?;
        Ok(Some(state))
    }

    async fn store(&self, session_id: &str, state: &SessionState) -> Result<()> {
        let conn = self.conn().await?;
        let expires_at = expiry_from(state, self.default_max_age);
        let expires_db = to_database_time(expires_at);
        let data = serde_json::to_string(state).map_err(|e| Error::Encode(e.to_string()))?;

        // Single-statement insert-or-replace: concurrent writers to the same
        // id resolve last-writer-wins instead of racing a lookup. The
        // conflict clause leaves created_at untouched.
        let session_model = SessionActiveModel {
            id: Set(session_id.to_owned()),
            data: Set(data),
            expires_at: Set(expires_db),
            created_at: Set(Some(to_database_time(OffsetDateTime::now_utc()))),
        };
        SessionEntity::insert(session_model)
            .on_conflict(
                OnConflict::column(session::Column::Id)
                    .update_columns([session::Column::Data, session::Column::ExpiresAt])
                    .to_owned(),
            )
            .exec_without_returning(conn)
            .await
            .map_err(|e| Error::Backend(e.to_string()))?;

        self.sync_user_session(session_id, state, expires_at).await;
        Ok(())
    }

    /// Replaces the derived user-session record when the state names a user.
    /// Anonymous states leave the index untouched. Replacement is delete then
    /// insert, so a re-authentication under the same session id can never
    /// leave a stale user id behind.
    async fn sync_user_session(
        &self,
        session_id: &str,
        state: &SessionState,
        expires_at: OffsetDateTime,
    ) {
        let Some(user) = user_id(state) else {
            return;
        };
        self.drop_user_session(session_id).await;
        if let Err(err) = self
            .user_sessions
            .create_session(&user, session_id, expires_at)
            .await
        {
            warn!(session_id, user_id = %user, %err, "failed to record user session");
        }
    }

    /// Index deletions are best-effort; the blob table stays authoritative.
    async fn drop_user_session(&self, session_id: &str) {
        if let Err(err) = self.user_sessions.delete_session(session_id).await {
            warn!(session_id, %err, "failed to delete user session record");
        }
    }
}

#[async_trait]
impl SessionStore for SqliteStore {
    /// Loads a session, treating expired records as absent and removing them
    /// as a side effect. A missing table triggers one schema bootstrap and a
    /// transparent retry.
    async fn get(&self, session_id: &str) -> Result<Option<SessionState>> {
        match self.load(session_id).await {
            Err(err) if schema::is_missing_table(&err) => {
                self.bootstrap().await?;
                self.load(session_id).await
            }
            other => other,
        }
    }

    /// Upserts the session record and synchronizes the user-session index.
    ///
    /// The expiry is now plus the state's `cookie.maxAge` hint (milliseconds),
    /// or the default max age when the hint is absent. The two table writes
    /// are separate autocommitting statements; on failure the caller must not
    /// assume the index write was rolled back.
    async fn set(&self, session_id: &str, state: &SessionState) -> Result<()> {
        match self.store(session_id, state).await {
            Err(err) if schema::is_missing_table(&err) => {
                self.bootstrap().await?;
                self.store(session_id, state).await
            }
            other => other,
        }
    }

    /// Deletes the session and, best-effort, its user-session record.
    /// Destroying a nonexistent session succeeds silently.
    async fn destroy(&self, session_id: &str) -> Result<()> {
        let conn = self.conn().await?;
        SessionEntity::delete_by_id(session_id)
            .exec(conn)
            .await
            .map_err(|e| Error::Backend(e.to_string()))?;
        self.drop_user_session(session_id).await;
        Ok(())
    }

    /// Moves the session's expiry forward without rewriting its data. A
    /// nonexistent session is a no-op.
    async fn touch(&self, session_id: &str, state: &SessionState) -> Result<()> {
        let conn = self.conn().await?;
        let expires_at = expiry_from(state, self.default_max_age);

        SessionEntity::update_many()
            .col_expr(
                session::Column::ExpiresAt,
                Expr::value(to_database_time(expires_at)),
            )
            .filter(session::Column::Id.eq(session_id))
            .exec(conn)
            .await
            .map_err(|e| Error::Backend(e.to_string()))?;

        self.sync_user_session(session_id, state, expires_at).await;
        Ok(())
    }

    async fn length(&self) -> Result<u64> {
        let conn = self.conn().await?;
        let now = to_database_time(OffsetDateTime::now_utc());

        SessionEntity::find()
            .filter(session::Column::ExpiresAt.gt(now))
            .count(conn)
            .await
            .map_err(|e| Error::Backend(e.to_string()))
    }

    /// Deletes every session and every user-session record. Administrative
    /// reset only.
    async fn clear(&self) -> Result<()> {
        let conn = self.conn().await?;
        SessionEntity::delete_many()
            .exec(conn)
            .await
            .map_err(|e| Error::Backend(e.to_string()))?;
        if let Err(err) = self.user_sessions.clear().await {
            warn!(%err, "failed to clear user session records");
        }
        Ok(())
    }
}

#[async_trait]
impl ExpiredDeletion for SqliteStore {
    async fn delete_expired(&self) -> Result<()> {
        let conn = self.conn().await?;
        let now = to_database_time(OffsetDateTime::now_utc());

        SessionEntity::delete_many()
            .filter(session::Column::ExpiresAt.lt(now))
            .exec(conn)
            .await
            .map_err(|e| Error::Backend(e.to_string()))?;

        Ok(())
    }
}

// Helper to convert time::OffsetDateTime to sea_orm::prelude::DateTimeWithTimeZone (chrono)
pub(crate) fn to_database_time(time: OffsetDateTime) -> DateTimeWithTimeZone {
    use chrono::{DateTime, Utc};

    DateTime::from_timestamp(time.unix_timestamp(), time.nanosecond())
        .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
        .into()
}
