//! The "user/session" collaborator seam.
//!
//! The application keeps a user-centric index of authenticated sessions,
//! separate from the opaque blob table the middleware requires. The store
//! drives that index through the [`UserSessions`] trait and treats it as
//! derived state: calls are best-effort, and a failure is logged rather than
//! allowed to fail the primary operation.

use std::fmt::Debug;
use std::sync::Arc;

use async_trait::async_trait;
use sea_orm::{ActiveModelTrait, EntityTrait, Set};
use time::OffsetDateTime;

use crate::entity::user_session::{
    ActiveModel as UserSessionActiveModel, Entity as UserSessionEntity,
};
use crate::handle::StorageHandle;
use crate::session_store::{Error, Result};
use crate::sqlite_store::to_database_time;

/// Operations the store assumes the application's user-session collaborator
/// exposes.
///
/// At most one record may exist per session id at a time; the store
/// guarantees this by always calling [`delete_session`] before
/// [`create_session`] when a session re-authenticates.
///
/// [`delete_session`]: UserSessions::delete_session
/// [`create_session`]: UserSessions::create_session
#[async_trait]
pub trait UserSessions: Debug + Send + Sync {
    /// Records that `user_id` is authenticated under `session_id` until
    /// `expires_at`.
    async fn create_session(
        &self,
        user_id: &str,
        session_id: &str,
        expires_at: OffsetDateTime,
    ) -> Result<()>;

    /// Removes the record for `session_id`. Absence is not an error.
    async fn delete_session(&self, session_id: &str) -> Result<()>;

    /// Removes every record. Administrative reset only.
    async fn clear(&self) -> Result<()>;
}

/// Default [`UserSessions`] implementation backed by the bundled
/// `user_sessions` table, sharing the store's database handle.
#[derive(Debug, Clone)]
pub struct SeaOrmUserSessions {
    handle: Arc<StorageHandle>,
}

impl SeaOrmUserSessions {
    pub fn new(handle: Arc<StorageHandle>) -> Self {
        Self { handle }
    }
}

#[async_trait]
impl UserSessions for SeaOrmUserSessions {
    async fn create_session(
        &self,
        user_id: &str,
        session_id: &str,
        expires_at: OffsetDateTime,
    ) -> Result<()> {
        let conn = self
            .handle
            .acquire()
            .await
            .map_err(|e| Error::Backend(e.to_string()))?;

        let record = UserSessionActiveModel {
            session_id: Set(session_id.to_owned()),
            user_id: Set(user_id.to_owned()),
            expires_at: Set(to_database_time(expires_at)),
        };
        record
            .insert(conn)
            .await
            .map_err(|e| Error::Backend(e.to_string()))?;

        Ok(())
    }

    async fn delete_session(&self, session_id: &str) -> Result<()> {
        let conn = self
            .handle
            .acquire()
            .await
            .map_err(|e| Error::Backend(e.to_string()))?;

        UserSessionEntity::delete_by_id(session_id)
            .exec(conn)
            .await
            .map_err(|e| Error::Backend(e.to_string()))?;

        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        let conn = self
            .handle
            .acquire()
            .await
            .map_err(|e| Error::Backend(e.to_string()))?;

        UserSessionEntity::delete_many()
            .exec(conn)
            .await
            .map_err(|e| Error::Backend(e.to_string()))?;

        Ok(())
    }
}
