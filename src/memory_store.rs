//! In-memory session store for tests.

use std::collections::HashMap;

use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::Mutex;

use crate::session_store::{
    expiry_from, user_id, ExpiredDeletion, Result, SessionState, SessionStore, DEFAULT_MAX_AGE,
};

/// A non-persistent [`SessionStore`] holding everything in process memory.
///
/// Honors the same contract as [`SqliteStore`](crate::SqliteStore), including
/// expiry enforcement and the derived user-session index, but loses all state
/// on drop. Intended as a drop-in fake for consumers' tests.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    sessions: HashMap<String, StoredSession>,
    user_sessions: HashMap<String, String>,
}

#[derive(Debug, Clone)]
struct StoredSession {
    state: SessionState,
    expires_at: OffsetDateTime,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// User id currently indexed for `session_id`, if any. Test hook.
    pub async fn user_id_for(&self, session_id: &str) -> Option<String> {
        self.inner.lock().await.user_sessions.get(session_id).cloned()
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn get(&self, session_id: &str) -> Result<Option<SessionState>> {
        let now = OffsetDateTime::now_utc();
        let mut inner = self.inner.lock().await;
        let Some(stored) = inner.sessions.get(session_id) else {
            return Ok(None);
        };
        if stored.expires_at > now {
            return Ok(Some(stored.state.clone()));
        }
        inner.sessions.remove(session_id);
        inner.user_sessions.remove(session_id);
        Ok(None)
    }

    async fn set(&self, session_id: &str, state: &SessionState) -> Result<()> {
        let expires_at = expiry_from(state, DEFAULT_MAX_AGE);
        let mut inner = self.inner.lock().await;
        inner.sessions.insert(
            session_id.to_owned(),
            StoredSession {
                state: state.clone(),
                expires_at,
            },
        );
        if let Some(user) = user_id(state) {
            inner.user_sessions.insert(session_id.to_owned(), user);
        }
        Ok(())
    }

    async fn destroy(&self, session_id: &str) -> Result<()> {
        let mut inner = self.inner.lock().await;
        inner.sessions.remove(session_id);
        inner.user_sessions.remove(session_id);
        Ok(())
    }

    async fn touch(&self, session_id: &str, state: &SessionState) -> Result<()> {
        let expires_at = expiry_from(state, DEFAULT_MAX_AGE);
        let mut inner = self.inner.lock().await;
        if let Some(stored) = inner.sessions.get_mut(session_id) {
            stored.expires_at = expires_at;
        }
        Ok(())
    }

    async fn length(&self) -> Result<u64> {
        let now = OffsetDateTime::now_utc();
        let inner = self.inner.lock().await;
        Ok(inner
            .sessions
            .values()
            .filter(|s| s.expires_at > now)
            .count() as u64)
    }

    async fn clear(&self) -> Result<()> {
        let mut inner = self.inner.lock().await;
        inner.sessions.clear();
        inner.user_sessions.clear();
        Ok(())
    }
}

#[async_trait]
impl ExpiredDeletion for MemoryStore {
    async fn delete_expired(&self) -> Result<()> {
        let now = OffsetDateTime::now_utc();
        let mut inner = self.inner.lock().await;
        inner.sessions.retain(|_, s| s.expires_at > now);
        Ok(())
    }
}
