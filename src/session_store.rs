//! The session-middleware storage contract.
//!
//! The hosting middleware expects a store exposing five operations (`get`,
//! `set`, `destroy`, `touch`, `length`) plus an administrative `clear`. Any
//! backend implementing [`SessionStore`] can be plugged in; this crate ships
//! [`SqliteStore`](crate::SqliteStore) for durable storage and
//! [`MemoryStore`](crate::MemoryStore) as a lightweight fake for tests.

use std::fmt::Debug;

use async_trait::async_trait;
use time::{Duration, OffsetDateTime};

/// Session state as seen by the store: an arbitrary JSON mapping owned by the
/// middleware. The store treats it as opaque except for two well-known
/// fields, the `cookie.maxAge` expiry hint and the authenticated user
/// identifier (see [`max_age`] and [`user_id`]).
pub type SessionState = serde_json::Value;

/// Expiry applied when the session state carries no `cookie.maxAge` hint.
pub const DEFAULT_MAX_AGE: Duration = Duration::days(7);

/// Session storage error.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Session state could not be serialized for storage.
    #[error("encode error: {0}")]
    Encode(String),

    /// A stored record could not be deserialized. Surfaced distinctly so the
    /// middleware can treat the session as invalid instead of failing the
    /// request.
    #[error("corrupt session record: {0}")]
    Decode(String),

    /// An error from the underlying storage engine.
    #[error("storage backend error: {0}")]
    Backend(String),
}

/// Session storage result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Storage backend contract required by the session middleware.
///
/// Absent or expired sessions are reported as `Ok(None)` from [`get`], never
/// as errors. Implementations must make [`destroy`] idempotent.
///
/// [`get`]: SessionStore::get
/// [`destroy`]: SessionStore::destroy
#[async_trait]
pub trait SessionStore: Debug + Send + Sync + 'static {
    /// Loads the state for `session_id`, or `None` if the session does not
    /// exist or has expired.
    async fn get(&self, session_id: &str) -> Result<Option<SessionState>>;

    /// Persists `state` under `session_id`, creating or replacing the record.
    async fn set(&self, session_id: &str, state: &SessionState) -> Result<()>;

    /// Deletes the session. Succeeds silently if it does not exist.
    async fn destroy(&self, session_id: &str) -> Result<()>;

    /// Pushes the session's expiry forward based on the state's max-age hint
    /// without rewriting the stored state.
    async fn touch(&self, session_id: &str, state: &SessionState) -> Result<()>;

    /// Number of sessions whose expiry is still in the future. A
    /// point-in-time snapshot, not consistent with concurrent writers.
    async fn length(&self) -> Result<u64>;

    /// Deletes every session unconditionally. Administrative use only.
    async fn clear(&self) -> Result<()>;
}

/// Bulk removal of expired sessions.
///
/// Expired records are already invisible to [`SessionStore::get`] and removed
/// lazily when read; this trait lets an application reclaim storage for
/// sessions that are never read again.
#[async_trait]
pub trait ExpiredDeletion {
    /// Deletes all session records whose expiry is in the past.
    async fn delete_expired(&self) -> Result<()>;
}

/// Extracts the `cookie.maxAge` hint (milliseconds) from a session state.
pub fn max_age(state: &SessionState) -> Option<Duration> {
    let max_age = state.get("cookie")?.get("maxAge")?;
    let millis = max_age
        .as_i64()
        .or_else(|| max_age.as_f64().map(|f| f as i64))?;
    Some(Duration::milliseconds(millis))
}

/// Computes the absolute expiry for a session state: now plus its max-age
/// hint, falling back to `default_max_age`.
pub fn expiry_from(state: &SessionState, default_max_age: Duration) -> OffsetDateTime {
    OffsetDateTime::now_utc() + max_age(state).unwrap_or(default_max_age)
}

/// Extracts the authenticated user identifier from a session state.
///
/// Reads a top-level `userId`, falling back to `passport.user` for
/// passport-style login flows. Numeric identifiers are rendered as their
/// decimal string.
pub fn user_id(state: &SessionState) -> Option<String> {
    let value = state
        .get("userId")
        .or_else(|| state.get("passport")?.get("user"))?;
    match value {
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
