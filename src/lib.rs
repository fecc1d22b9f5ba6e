//! # Persistent session store for Sea-ORM
//!
//! A durable session store for web applications, backed by an embedded SQL
//! database through [Sea-ORM](https://crates.io/crates/sea-orm). Sessions
//! survive server restarts, expire on a sliding window, and authenticated
//! sessions are mirrored into a user-centric index table for application
//! queries.
//!
//! ## Features
//!
//! - Persistent session storage in SQLite (PostgreSQL behind the `postgres`
//!   feature)
//! - Lazy, single-flight database initialization with automatic schema
//!   bootstrap, self-healing if the schema is lost out of band
//! - A derived `user_sessions` index kept in lockstep with authenticated
//!   writes, maintained best-effort so it can never fail a request
//! - JSON serialization of session state for easy external inspection
//! - An in-memory [`MemoryStore`] fake for tests
//!
//! ## Quick start
//!
//! ```no_run
//! use std::sync::Arc;
//! use seaorm_session_store::{SessionStore, SqliteStore, StorageHandle};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! // The handle connects and bootstraps the schema on first use.
//! let handle = Arc::new(StorageHandle::new("sqlite://sessions.db?mode=rwc"));
//! let store = SqliteStore::with_handle(handle);
//!
//! // The middleware drives the store through the SessionStore contract.
//! let state = serde_json::json!({
//!     "cookie": { "maxAge": 86_400_000 },
//!     "userId": "u1",
//! });
//! store.set("session-id", &state).await?;
//!
//! let loaded = store.get("session-id").await?;
//! assert_eq!(loaded, Some(state));
//! # Ok(())
//! # }
//! ```
//!
//! ## Session state
//!
//! The store treats session state as an opaque JSON mapping, except for two
//! well-known fields: `cookie.maxAge` (expiry hint in milliseconds, default
//! seven days) and the authenticated user identifier (`userId`, or
//! `passport.user` for passport-style flows). States carrying a user
//! identifier populate the `user_sessions` index; anonymous states do not.

pub mod entity;
mod handle;
mod memory_store;
pub mod schema;
pub mod session_store;
mod sqlite_store;
mod user_sessions;

/// The SQL-backed session store. See [`SqliteStore`] for usage details.
pub use sqlite_store::SqliteStore;

/// Lazily-initialized shared database handle with single-flight setup.
pub use handle::StorageHandle;

/// In-memory store fake for tests.
pub use memory_store::MemoryStore;

/// The middleware storage contract and error taxonomy.
pub use session_store::{
    Error, ExpiredDeletion, Result, SessionState, SessionStore, DEFAULT_MAX_AGE,
};

/// The user-session collaborator seam and its bundled implementation.
pub use user_sessions::{SeaOrmUserSessions, UserSessions};
