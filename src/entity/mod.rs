//! Sea-ORM entity models for the two session tables.
//!
//! The `sessions` table is the authoritative store of serialized session
//! state; `user_sessions` is the derived user-centric index maintained
//! best-effort alongside it. Both are created on demand by the schema
//! bootstrapper.

pub mod session;
pub mod user_session;
