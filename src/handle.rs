//! Lazily-initialized shared database handle.

use sea_orm::{ConnectOptions, Database, DatabaseConnection, DbErr};
use tokio::sync::OnceCell;

use crate::schema;

/// A shared, lazily-connected handle to the session database.
///
/// The first call to [`acquire`](StorageHandle::acquire) connects and runs
/// the schema bootstrap; every later call returns the same connection.
/// Initialization is single-flight: concurrent first callers trigger exactly
/// one initialization attempt and all observe its outcome. A failed attempt
/// is not cached, so the next `acquire` retries from scratch.
///
/// Intended to be shared process-wide behind an `Arc`, but always injected
/// explicitly so tests can give each case an isolated database.
#[derive(Debug)]
pub struct StorageHandle {
    source: Source,
    conn: OnceCell<DatabaseConnection>,
}

/// Where the connection comes from on first use.
#[derive(Debug)]
enum Source {
    Options(ConnectOptions),
    Connection(DatabaseConnection),
}

impl StorageHandle {
    /// Creates a handle that will connect with `options` on first use.
    ///
    /// Accepts anything convertible to [`ConnectOptions`], including a plain
    /// database URL string.
    pub fn new(options: impl Into<ConnectOptions>) -> Self {
        Self {
            source: Source::Options(options.into()),
            conn: OnceCell::new(),
        }
    }

    /// Wraps an already-established connection.
    ///
    /// The schema bootstrap still runs on the first [`acquire`], so a store
    /// built over an existing connection starts with its tables in place.
    ///
    /// [`acquire`]: StorageHandle::acquire
    pub fn from_connection(conn: DatabaseConnection) -> Self {
        Self {
            source: Source::Connection(conn),
            conn: OnceCell::new(),
        }
    }

    /// Returns the shared connection, connecting (if needed) and
    /// bootstrapping the schema on first call.
    pub async fn acquire(&self) -> Result<&DatabaseConnection, DbErr> {
        self.conn
            .get_or_try_init(|| async {
                let conn = match &self.source {
                    Source::Options(options) => Database::connect(options.clone()).await?,
                    Source::Connection(conn) => conn.clone(),
                };
                schema::ensure_schema(&conn).await?;
                Ok(conn)
            })
            .await
    }
}
