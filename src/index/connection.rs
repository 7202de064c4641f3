//! Connection lifecycle: pragma configuration and mutex-guarded access
//! (grounded on the teacher's `storage/sqlite/connection.rs` —
//! `acquire_lock` with poison recovery, `configure_connection`).

use crate::error::IndexErrorKind;
use crate::Error;
use rusqlite::Connection;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Mutex-guarded single connection. The store is not safe for concurrent
/// writers (spec.md §4.4); every transaction goes through this lock.
pub struct Guarded {
    conn: Mutex<Connection>,
}

impl Guarded {
    /// Opens `path`, applying WAL journaling and the busy timeout from
    /// spec.md §4.4's durability section.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Index`] with [`IndexErrorKind::Schema`] if the
    /// connection cannot be opened or configured.
    pub fn open(path: &std::path::Path) -> Result<Self, Error> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                Error::index(IndexErrorKind::Schema, format!("failed to create data dir: {e}"))
            })?;
        }
        let conn = Connection::open(path)
            .map_err(|e| Error::index(IndexErrorKind::Schema, format!("failed to open index db: {e}")))?;
        configure_connection(&conn)?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    /// Opens an in-memory connection, used by tests.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Index`] if the connection cannot be configured.
    pub fn open_in_memory() -> Result<Self, Error> {
        let conn = Connection::open_in_memory()
            .map_err(|e| Error::index(IndexErrorKind::Schema, format!("failed to open index db: {e}")))?;
        configure_connection(&conn)?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    /// Acquires the connection lock, recovering from poison by logging and
    /// incrementing a metric rather than propagating the panic (grounded on
    /// the teacher's `acquire_lock`).
    pub fn acquire(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|poisoned: PoisonError<_>| {
            tracing::warn!("recovering from poisoned index mutex");
            metrics::counter!("index_mutex_poison_recovery_total").increment(1);
            poisoned.into_inner()
        })
    }
}

fn configure_connection(conn: &Connection) -> Result<(), Error> {
    conn.execute_batch(
        "PRAGMA journal_mode = WAL;
         PRAGMA synchronous = NORMAL;
         PRAGMA busy_timeout = 5000;
         PRAGMA foreign_keys = ON;",
    )
    .map_err(|e| Error::index(IndexErrorKind::Schema, format!("failed to configure connection: {e}")))
}
