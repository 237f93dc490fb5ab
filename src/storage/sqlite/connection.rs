//! Connection handling for the `SQLite` record store.

use crate::{Error, Result};
use rusqlite::Connection;
use std::sync::{Mutex, MutexGuard};

/// Acquires the connection mutex, recovering from poison.
///
/// A panic inside a previous critical section leaves the connection usable;
/// the poison is logged and counted, then the guard is returned.
pub fn acquire_lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => {
            tracing::warn!("SQLite mutex was poisoned, recovering");
            metrics::counter!("sqlite_mutex_poison_recovery_total").increment(1);
            poisoned.into_inner()
        },
    }
}

/// Configures a connection for concurrent use.
///
/// - **WAL mode**: concurrent readers with a single writer
/// - **NORMAL synchronous**
/// - **`busy_timeout`** of 5 seconds, so competing handles on the same file
///   wait for the write lock instead of failing with `SQLITE_BUSY`
///
/// Foreign keys stay off: deleting a student or class must not cascade.
///
/// # Errors
///
/// Returns [`Error::OperationFailed`] if the busy timeout cannot be set.
pub fn configure_connection(conn: &Connection) -> Result<()> {
    // journal_mode answers with a row ("wal" or "memory"), so its result is ignored
    let _ = conn.pragma_update(None, "journal_mode", "WAL");
    let _ = conn.pragma_update(None, "synchronous", "NORMAL");
    conn.pragma_update(None, "busy_timeout", "5000")
        .map_err(|e| Error::OperationFailed {
            operation: "configure_sqlite".to_string(),
            cause: e.to_string(),
        })
}

/// Maps a `rusqlite` error to a crate error.
///
/// Unique-constraint violations become [`Error::Conflict`]; everything else is
/// [`Error::OperationFailed`] tagged with `operation`.
pub fn map_sqlite_error(operation: &str, err: &rusqlite::Error) -> Error {
    if let rusqlite::Error::SqliteFailure(failure, message) = err
        && failure.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
    {
        return Error::Conflict(
            message
                .clone()
                .unwrap_or_else(|| "unique constraint violated".to_string()),
        );
    }
    Error::OperationFailed {
        operation: operation.to_string(),
        cause: err.to_string(),
    }
}
