//! Pool connection manager that tracks isolation state.
//!
//! Each pooled connection gets a private `temp.isolation_scope` table when
//! it is opened. A scoped session writes one row into it while it runs and
//! deletes the row when it ends. The pool hooks use that table to make sure
//! a connection never changes hands with a scope still set:
//!
//! - `is_valid` (checkout) refuses a connection with a scope row.
//! - `has_broken` (checkin) discards a connection with a scope row.

use std::time::Duration;

use r2d2::ManageConnection;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::Connection;
use thiserror::Error;

/// DDL for the per-connection filter table.
///
/// `TEMP` tables are private to the connection that created them, so the
/// filter state of one pooled connection is invisible to every other.
pub(crate) const SCOPE_TABLE_DDL: &str = "
    CREATE TEMP TABLE IF NOT EXISTS isolation_scope (
        tenant_id INTEGER,
        privileged INTEGER NOT NULL DEFAULT 0,
        CHECK (
            (privileged = 1 AND tenant_id IS NULL)
            OR (privileged = 0 AND tenant_id > 0)
        )
    );
";

/// Errors raised while opening or checking a pooled connection.
#[derive(Debug, Error)]
pub enum ScopedConnectionError {
    /// The underlying SQLite call failed.
    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),

    /// The connection still carried a scope at checkout.
    #[error("pooled connection still carries {rows} isolation scope row(s)")]
    StaleScope { rows: i64 },
}

/// r2d2 manager wrapping [`SqliteConnectionManager`] with isolation hooks.
pub struct ScopedConnectionManager {
    inner: SqliteConnectionManager,
    busy_timeout: Duration,
    enable_foreign_keys: bool,
}

impl ScopedConnectionManager {
    /// Creates a manager for a database file or `:memory:`.
    pub fn new(
        inner: SqliteConnectionManager,
        busy_timeout: Duration,
        enable_foreign_keys: bool,
    ) -> Self {
        Self {
            inner,
            busy_timeout,
            enable_foreign_keys,
        }
    }
}

impl std::fmt::Debug for ScopedConnectionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScopedConnectionManager")
            .field("busy_timeout", &self.busy_timeout)
            .field("enable_foreign_keys", &self.enable_foreign_keys)
            .finish_non_exhaustive()
    }
}

impl ManageConnection for ScopedConnectionManager {
    type Connection = Connection;
    type Error = ScopedConnectionError;

    fn connect(&self) -> Result<Connection, Self::Error> {
        let conn = self.inner.connect()?;
        conn.busy_timeout(self.busy_timeout)?;
        if self.enable_foreign_keys {
            conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        }
        conn.execute_batch(SCOPE_TABLE_DDL)?;
        Ok(conn)
    }

    fn is_valid(&self, conn: &mut Connection) -> Result<(), Self::Error> {
        self.inner.is_valid(conn)?;
        match scope_rows(conn)? {
            0 => Ok(()),
            rows => Err(ScopedConnectionError::StaleScope { rows }),
        }
    }

    fn has_broken(&self, conn: &mut Connection) -> bool {
        !matches!(scope_rows(conn), Ok(0))
    }
}

/// Counts the scope rows currently set on a connection.
pub(crate) fn scope_rows(conn: &Connection) -> rusqlite::Result<i64> {
    conn.query_row("SELECT COUNT(*) FROM temp.isolation_scope", [], |row| {
        row.get(0)
    })
}
