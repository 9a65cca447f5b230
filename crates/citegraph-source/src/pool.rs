//! SQLite connection handle and source error types.

use std::path::Path;

use parking_lot::Mutex;
use rusqlite::{Connection, OpenFlags};
use thiserror::Error;

/// Errors raised by the relational source.
#[derive(Error, Debug)]
pub enum SourceError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Row {row} of query '{query}' cannot be mapped: {message}")]
    DataShape {
        query: &'static str,
        row: usize,
        message: String,
    },

    #[error("Migration error: {0}")]
    Migration(String),
}

/// Result type for source operations.
pub type SourceResult<T> = Result<T, SourceError>;

impl SourceError {
    /// Classify a row-mapping failure: type mismatches are data-shape errors,
    /// everything else stays a plain SQLite error.
    pub(crate) fn from_row_error(query: &'static str, row: usize, err: rusqlite::Error) -> Self {
        match err {
            rusqlite::Error::InvalidColumnType(..)
            | rusqlite::Error::FromSqlConversionFailure(..)
            | rusqlite::Error::IntegralValueOutOfRange(..)
            | rusqlite::Error::InvalidColumnIndex(..)
            | rusqlite::Error::InvalidColumnName(..) => Self::DataShape {
                query,
                row,
                message: err.to_string(),
            },
            other => Self::Sqlite(other),
        }
    }
}

/// A single SQLite connection shared behind a mutex.
pub struct SourcePool {
    conn: Mutex<Connection>,
}

impl SourcePool {
    /// Open an existing mirror read-only.
    pub fn open(path: impl AsRef<Path>) -> SourceResult<Self> {
        let conn = Connection::open_with_flags(
            path.as_ref(),
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        Ok(Self::from_connection(conn))
    }

    /// Open (or create) a writable mirror, e.g. to run migrations.
    pub fn create(path: impl AsRef<Path>) -> SourceResult<Self> {
        Ok(Self::from_connection(Connection::open(path.as_ref())?))
    }

    /// Fresh in-memory database.
    pub fn in_memory() -> SourceResult<Self> {
        Ok(Self::from_connection(Connection::open_in_memory()?))
    }

    fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(conn),
        }
    }

    /// Run a closure with shared access to the connection.
    pub fn with_conn<T, F>(&self, f: F) -> SourceResult<T>
    where
        F: FnOnce(&Connection) -> SourceResult<T>,
    {
        let conn = self.conn.lock();
        f(&conn)
    }

    /// Run a closure with exclusive access to the connection.
    pub fn with_conn_mut<T, F>(&self, f: F) -> SourceResult<T>
    where
        F: FnOnce(&mut Connection) -> SourceResult<T>,
    {
        let mut conn = self.conn.lock();
        f(&mut conn)
    }
}
