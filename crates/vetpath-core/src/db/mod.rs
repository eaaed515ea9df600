//! Database layer for vetpath.

mod history;
mod records;
mod schema;

pub use history::*;
pub use records::*;
pub use schema::*;

use rusqlite::{Connection, Transaction, TransactionBehavior};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use crate::config::DatabaseConfig;

/// Database errors.
#[derive(Error, Debug)]
pub enum DbError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Constraint violation: {0}")]
    Constraint(String),
}

impl DbError {
    /// The SQLite message for a constraint violation, if this is one.
    pub fn constraint_message(&self) -> Option<String> {
        match self {
            DbError::Sqlite(rusqlite::Error::SqliteFailure(err, message))
                if err.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                Some(message.clone().unwrap_or_else(|| err.to_string()))
            }
            DbError::Constraint(message) => Some(message.clone()),
            _ => None,
        }
    }
}

pub type DbResult<T> = Result<T, DbError>;

/// Database connection wrapper.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open database at path, creating if needed.
    pub fn open<P: AsRef<Path>>(path: P) -> DbResult<Self> {
        let conn = Connection::open(path)?;
        let db = Self { conn };
        db.initialize()?;
        Ok(db)
    }

    /// Create in-memory database (for testing).
    pub fn open_in_memory() -> DbResult<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.initialize()?;
        Ok(db)
    }

    /// Open the database described by `config`.
    ///
    /// A missing path opens an in-memory database.
    pub fn open_with_config(config: &DatabaseConfig) -> DbResult<Self> {
        let db = match &config.path {
            Some(path) => Self::open(path)?,
            None => Self::open_in_memory()?,
        };
        db.conn
            .busy_timeout(Duration::from_millis(config.busy_timeout_ms))?;
        Ok(db)
    }

    /// Initialize schema.
    fn initialize(&self) -> DbResult<()> {
        self.conn.execute_batch(SCHEMA)?;
        Ok(())
    }

    /// Get raw connection (for advanced queries).
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Begin a transaction on the shared connection.
    ///
    /// Dropping the returned guard without committing rolls back.
    pub fn begin(&self) -> DbResult<Transaction<'_>> {
        Ok(self.conn.unchecked_transaction()?)
    }

    /// Begin a transaction that takes the write lock up front.
    ///
    /// Reads made inside it see the state the writes apply to; other
    /// connections wait (up to the busy timeout) until it ends.
    pub fn begin_immediate(&self) -> DbResult<Transaction<'_>> {
        Ok(Transaction::new_unchecked(
            &self.conn,
            TransactionBehavior::Immediate,
        )?)
    }
}
