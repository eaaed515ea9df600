//! Scoped case-number uniqueness.
//!
//! The pre-check only produces a specific error early. Correctness comes from
//! the `(owner_id, case_number)` unique index: a writer that loses a race
//! still gets [`LedgerError::DuplicateKey`] through [`UniquenessGuard::translate`].

use log::warn;

use super::LedgerError;
use crate::db::{Database, DbError};

/// Marker SQLite puts in the message when the scoped key index rejects a row.
const CASE_KEY_CONSTRAINT: &str = "case_records.owner_id, case_records.case_number";

/// Enforces `(owner_id, case_number)` uniqueness.
pub struct UniquenessGuard<'a> {
    db: &'a Database,
}

impl<'a> UniquenessGuard<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// Fail early if the owner already has a record (active or deleted) with this case number.
    pub fn precheck(&self, owner_id: &str, case_number: &str) -> Result<(), LedgerError> {
        match self.db.find_case_record_by_case_number(owner_id, case_number)? {
            Some(_) => Err(duplicate(owner_id, case_number)),
            None => Ok(()),
        }
    }

    /// Classify a storage error raised while writing `(owner_id, case_number)`.
    pub fn translate(&self, err: DbError, owner_id: &str, case_number: &str) -> LedgerError {
        match err.constraint_message() {
            Some(message) if message.contains(CASE_KEY_CONSTRAINT) => {
                warn!(
                    "event=duplicate_case_number source=storage owner_id={}",
                    owner_id
                );
                duplicate(owner_id, case_number)
            }
            Some(message) => LedgerError::Conflict(message),
            None => err.into(),
        }
    }
}

fn duplicate(owner_id: &str, case_number: &str) -> LedgerError {
    LedgerError::DuplicateKey {
        owner_id: owner_id.to_string(),
        case_number: case_number.to_string(),
    }
}
