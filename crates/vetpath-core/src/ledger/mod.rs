//! Case record lifecycle and audit ledger.
//!
//! [`CaseLedger`] is the entry point used by the routing layer. Each operation
//! takes an already-resolved owner identity.
//!
//! Update protocol, in order, under the database write lock:
//! 1. load the record (`NotFound`)
//! 2. authorize the caller against its owner (`Forbidden`)
//! 3. merge and validate the patch (`Validation`), nothing written yet
//! 4. append the pre-update snapshot to history
//! 5. apply the update
//!
//! All steps share one transaction; the update never lands without its
//! history entry, and concurrent writers queue instead of merging into
//! stale state.

mod audit;
mod guard;
mod lifecycle;
mod patch;

pub use audit::HistoryLedger;
pub use guard::UniquenessGuard;
pub use lifecycle::{Lifecycle, LifecycleState, LifecycleTransition, Transition};
pub use patch::apply_merge_patch;

use log::info;
use thiserror::Error;

use crate::config::HistoryConfig;
use crate::db::{Database, DbError, LifecycleFilter};
use crate::models::{
    timestamp_now, validate_fields, CaseRecord, ClinicalFields, HistoryAudit, HistoryEntry,
    SweepReport, ValidationError,
};

/// Ledger errors, one variant per outcome the routing layer maps.
#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("Case number '{case_number}' already exists for owner {owner_id}")]
    DuplicateKey {
        owner_id: String,
        case_number: String,
    },

    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Record {record_id} belongs to another owner")]
    Forbidden { record_id: String },

    #[error("Conflicting write: {0}")]
    Conflict(String),

    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),
}

impl From<DbError> for LedgerError {
    fn from(e: DbError) -> Self {
        match e {
            DbError::NotFound(id) => LedgerError::NotFound(id),
            other => match other.constraint_message() {
                Some(message) => LedgerError::Conflict(message),
                None => LedgerError::StorageUnavailable(other.to_string()),
            },
        }
    }
}

impl From<rusqlite::Error> for LedgerError {
    fn from(e: rusqlite::Error) -> Self {
        DbError::from(e).into()
    }
}

impl From<serde_json::Error> for LedgerError {
    fn from(e: serde_json::Error) -> Self {
        DbError::from(e).into()
    }
}

pub type LedgerResult<T> = Result<T, LedgerError>;

/// Result of a successful update.
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateOutcome {
    pub record: CaseRecord,
    /// Version of the history entry holding the pre-update state
    pub version: u32,
}

/// Per-owner record counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecordCounts {
    pub active: u64,
    pub deleted: u64,
    pub total: u64,
}

/// Case record operations over one database.
pub struct CaseLedger<'a> {
    db: &'a Database,
    history: HistoryConfig,
}

impl<'a> CaseLedger<'a> {
    /// Create a ledger with explicit history settings.
    pub fn new(db: &'a Database, history: HistoryConfig) -> Self {
        Self { db, history }
    }

    /// Create a ledger with default history settings.
    pub fn with_defaults(db: &'a Database) -> Self {
        Self::new(db, HistoryConfig::default())
    }

    // =========================================================================
    // Record Store
    // =========================================================================

    /// Create a record for `owner_id`.
    pub fn create_record(&self, owner_id: &str, fields: ClinicalFields) -> LedgerResult<CaseRecord> {
        if owner_id.trim().is_empty() {
            return Err(ValidationError::new("owner_id", "is required").into());
        }
        let fields = fields.normalized();
        validate_fields(&fields)?;

        let guard = UniquenessGuard::new(self.db);
        guard.precheck(owner_id, &fields.case_number)?;

        let record = CaseRecord::new(owner_id, fields);
        self.db
            .insert_case_record(&record)
            .map_err(|e| guard.translate(e, owner_id, record.case_number()))?;

        info!(
            "event=record_created record_id={} owner_id={}",
            record.id, owner_id
        );
        Ok(record)
    }

    /// An owner's active records, newest first.
    pub fn list_active(&self, owner_id: &str) -> LedgerResult<Vec<CaseRecord>> {
        Ok(self.db.list_case_records(owner_id, LifecycleFilter::Active)?)
    }

    /// An owner's soft-deleted records, newest first.
    pub fn list_deleted(&self, owner_id: &str) -> LedgerResult<Vec<CaseRecord>> {
        Ok(self.db.list_case_records(owner_id, LifecycleFilter::Deleted)?)
    }

    /// How many records an owner has in each lifecycle state.
    pub fn record_counts(&self, owner_id: &str) -> LedgerResult<RecordCounts> {
        Ok(RecordCounts {
            active: self.db.count_case_records(owner_id, LifecycleFilter::Active)?,
            deleted: self.db.count_case_records(owner_id, LifecycleFilter::Deleted)?,
            total: self.db.count_case_records(owner_id, LifecycleFilter::All)?,
        })
    }

    /// Fetch a record the caller owns, in any soft lifecycle state.
    pub fn get_record(&self, id: &str, caller_id: &str) -> LedgerResult<CaseRecord> {
        self.load_authorized(id, caller_id)
    }

    /// Merge `patch` into a record, recording the prior state first.
    pub fn update_record(
        &self,
        id: &str,
        caller_id: &str,
        patch: &serde_json::Value,
        change_reason: Option<&str>,
    ) -> LedgerResult<UpdateOutcome> {
        // Write lock first: the snapshot and the merge base are the state the update replaces
        let tx = self.db.begin_immediate()?;
        let current = self.load_authorized(id, caller_id)?;

        let merged = apply_merge_patch(&current.fields, patch)?.normalized();
        validate_fields(&merged)?;

        let guard = UniquenessGuard::new(self.db);
        let key_changed = merged.case_number != current.fields.case_number;
        if key_changed {
            guard.precheck(&current.owner_id, &merged.case_number)?;
        }

        let reason = change_reason
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .unwrap_or(self.history.default_change_reason.as_str());

        let entry = HistoryLedger::new(self.db).append(&current.id, &current.fields, reason, caller_id)?;

        let updated_at = timestamp_now();
        let applied = self
            .db
            .update_case_fields(&current.id, &merged, &updated_at)
            .map_err(|e| guard.translate(e, &current.owner_id, &merged.case_number))?;
        if !applied {
            return Err(LedgerError::NotFound(current.id));
        }
        tx.commit()?;

        info!(
            "event=record_updated record_id={} version={} key_changed={}",
            current.id, entry.version, key_changed
        );
        Ok(UpdateOutcome {
            record: CaseRecord {
                fields: merged,
                updated_at,
                ..current
            },
            version: entry.version,
        })
    }

    // =========================================================================
    // History Ledger
    // =========================================================================

    /// A record's history, newest first. Empty for unknown or erased records.
    pub fn get_history(&self, record_id: &str) -> LedgerResult<Vec<HistoryEntry>> {
        HistoryLedger::new(self.db).history(record_id)
    }

    /// One snapshot by version.
    pub fn get_history_version(
        &self,
        record_id: &str,
        version: u32,
    ) -> LedgerResult<Option<HistoryEntry>> {
        HistoryLedger::new(self.db).entry(record_id, version)
    }

    /// Check a record's history for tampering and gaps.
    pub fn verify_history(&self, record_id: &str) -> LedgerResult<HistoryAudit> {
        HistoryLedger::new(self.db).verify(record_id)
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Hide a record from active listings. No-op when already deleted.
    pub fn soft_delete(&self, id: &str, caller_id: &str) -> LedgerResult<()> {
        let record = self.load_authorized(id, caller_id)?;
        Lifecycle::new(self.db).transition(&record, LifecycleTransition::SoftDelete)?;
        Ok(())
    }

    /// Bring a soft-deleted record back. No-op when already active.
    pub fn restore(&self, id: &str, caller_id: &str) -> LedgerResult<()> {
        let record = self.load_authorized(id, caller_id)?;
        Lifecycle::new(self.db).transition(&record, LifecycleTransition::Restore)?;
        Ok(())
    }

    /// Permanently erase a record and its entire history.
    pub fn hard_delete(&self, id: &str, caller_id: &str) -> LedgerResult<()> {
        let record = self.load_authorized(id, caller_id)?;
        Lifecycle::new(self.db).erase(&record)?;
        Ok(())
    }

    // =========================================================================
    // Maintenance
    // =========================================================================

    /// Remove history left behind by records that no longer exist.
    pub fn sweep_orphaned_history(&self) -> LedgerResult<SweepReport> {
        let (removed_entries, removed_counters) = self.db.delete_orphaned_history()?;
        if removed_entries > 0 || removed_counters > 0 {
            info!(
                "event=orphan_sweep entries={} counters={}",
                removed_entries, removed_counters
            );
        }
        Ok(SweepReport {
            removed_entries,
            removed_counters,
        })
    }

    fn load_authorized(&self, id: &str, caller_id: &str) -> LedgerResult<CaseRecord> {
        let record = self
            .db
            .get_case_record(id)?
            .ok_or_else(|| LedgerError::NotFound(id.to_string()))?;
        if !record.is_owned_by(caller_id) {
            return Err(LedgerError::Forbidden {
                record_id: record.id,
            });
        }
        Ok(record)
    }
}
