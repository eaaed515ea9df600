//! Vetpath Core Library
//!
//! Local-first veterinary pathology case records with an append-only audit
//! history and soft deletion.
//!
//! # Architecture
//!
//! ```text
//!   Host app (identity already resolved to owner_id)
//!                        │
//!                        ▼
//!        ┌───────────────────────────────┐
//!        │          CaseLedger           │
//!        │ authorize → patch → validate  │
//!        └───────┬───────────────┬───────┘
//!                │               │
//!       UniquenessGuard     HistoryLedger ── snapshot before every update
//!                │               │
//!                ▼               ▼
//!          case_records     case_history + record_versions
//!                │
//!            Lifecycle: Active ⇄ Deleted, erase (record + history)
//! ```
//!
//! # Core Principle
//!
//! **No update lands without its history entry.** The pre-update snapshot and
//! the update commit together or not at all.
//!
//! # Modules
//!
//! - [`db`]: SQLite storage for records, history and version counters
//! - [`models`]: Domain types (CaseRecord, ClinicalFields, HistoryEntry, etc.)
//! - [`ledger`]: Record operations, uniqueness, history and lifecycle
//! - [`config`]: Layered configuration
//! - [`logging`]: Logger bootstrap

pub mod config;
pub mod db;
pub mod ledger;
pub mod logging;
pub mod models;

// Re-export commonly used types
pub use crate::config::{CoreConfig, DatabaseConfig, HistoryConfig, LogConfig};
pub use db::Database;
pub use ledger::{CaseLedger, LedgerError, LedgerResult, RecordCounts, UpdateOutcome};
pub use models::{
    CaseRecord, ClinicalFields, HistoryAudit, HistoryEntry, Sex, Species, SweepReport,
    ValidationError,
};

// UniFFI setup - using proc macros
uniffi::setup_scaffolding!();

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

// =========================================================================
// FFI Error Type
// =========================================================================

#[derive(Debug, thiserror::Error, uniffi::Error)]
pub enum VetpathError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Duplicate case number: {0}")]
    DuplicateKey(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<LedgerError> for VetpathError {
    fn from(e: LedgerError) -> Self {
        let message = e.to_string();
        match e {
            LedgerError::Validation(_) => VetpathError::Validation(message),
            LedgerError::DuplicateKey { .. } => VetpathError::DuplicateKey(message),
            LedgerError::NotFound(_) => VetpathError::NotFound(message),
            LedgerError::Forbidden { .. } => VetpathError::Forbidden(message),
            LedgerError::Conflict(_) => VetpathError::Conflict(message),
            LedgerError::StorageUnavailable(_) => VetpathError::StorageUnavailable(message),
        }
    }
}

impl From<db::DbError> for VetpathError {
    fn from(e: db::DbError) -> Self {
        LedgerError::from(e).into()
    }
}

impl From<serde_json::Error> for VetpathError {
    fn from(e: serde_json::Error) -> Self {
        VetpathError::Serialization(e.to_string())
    }
}

impl From<crate::config::CoreConfigError> for VetpathError {
    fn from(e: crate::config::CoreConfigError) -> Self {
        VetpathError::Config(e.to_string())
    }
}

impl From<logging::LoggingError> for VetpathError {
    fn from(e: logging::LoggingError) -> Self {
        VetpathError::Config(e.to_string())
    }
}

impl<T> From<std::sync::PoisonError<T>> for VetpathError {
    fn from(e: std::sync::PoisonError<T>) -> Self {
        VetpathError::StorageUnavailable(format!("Lock poisoned: {}", e))
    }
}

// =========================================================================
// Factory Functions (exported to FFI)
// =========================================================================

/// Open or create a database at the given path.
#[uniffi::export]
pub fn open_database(path: String) -> Result<Arc<VetpathCore>, VetpathError> {
    let db = Database::open(&path)?;
    Ok(VetpathCore::wrap(db, HistoryConfig::default()))
}

/// Create an in-memory database (for testing).
#[uniffi::export]
pub fn open_database_in_memory() -> Result<Arc<VetpathCore>, VetpathError> {
    let db = Database::open_in_memory()?;
    Ok(VetpathCore::wrap(db, HistoryConfig::default()))
}

/// Load configuration and open the configured database.
///
/// `config_path` is an optional TOML file; `VETPATH_*` variables override it.
/// Logging is set up separately with [`init_logging`].
#[uniffi::export]
pub fn open_with_config(config_path: Option<String>) -> Result<Arc<VetpathCore>, VetpathError> {
    let config = CoreConfig::load(config_path.as_deref().map(Path::new))?;
    let db = Database::open_with_config(&config.database)?;
    Ok(VetpathCore::wrap(db, config.history))
}

/// Start the core's logger backend.
///
/// Hosts with their own `log` backend skip this. Repeating the call with the
/// same settings is a no-op; other settings are rejected.
#[uniffi::export]
pub fn init_logging(level: String, log_dir: Option<String>) -> Result<(), VetpathError> {
    logging::init_logging(&LogConfig {
        level,
        directory: log_dir.map(PathBuf::from),
    })?;
    Ok(())
}

/// Settings of the running logger, if [`init_logging`] has succeeded.
#[uniffi::export]
pub fn logging_status() -> Option<FfiLoggingStatus> {
    logging::logging_status().map(|(level, directory)| FfiLoggingStatus {
        level: level.to_string(),
        directory: directory.map(|d| d.display().to_string()),
    })
}

// =========================================================================
// Main API Object
// =========================================================================

/// Thread-safe database wrapper for FFI.
#[derive(uniffi::Object)]
pub struct VetpathCore {
    db: Arc<Mutex<Database>>,
    history: HistoryConfig,
}

impl VetpathCore {
    fn wrap(db: Database, history: HistoryConfig) -> Arc<Self> {
        Arc::new(Self {
            db: Arc::new(Mutex::new(db)),
            history,
        })
    }
}

#[uniffi::export]
impl VetpathCore {
    // =========================================================================
    // Record Operations
    // =========================================================================

    /// Create a case record from a `ClinicalFields` JSON document.
    pub fn create_record(
        &self,
        owner_id: String,
        fields_json: String,
    ) -> Result<FfiCaseRecord, VetpathError> {
        let fields: ClinicalFields = serde_json::from_str(&fields_json)
            .map_err(|e| VetpathError::Validation(e.to_string()))?;
        let db = self.db.lock()?;
        let record = CaseLedger::new(&db, self.history.clone()).create_record(&owner_id, fields)?;
        Ok(record.try_into()?)
    }

    /// List an owner's active records, newest first.
    pub fn list_active(&self, owner_id: String) -> Result<Vec<FfiCaseRecord>, VetpathError> {
        let db = self.db.lock()?;
        let records = CaseLedger::new(&db, self.history.clone()).list_active(&owner_id)?;
        to_ffi_records(records)
    }

    /// List an owner's soft-deleted records, newest first.
    pub fn list_deleted(&self, owner_id: String) -> Result<Vec<FfiCaseRecord>, VetpathError> {
        let db = self.db.lock()?;
        let records = CaseLedger::new(&db, self.history.clone()).list_deleted(&owner_id)?;
        to_ffi_records(records)
    }

    /// Count an owner's records per lifecycle state.
    pub fn record_counts(&self, owner_id: String) -> Result<FfiRecordCounts, VetpathError> {
        let db = self.db.lock()?;
        let counts = CaseLedger::new(&db, self.history.clone()).record_counts(&owner_id)?;
        Ok(counts.into())
    }

    /// Get a record the caller owns.
    pub fn get_record(&self, id: String, caller_id: String) -> Result<FfiCaseRecord, VetpathError> {
        let db = self.db.lock()?;
        let record = CaseLedger::new(&db, self.history.clone()).get_record(&id, &caller_id)?;
        Ok(record.try_into()?)
    }

    /// Apply a JSON merge patch to a record.
    pub fn update_record(
        &self,
        id: String,
        caller_id: String,
        patch_json: String,
        change_reason: Option<String>,
    ) -> Result<FfiUpdateOutcome, VetpathError> {
        let patch: serde_json::Value = serde_json::from_str(&patch_json)
            .map_err(|e| VetpathError::Validation(e.to_string()))?;
        let db = self.db.lock()?;
        let outcome = CaseLedger::new(&db, self.history.clone()).update_record(
            &id,
            &caller_id,
            &patch,
            change_reason.as_deref(),
        )?;
        Ok(FfiUpdateOutcome {
            record: outcome.record.try_into()?,
            version: outcome.version,
        })
    }

    // =========================================================================
    // Lifecycle Operations
    // =========================================================================

    /// Hide a record from active listings.
    pub fn soft_delete(&self, id: String, caller_id: String) -> Result<(), VetpathError> {
        let db = self.db.lock()?;
        CaseLedger::new(&db, self.history.clone()).soft_delete(&id, &caller_id)?;
        Ok(())
    }

    /// Bring back a soft-deleted record.
    pub fn restore(&self, id: String, caller_id: String) -> Result<(), VetpathError> {
        let db = self.db.lock()?;
        CaseLedger::new(&db, self.history.clone()).restore(&id, &caller_id)?;
        Ok(())
    }

    /// Permanently erase a record and its history.
    pub fn hard_delete(&self, id: String, caller_id: String) -> Result<(), VetpathError> {
        let db = self.db.lock()?;
        CaseLedger::new(&db, self.history.clone()).hard_delete(&id, &caller_id)?;
        Ok(())
    }

    // =========================================================================
    // History Operations
    // =========================================================================

    /// Get a record's history, newest first.
    pub fn get_history(&self, record_id: String) -> Result<Vec<FfiHistoryEntry>, VetpathError> {
        let db = self.db.lock()?;
        let entries = CaseLedger::new(&db, self.history.clone()).get_history(&record_id)?;
        entries
            .into_iter()
            .map(|e| e.try_into().map_err(VetpathError::from))
            .collect()
    }

    /// Get one history snapshot by version.
    pub fn get_history_version(
        &self,
        record_id: String,
        version: u32,
    ) -> Result<Option<FfiHistoryEntry>, VetpathError> {
        let db = self.db.lock()?;
        let entry =
            CaseLedger::new(&db, self.history.clone()).get_history_version(&record_id, version)?;
        Ok(entry.map(|e| e.try_into()).transpose()?)
    }

    /// Check a record's history for tampering and gaps.
    pub fn verify_history(&self, record_id: String) -> Result<FfiHistoryAudit, VetpathError> {
        let db = self.db.lock()?;
        let audit = CaseLedger::new(&db, self.history.clone()).verify_history(&record_id)?;
        Ok(audit.into())
    }

    /// Remove history whose record no longer exists.
    pub fn sweep_orphaned_history(&self) -> Result<FfiSweepReport, VetpathError> {
        let db = self.db.lock()?;
        let report = CaseLedger::new(&db, self.history.clone()).sweep_orphaned_history()?;
        Ok(report.into())
    }
}

fn to_ffi_records(records: Vec<CaseRecord>) -> Result<Vec<FfiCaseRecord>, VetpathError> {
    records
        .into_iter()
        .map(|r| r.try_into().map_err(VetpathError::from))
        .collect()
}

// =========================================================================
// FFI Types
// =========================================================================

/// FFI-safe case record. Clinical fields travel as JSON.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiCaseRecord {
    pub id: String,
    pub owner_id: String,
    pub case_number: String,
    pub fields_json: String,
    pub is_deleted: bool,
    pub deleted_at: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl TryFrom<CaseRecord> for FfiCaseRecord {
    type Error = serde_json::Error;

    fn try_from(record: CaseRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            fields_json: serde_json::to_string(&record.fields)?,
            case_number: record.fields.case_number,
            id: record.id,
            owner_id: record.owner_id,
            is_deleted: record.is_deleted,
            deleted_at: record.deleted_at,
            created_at: record.created_at,
            updated_at: record.updated_at,
        })
    }
}

/// FFI-safe update result.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiUpdateOutcome {
    pub record: FfiCaseRecord,
    pub version: u32,
}

/// FFI-safe history entry.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiHistoryEntry {
    pub id: String,
    pub record_id: String,
    pub snapshot_json: String,
    pub version: u32,
    pub change_reason: String,
    pub modified_by: String,
    pub change_date: String,
    pub snapshot_hash: String,
}

impl TryFrom<HistoryEntry> for FfiHistoryEntry {
    type Error = serde_json::Error;

    fn try_from(entry: HistoryEntry) -> Result<Self, Self::Error> {
        Ok(Self {
            snapshot_json: serde_json::to_string(&entry.snapshot)?,
            id: entry.id,
            record_id: entry.record_id,
            version: entry.version,
            change_reason: entry.change_reason,
            modified_by: entry.modified_by,
            change_date: entry.change_date,
            snapshot_hash: entry.snapshot_hash,
        })
    }
}

/// FFI-safe history audit.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiHistoryAudit {
    pub record_id: String,
    pub entry_count: u32,
    pub tampered_versions: Vec<u32>,
    pub missing_versions: Vec<u32>,
    pub intact: bool,
}

impl From<HistoryAudit> for FfiHistoryAudit {
    fn from(audit: HistoryAudit) -> Self {
        Self {
            intact: audit.is_intact(),
            record_id: audit.record_id,
            entry_count: audit.entry_count,
            tampered_versions: audit.tampered_versions,
            missing_versions: audit.missing_versions,
        }
    }
}

/// FFI-safe sweep report.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiSweepReport {
    pub removed_entries: u64,
    pub removed_counters: u64,
}

impl From<SweepReport> for FfiSweepReport {
    fn from(report: SweepReport) -> Self {
        Self {
            removed_entries: report.removed_entries,
            removed_counters: report.removed_counters,
        }
    }
}

/// FFI-safe record counts.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiRecordCounts {
    pub active: u64,
    pub deleted: u64,
    pub total: u64,
}

impl From<RecordCounts> for FfiRecordCounts {
    fn from(counts: RecordCounts) -> Self {
        Self {
            active: counts.active,
            deleted: counts.deleted,
            total: counts.total,
        }
    }
}

/// FFI-safe logger settings.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiLoggingStatus {
    pub level: String,
    pub directory: Option<String>,
}
