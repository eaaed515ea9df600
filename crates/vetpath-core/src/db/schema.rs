//! SQLite schema definition.

/// Complete database schema for vetpath.
pub const SCHEMA: &str = r#"
-- ============================================================================
-- Case Records
-- ============================================================================

CREATE TABLE IF NOT EXISTS case_records (
    id TEXT PRIMARY KEY,
    owner_id TEXT NOT NULL,
    case_number TEXT NOT NULL,                   -- mirrors payload.case_number
    payload TEXT NOT NULL,                       -- JSON ClinicalFields
    is_deleted INTEGER NOT NULL DEFAULT 0 CHECK (is_deleted IN (0, 1)),
    deleted_at TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

-- Case numbers are unique per owner (soft-deleted rows included)
CREATE UNIQUE INDEX IF NOT EXISTS idx_case_records_owner_case
    ON case_records(owner_id, case_number);

CREATE INDEX IF NOT EXISTS idx_case_records_owner_listing
    ON case_records(owner_id, is_deleted, created_at);

-- Identity and ownership never change
CREATE TRIGGER IF NOT EXISTS case_records_immutable_keys BEFORE UPDATE ON case_records
WHEN new.id IS NOT old.id
  OR new.owner_id IS NOT old.owner_id
  OR new.created_at IS NOT old.created_at
BEGIN
    SELECT RAISE(ABORT, 'Case record id, owner and creation time are immutable');
END;

-- ============================================================================
-- Case History (Append-Only - Immutable after creation)
-- ============================================================================

-- record_id is a lookup key, not a foreign key
CREATE TABLE IF NOT EXISTS case_history (
    id TEXT PRIMARY KEY,
    record_id TEXT NOT NULL,
    version INTEGER NOT NULL CHECK (version >= 1),
    snapshot TEXT NOT NULL,                      -- JSON ClinicalFields before the change
    snapshot_hash TEXT NOT NULL,                 -- SHA-256 of snapshot
    change_reason TEXT NOT NULL,
    modified_by TEXT NOT NULL,
    change_date TEXT NOT NULL,
    UNIQUE (record_id, version)
);

CREATE INDEX IF NOT EXISTS idx_case_history_record
    ON case_history(record_id, change_date);

CREATE TRIGGER IF NOT EXISTS case_history_write_once BEFORE UPDATE ON case_history
BEGIN
    SELECT RAISE(ABORT, 'History entries are write-once');
END;

-- ============================================================================
-- Version Counters (one row per record, incremented atomically)
-- ============================================================================

CREATE TABLE IF NOT EXISTS record_versions (
    record_id TEXT PRIMARY KEY,
    last_version INTEGER NOT NULL CHECK (last_version >= 1)
);
"#;
