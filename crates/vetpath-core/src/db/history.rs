//! Case history database operations.

use rusqlite::{params, OptionalExtension, Row};

use super::{Database, DbError, DbResult};
use crate::models::{ClinicalFields, HistoryEntry};

const HISTORY_COLUMNS: &str = "h.id, h.record_id, h.version, h.snapshot, h.snapshot_hash, \
     h.change_reason, h.modified_by, h.change_date";

impl Database {
    /// Allocate the next history version for a record.
    ///
    /// Increment-and-fetch happens in one statement, so concurrent writers
    /// never receive the same version.
    pub fn allocate_history_version(&self, record_id: &str) -> DbResult<u32> {
        self.conn
            .query_row(
                r#"
                INSERT INTO record_versions (record_id, last_version) VALUES (?1, 1)
                ON CONFLICT(record_id) DO UPDATE SET last_version = last_version + 1
                RETURNING last_version
                "#,
                [record_id],
                |row| row.get(0),
            )
            .map_err(Into::into)
    }

    /// Last version handed out for a record, if any.
    pub fn current_history_version(&self, record_id: &str) -> DbResult<Option<u32>> {
        self.conn
            .query_row(
                "SELECT last_version FROM record_versions WHERE record_id = ?",
                [record_id],
                |row| row.get(0),
            )
            .optional()
            .map_err(Into::into)
    }

    /// Insert a history entry. Entries are never updated afterwards.
    pub fn insert_history_entry(&self, entry: &HistoryEntry) -> DbResult<()> {
        let snapshot = serde_json::to_string(&entry.snapshot)?;

        self.conn.execute(
            r#"
            INSERT INTO case_history (
                id, record_id, version, snapshot, snapshot_hash,
                change_reason, modified_by, change_date
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
            params![
                entry.id,
                entry.record_id,
                entry.version,
                snapshot,
                entry.snapshot_hash,
                entry.change_reason,
                entry.modified_by,
                entry.change_date,
            ],
        )?;
        Ok(())
    }

    /// List a record's history, newest first.
    ///
    /// Entries whose record no longer exists are not returned.
    pub fn list_history(&self, record_id: &str) -> DbResult<Vec<HistoryEntry>> {
        let sql = format!(
            r#"
            SELECT {}
            FROM case_history h
            WHERE h.record_id = ?
              AND EXISTS (SELECT 1 FROM case_records r WHERE r.id = h.record_id)
            ORDER BY h.change_date DESC, h.version DESC
            "#,
            HISTORY_COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map([record_id], HistoryRow::from_row)?;

        let mut entries = Vec::new();
        for row in rows {
            entries.push(row?.try_into()?);
        }
        Ok(entries)
    }

    /// Get one history entry by record and version.
    pub fn get_history_entry(&self, record_id: &str, version: u32) -> DbResult<Option<HistoryEntry>> {
        let sql = format!(
            r#"
            SELECT {}
            FROM case_history h
            WHERE h.record_id = ?1 AND h.version = ?2
              AND EXISTS (SELECT 1 FROM case_records r WHERE r.id = h.record_id)
            "#,
            HISTORY_COLUMNS
        );
        self.conn
            .query_row(&sql, params![record_id, version], HistoryRow::from_row)
            .optional()?
            .map(|row| row.try_into())
            .transpose()
    }

    /// Remove all history entries for a record.
    pub fn delete_history_for_record(&self, record_id: &str) -> DbResult<u64> {
        let rows_affected = self
            .conn
            .execute("DELETE FROM case_history WHERE record_id = ?", [record_id])?;
        Ok(rows_affected as u64)
    }

    /// Remove a record's version counter.
    pub fn delete_version_counter(&self, record_id: &str) -> DbResult<bool> {
        let rows_affected = self
            .conn
            .execute("DELETE FROM record_versions WHERE record_id = ?", [record_id])?;
        Ok(rows_affected > 0)
    }

    /// Remove history entries and counters whose record no longer exists.
    ///
    /// Returns (entries removed, counters removed).
    pub fn delete_orphaned_history(&self) -> DbResult<(u64, u64)> {
        let entries = self.conn.execute(
            r#"
            DELETE FROM case_history
            WHERE NOT EXISTS (SELECT 1 FROM case_records r WHERE r.id = case_history.record_id)
            "#,
            [],
        )?;
        let counters = self.conn.execute(
            r#"
            DELETE FROM record_versions
            WHERE NOT EXISTS (SELECT 1 FROM case_records r WHERE r.id = record_versions.record_id)
            "#,
            [],
        )?;
        Ok((entries as u64, counters as u64))
    }
}

/// Intermediate row struct for database mapping.
struct HistoryRow {
    id: String,
    record_id: String,
    version: u32,
    snapshot: String,
    snapshot_hash: String,
    change_reason: String,
    modified_by: String,
    change_date: String,
}

impl HistoryRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(HistoryRow {
            id: row.get(0)?,
            record_id: row.get(1)?,
            version: row.get(2)?,
            snapshot: row.get(3)?,
            snapshot_hash: row.get(4)?,
            change_reason: row.get(5)?,
            modified_by: row.get(6)?,
            change_date: row.get(7)?,
        })
    }
}

impl TryFrom<HistoryRow> for HistoryEntry {
    type Error = DbError;

    fn try_from(row: HistoryRow) -> Result<Self, Self::Error> {
        let snapshot: ClinicalFields = serde_json::from_str(&row.snapshot)?;

        Ok(HistoryEntry {
            id: row.id,
            record_id: row.record_id,
            snapshot,
            version: row.version,
            change_reason: row.change_reason,
            modified_by: row.modified_by,
            change_date: row.change_date,
            snapshot_hash: row.snapshot_hash,
        })
    }
}
