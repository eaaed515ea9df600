//! Append-only history ledger.

use std::collections::BTreeSet;

use log::debug;

use super::LedgerResult;
use crate::db::Database;
use crate::models::{hash_snapshot, timestamp_now, ClinicalFields, HistoryAudit, HistoryEntry};

/// Writes and reads pre-mutation snapshots.
pub struct HistoryLedger<'a> {
    db: &'a Database,
}

impl<'a> HistoryLedger<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// Record `snapshot` as the state of `record_id` before a change.
    ///
    /// The version comes from the record's atomic counter, not from counting
    /// existing entries.
    pub fn append(
        &self,
        record_id: &str,
        snapshot: &ClinicalFields,
        change_reason: &str,
        modified_by: &str,
    ) -> LedgerResult<HistoryEntry> {
        let version = self.db.allocate_history_version(record_id)?;
        let entry = HistoryEntry {
            id: uuid::Uuid::new_v4().to_string(),
            record_id: record_id.to_string(),
            snapshot: snapshot.clone(),
            version,
            change_reason: change_reason.to_string(),
            modified_by: modified_by.to_string(),
            change_date: timestamp_now(),
            snapshot_hash: hash_snapshot(snapshot)?,
        };
        self.db.insert_history_entry(&entry)?;

        debug!(
            "event=history_append record_id={} version={}",
            record_id, version
        );
        Ok(entry)
    }

    /// A record's history, newest first.
    pub fn history(&self, record_id: &str) -> LedgerResult<Vec<HistoryEntry>> {
        Ok(self.db.list_history(record_id)?)
    }

    /// One snapshot by version.
    pub fn entry(&self, record_id: &str, version: u32) -> LedgerResult<Option<HistoryEntry>> {
        Ok(self.db.get_history_entry(record_id, version)?)
    }

    /// Check stored hashes and look for versions missing from `1..=last issued`.
    pub fn verify(&self, record_id: &str) -> LedgerResult<HistoryAudit> {
        let entries = self.db.list_history(record_id)?;

        let mut tampered_versions: Vec<u32> = entries
            .iter()
            .filter(|e| !e.is_untampered())
            .map(|e| e.version)
            .collect();
        tampered_versions.sort_unstable();

        let present: BTreeSet<u32> = entries.iter().map(|e| e.version).collect();
        // The counter also exposes entries removed from the newest end
        let issued = self.db.current_history_version(record_id)?.unwrap_or(0);
        let max = present.iter().next_back().copied().unwrap_or(0).max(issued);
        let missing_versions = (1..=max).filter(|v| !present.contains(v)).collect();

        Ok(HistoryAudit {
            record_id: record_id.to_string(),
            entry_count: entries.len() as u32,
            tampered_versions,
            missing_versions,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CaseRecord, Sex, Species};

    fn setup() -> (Database, CaseRecord) {
        let db = Database::open_in_memory().unwrap();
        let fields = ClinicalFields::new("A", "Max", Species::Canine, Sex::Male, "Mass");
        let record = CaseRecord::new("owner-1", fields);
        db.insert_case_record(&record).unwrap();
        (db, record)
    }

    #[test]
    fn test_append_assigns_increasing_versions() {
        let (db, record) = setup();
        let ledger = HistoryLedger::new(&db);

        for expected in 1..=3 {
            let entry = ledger
                .append(&record.id, &record.fields, "reason", "owner-1")
                .unwrap();
            assert_eq!(entry.version, expected);
            assert!(entry.is_untampered());
        }
    }

    #[test]
    fn test_version_not_derived_from_row_count() {
        let (db, record) = setup();
        let ledger = HistoryLedger::new(&db);
        ledger
            .append(&record.id, &record.fields, "first", "owner-1")
            .unwrap();
        // Row vanishes, counter does not rewind
        db.delete_history_for_record(&record.id).unwrap();

        let entry = ledger
            .append(&record.id, &record.fields, "second", "owner-1")
            .unwrap();
        assert_eq!(entry.version, 2);
    }

    #[test]
    fn test_verify_intact() {
        let (db, record) = setup();
        let ledger = HistoryLedger::new(&db);
        ledger.append(&record.id, &record.fields, "r1", "owner-1").unwrap();
        ledger.append(&record.id, &record.fields, "r2", "owner-1").unwrap();

        let audit = ledger.verify(&record.id).unwrap();
        assert!(audit.is_intact());
        assert_eq!(audit.entry_count, 2);
    }

    #[test]
    fn test_verify_reports_gaps_and_tampering() {
        let (db, record) = setup();
        let ledger = HistoryLedger::new(&db);
        for reason in ["r1", "r2", "r3"] {
            ledger.append(&record.id, &record.fields, reason, "owner-1").unwrap();
        }

        // Raw access: bypass the write-once trigger
        db.conn()
            .execute_batch(&format!(
                r#"
                DROP TRIGGER case_history_write_once;
                DELETE FROM case_history WHERE record_id = '{id}' AND version = 2;
                UPDATE case_history
                SET snapshot = json_set(snapshot, '$.case_number', 'FORGED')
                WHERE record_id = '{id}' AND version = 3;
                "#,
                id = record.id
            ))
            .unwrap();

        let audit = ledger.verify(&record.id).unwrap();
        assert!(!audit.is_intact());
        assert_eq!(audit.missing_versions, vec![2]);
        assert_eq!(audit.tampered_versions, vec![3]);
    }

    #[test]
    fn test_verify_reports_truncated_tail() {
        let (db, record) = setup();
        let ledger = HistoryLedger::new(&db);
        for reason in ["r1", "r2", "r3"] {
            ledger.append(&record.id, &record.fields, reason, "owner-1").unwrap();
        }

        db.conn()
            .execute(
                "DELETE FROM case_history WHERE record_id = ?1 AND version = 3",
                [&record.id],
            )
            .unwrap();

        let audit = ledger.verify(&record.id).unwrap();
        assert_eq!(audit.missing_versions, vec![3]);
        assert!(audit.tampered_versions.is_empty());
    }

    #[test]
    fn test_verify_empty_history() {
        let (db, record) = setup();
        let audit = HistoryLedger::new(&db).verify(&record.id).unwrap();
        assert!(audit.is_intact());
        assert_eq!(audit.entry_count, 0);
    }
}
