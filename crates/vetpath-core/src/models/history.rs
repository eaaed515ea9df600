//! Audit history models.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::record::ClinicalFields;

/// Change reason recorded when the caller gives none.
pub const DEFAULT_CHANGE_REASON: &str = "Record updated";

/// Immutable pre-mutation snapshot of a case record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HistoryEntry {
    /// Unique entry ID (UUID)
    pub id: String,
    /// Record this snapshot describes (lookup key only)
    pub record_id: String,
    /// Clinical fields as they were before the mutation
    pub snapshot: ClinicalFields,
    /// Per-record version, starting at 1
    pub version: u32,
    /// Why the record was changed
    pub change_reason: String,
    /// Account that made the change
    pub modified_by: String,
    /// Capture timestamp
    pub change_date: String,
    /// Hex SHA-256 of the canonical snapshot JSON
    pub snapshot_hash: String,
}

impl HistoryEntry {
    /// Recompute the snapshot hash and compare against the stored one.
    pub fn is_untampered(&self) -> bool {
        match hash_snapshot(&self.snapshot) {
            Ok(hash) => hash == self.snapshot_hash,
            Err(_) => false,
        }
    }
}

/// Hash a snapshot's canonical JSON.
pub fn hash_snapshot(snapshot: &ClinicalFields) -> Result<String, serde_json::Error> {
    let payload = snapshot.to_canonical_json()?;
    Ok(hash_data(payload.as_bytes()))
}

/// Compute SHA-256 hash of data.
pub fn hash_data(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Result of checking one record's history for gaps and tampering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryAudit {
    pub record_id: String,
    pub entry_count: u32,
    /// Versions whose stored hash no longer matches the snapshot
    pub tampered_versions: Vec<u32>,
    /// Versions absent from the 1..=max sequence
    pub missing_versions: Vec<u32>,
}

impl HistoryAudit {
    pub fn is_intact(&self) -> bool {
        self.tampered_versions.is_empty() && self.missing_versions.is_empty()
    }
}

/// Outcome of the orphaned-history maintenance sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub removed_entries: u64,
    pub removed_counters: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Sex, Species};

    fn make_entry() -> HistoryEntry {
        let snapshot = ClinicalFields::new("A", "Max", Species::Canine, Sex::Male, "Mass");
        HistoryEntry {
            id: "entry-1".into(),
            record_id: "record-1".into(),
            snapshot_hash: hash_snapshot(&snapshot).unwrap(),
            snapshot,
            version: 1,
            change_reason: DEFAULT_CHANGE_REASON.into(),
            modified_by: "owner-1".into(),
            change_date: "2024-01-15T10:00:00.000000Z".into(),
        }
    }

    #[test]
    fn test_hash_data() {
        let hash = hash_data(b"test");
        assert_eq!(hash.len(), 64); // SHA-256 = 32 bytes = 64 hex chars
        assert_eq!(hash, hash_data(b"test"));
        assert_ne!(hash, hash_data(b"test2"));
    }

    #[test]
    fn test_untampered_entry() {
        assert!(make_entry().is_untampered());
    }

    #[test]
    fn test_tampered_entry_detected() {
        let mut entry = make_entry();
        entry.snapshot.case_number = "Z".into();
        assert!(!entry.is_untampered());
    }

    #[test]
    fn test_audit_intact() {
        let audit = HistoryAudit {
            record_id: "record-1".into(),
            entry_count: 2,
            tampered_versions: vec![],
            missing_versions: vec![],
        };
        assert!(audit.is_intact());

        let audit = HistoryAudit {
            missing_versions: vec![2],
            ..audit
        };
        assert!(!audit.is_intact());
    }
}
