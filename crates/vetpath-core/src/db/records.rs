//! Case record database operations.

use rusqlite::{params, OptionalExtension, Row};

use super::{Database, DbError, DbResult};
use crate::models::{CaseRecord, ClinicalFields};

const CASE_RECORD_COLUMNS: &str = "id, owner_id, payload, is_deleted, deleted_at, created_at, updated_at";

/// Which lifecycle states a listing includes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleFilter {
    /// Only records that are not soft-deleted
    Active,
    /// Only soft-deleted records
    Deleted,
    /// Both
    All,
}

impl LifecycleFilter {
    fn is_deleted_param(self) -> Option<i64> {
        match self {
            LifecycleFilter::Active => Some(0),
            LifecycleFilter::Deleted => Some(1),
            LifecycleFilter::All => None,
        }
    }
}

impl Database {
    /// Insert a new case record.
    ///
    /// Constraint violations are returned untouched so callers can classify them.
    pub fn insert_case_record(&self, record: &CaseRecord) -> DbResult<()> {
        let payload = serde_json::to_string(&record.fields)?;

        self.conn.execute(
            r#"
            INSERT INTO case_records (
                id, owner_id, case_number, payload,
                is_deleted, deleted_at, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
            params![
                record.id,
                record.owner_id,
                record.fields.case_number,
                payload,
                record.is_deleted,
                record.deleted_at,
                record.created_at,
                record.updated_at,
            ],
        )?;
        Ok(())
    }

    /// Get a case record by ID, in any lifecycle state.
    pub fn get_case_record(&self, id: &str) -> DbResult<Option<CaseRecord>> {
        let sql = format!("SELECT {} FROM case_records WHERE id = ?", CASE_RECORD_COLUMNS);
        self.conn
            .query_row(&sql, [id], CaseRow::from_row)
            .optional()?
            .map(|row| row.try_into())
            .transpose()
    }

    /// Look up an owner's record by case number, in any lifecycle state.
    pub fn find_case_record_by_case_number(
        &self,
        owner_id: &str,
        case_number: &str,
    ) -> DbResult<Option<CaseRecord>> {
        let sql = format!(
            "SELECT {} FROM case_records WHERE owner_id = ? AND case_number = ?",
            CASE_RECORD_COLUMNS
        );
        self.conn
            .query_row(&sql, [owner_id, case_number], CaseRow::from_row)
            .optional()?
            .map(|row| row.try_into())
            .transpose()
    }

    /// List an owner's records, newest first.
    pub fn list_case_records(
        &self,
        owner_id: &str,
        filter: LifecycleFilter,
    ) -> DbResult<Vec<CaseRecord>> {
        let sql = format!(
            r#"
            SELECT {}
            FROM case_records
            WHERE owner_id = ?1 AND (?2 IS NULL OR is_deleted = ?2)
            ORDER BY created_at DESC, rowid DESC
            "#,
            CASE_RECORD_COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(
            params![owner_id, filter.is_deleted_param()],
            CaseRow::from_row,
        )?;

        let mut records = Vec::new();
        for row in rows {
            records.push(row?.try_into()?);
        }
        Ok(records)
    }

    /// Count an owner's records.
    pub fn count_case_records(&self, owner_id: &str, filter: LifecycleFilter) -> DbResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM case_records WHERE owner_id = ?1 AND (?2 IS NULL OR is_deleted = ?2)",
            params![owner_id, filter.is_deleted_param()],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    /// Replace a record's clinical fields and bump `updated_at`.
    ///
    /// Owner and creation time are never touched.
    pub fn update_case_fields(
        &self,
        id: &str,
        fields: &ClinicalFields,
        updated_at: &str,
    ) -> DbResult<bool> {
        let payload = serde_json::to_string(fields)?;

        let rows_affected = self.conn.execute(
            r#"
            UPDATE case_records SET
                case_number = ?2,
                payload = ?3,
                updated_at = ?4
            WHERE id = ?1
            "#,
            params![id, fields.case_number, payload, updated_at],
        )?;
        Ok(rows_affected > 0)
    }

    /// Set the soft-delete flag. Clearing it also clears `deleted_at`.
    pub fn set_case_deleted(&self, id: &str, deleted: bool, at: &str) -> DbResult<bool> {
        let deleted_at = deleted.then_some(at);
        let rows_affected = self.conn.execute(
            r#"
            UPDATE case_records SET
                is_deleted = ?2,
                deleted_at = ?3,
                updated_at = ?4
            WHERE id = ?1
            "#,
            params![id, deleted, deleted_at, at],
        )?;
        Ok(rows_affected > 0)
    }

    /// Permanently delete a record row.
    pub fn delete_case_record(&self, id: &str) -> DbResult<bool> {
        let rows_affected = self
            .conn
            .execute("DELETE FROM case_records WHERE id = ?", [id])?;
        Ok(rows_affected > 0)
    }
}

/// Intermediate row struct for database mapping.
struct CaseRow {
    id: String,
    owner_id: String,
    payload: String,
    is_deleted: bool,
    deleted_at: Option<String>,
    created_at: String,
    updated_at: String,
}

impl CaseRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(CaseRow {
            id: row.get(0)?,
            owner_id: row.get(1)?,
            payload: row.get(2)?,
            is_deleted: row.get(3)?,
            deleted_at: row.get(4)?,
            created_at: row.get(5)?,
            updated_at: row.get(6)?,
        })
    }
}

impl TryFrom<CaseRow> for CaseRecord {
    type Error = DbError;

    fn try_from(row: CaseRow) -> Result<Self, Self::Error> {
        let fields: ClinicalFields = serde_json::from_str(&row.payload)?;

        Ok(CaseRecord {
            id: row.id,
            owner_id: row.owner_id,
            fields,
            is_deleted: row.is_deleted,
            deleted_at: row.deleted_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Sex, Species};

    fn setup_db() -> Database {
        Database::open_in_memory().unwrap()
    }

    fn make_record(owner: &str, case_number: &str) -> CaseRecord {
        let fields = ClinicalFields::new(case_number, "Max", Species::Canine, Sex::Male, "Mass");
        CaseRecord::new(owner, fields)
    }

    #[test]
    fn test_insert_and_get() {
        let db = setup_db();

        let mut record = make_record("owner-1", "P-100");
        record.fields.breed = Some("Boxer".into());
        record.fields.body_condition_score = Some(5);
        record.fields.biochemistry.alt = Some("85".into());
        record.fields.biopsy_methods.punch = true;
        db.insert_case_record(&record).unwrap();

        let retrieved = db.get_case_record(&record.id).unwrap().unwrap();
        assert_eq!(retrieved, record);
    }

    #[test]
    fn test_get_missing() {
        let db = setup_db();
        assert!(db.get_case_record("nope").unwrap().is_none());
    }

    #[test]
    fn test_find_by_case_number_is_owner_scoped() {
        let db = setup_db();
        let record = make_record("owner-1", "P-100");
        db.insert_case_record(&record).unwrap();

        let found = db
            .find_case_record_by_case_number("owner-1", "P-100")
            .unwrap()
            .unwrap();
        assert_eq!(found.id, record.id);
        assert!(db
            .find_case_record_by_case_number("owner-2", "P-100")
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_list_newest_first_and_filtered() {
        let db = setup_db();

        let first = make_record("owner-1", "P-1");
        let second = make_record("owner-1", "P-2");
        let third = make_record("owner-1", "P-3");
        let other_owner = make_record("owner-2", "P-1");
        for record in [&first, &second, &third, &other_owner] {
            db.insert_case_record(record).unwrap();
        }
        db.set_case_deleted(&second.id, true, "2030-01-01T00:00:00.000000Z")
            .unwrap();

        let active = db
            .list_case_records("owner-1", LifecycleFilter::Active)
            .unwrap();
        let ids: Vec<_> = active.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec![third.id.as_str(), first.id.as_str()]);

        let deleted = db
            .list_case_records("owner-1", LifecycleFilter::Deleted)
            .unwrap();
        assert_eq!(deleted.len(), 1);
        assert_eq!(deleted[0].id, second.id);

        assert_eq!(
            db.count_case_records("owner-1", LifecycleFilter::All).unwrap(),
            3
        );
        assert_eq!(
            db.count_case_records("owner-2", LifecycleFilter::Active).unwrap(),
            1
        );
    }

    #[test]
    fn test_update_fields_keeps_owner_and_created_at() {
        let db = setup_db();
        let record = make_record("owner-1", "A");
        db.insert_case_record(&record).unwrap();

        let mut fields = record.fields.clone();
        fields.case_number = "B".into();
        fields.diagnosis = Some("Mast cell tumor".into());
        let updated_at = "2030-01-01T00:00:00.000000Z";
        assert!(db.update_case_fields(&record.id, &fields, updated_at).unwrap());

        let retrieved = db.get_case_record(&record.id).unwrap().unwrap();
        assert_eq!(retrieved.fields, fields);
        assert_eq!(retrieved.owner_id, "owner-1");
        assert_eq!(retrieved.created_at, record.created_at);
        assert_eq!(retrieved.updated_at, updated_at);

        // Indexed key follows the payload
        assert!(db
            .find_case_record_by_case_number("owner-1", "B")
            .unwrap()
            .is_some());
    }

    #[test]
    fn test_set_deleted_and_clear() {
        let db = setup_db();
        let record = make_record("owner-1", "P-100");
        db.insert_case_record(&record).unwrap();

        let at = "2030-01-01T00:00:00.000000Z";
        db.set_case_deleted(&record.id, true, at).unwrap();
        let retrieved = db.get_case_record(&record.id).unwrap().unwrap();
        assert!(retrieved.is_deleted);
        assert_eq!(retrieved.deleted_at.as_deref(), Some(at));

        db.set_case_deleted(&record.id, false, at).unwrap();
        let retrieved = db.get_case_record(&record.id).unwrap().unwrap();
        assert!(!retrieved.is_deleted);
        assert!(retrieved.deleted_at.is_none());
    }

    #[test]
    fn test_delete_record() {
        let db = setup_db();
        let record = make_record("owner-1", "P-100");
        db.insert_case_record(&record).unwrap();

        assert!(db.delete_case_record(&record.id).unwrap());
        assert!(!db.delete_case_record(&record.id).unwrap());
        assert!(db.get_case_record(&record.id).unwrap().is_none());
    }

    #[test]
    fn test_corrupt_payload_surfaces_as_json_error() {
        let db = setup_db();
        db.conn()
            .execute(
                "INSERT INTO case_records (id, owner_id, case_number, payload, created_at, updated_at)
                 VALUES ('r1', 'owner-1', 'P-1', 'not json', 'x', 'x')",
                [],
            )
            .unwrap();
        assert!(matches!(db.get_case_record("r1"), Err(DbError::Json(_))));
    }
}
