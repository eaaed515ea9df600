//! Soft-delete lifecycle and permanent erasure.
//!
//! ```text
//!            soft_delete
//!   Active ─────────────▶ Deleted
//!     ▲                     │
//!     └──────── restore ────┘
//!
//!   Active | Deleted ──erase──▶ (gone, history included)
//! ```

use log::info;

use super::{LedgerError, LedgerResult};
use crate::db::Database;
use crate::models::{timestamp_now, CaseRecord};

/// Soft lifecycle state of a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Active,
    Deleted,
}

/// Reversible lifecycle transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleTransition {
    SoftDelete,
    Restore,
}

/// Outcome of applying a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Changed(LifecycleState),
    /// Already in the target state
    Unchanged,
}

impl LifecycleState {
    pub fn of(record: &CaseRecord) -> Self {
        if record.is_deleted {
            LifecycleState::Deleted
        } else {
            LifecycleState::Active
        }
    }

    pub fn apply(self, transition: LifecycleTransition) -> Transition {
        match (self, transition) {
            (LifecycleState::Active, LifecycleTransition::SoftDelete) => {
                Transition::Changed(LifecycleState::Deleted)
            }
            (LifecycleState::Deleted, LifecycleTransition::Restore) => {
                Transition::Changed(LifecycleState::Active)
            }
            _ => Transition::Unchanged,
        }
    }
}

/// Applies lifecycle changes to stored records. Callers authorize first.
pub struct Lifecycle<'a> {
    db: &'a Database,
}

impl<'a> Lifecycle<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// Move `record` through `transition`. A transition into the current state writes nothing.
    pub fn transition(
        &self,
        record: &CaseRecord,
        transition: LifecycleTransition,
    ) -> LedgerResult<Transition> {
        let outcome = LifecycleState::of(record).apply(transition);
        if let Transition::Changed(to) = outcome {
            let deleted = to == LifecycleState::Deleted;
            if !self.db.set_case_deleted(&record.id, deleted, &timestamp_now())? {
                return Err(LedgerError::NotFound(record.id.clone()));
            }
            info!(
                "event=lifecycle_transition record_id={} to={:?}",
                record.id, to
            );
        }
        Ok(outcome)
    }

    /// Permanently remove the record, then its history and version counter.
    ///
    /// Runs in one transaction. Returns the number of history entries removed.
    pub fn erase(&self, record: &CaseRecord) -> LedgerResult<u64> {
        let tx = self.db.begin()?;
        if !self.db.delete_case_record(&record.id)? {
            return Err(LedgerError::NotFound(record.id.clone()));
        }
        let removed = self.db.delete_history_for_record(&record.id)?;
        self.db.delete_version_counter(&record.id)?;
        tx.commit()?;

        info!(
            "event=record_erased record_id={} history_removed={}",
            record.id, removed
        );
        Ok(removed)
    }
}
