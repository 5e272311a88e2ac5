//! Collaborator interfaces the engine reads from and writes through.
//!
//! The engine itself never performs I/O; a `Planner` drives these traits around
//! a pure `generate` call. `InMemoryStore` implements all of them.

use chrono::NaiveDate;
use rustc_hash::FxHashMap;
use thiserror::Error;

use crate::calendar::shift_days;
use crate::ledger::CompOffLedger;
use crate::models::{Analyst, Assignment, CompOffTransaction, Constraint, SchedulingContext};
use crate::rotation::{PatternContinuity, RotationState};

/// Days of schedule loaded on either side of the requested range, so streaks
/// and screener history can see across the boundary.
pub const CONTEXT_MARGIN_DAYS: i64 = 14;

#[derive(Error, Debug, PartialEq)]
pub enum StoreError {
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Rotation state version conflict: expected {expected}, found {found}")]
    VersionConflict { expected: u64, found: u64 },
    #[error("{analyst_id} already has an assignment on {date}")]
    Duplicate { analyst_id: String, date: NaiveDate },
    #[error("Store backend error: {0}")]
    Backend(String),
}

pub trait ContextLoader {
    fn load_context(
        &self,
        start: NaiveDate,
        end: NaiveDate,
        shift_group: &str,
    ) -> Result<SchedulingContext, StoreError>;
}

pub trait ContinuityStore {
    fn get_continuity(
        &self,
        algorithm_id: &str,
        analyst_id: &str,
    ) -> Result<Option<PatternContinuity>, StoreError>;

    /// Every record written under `algorithm_id`.
    fn continuity_for(&self, algorithm_id: &str) -> Result<Vec<PatternContinuity>, StoreError>;

    fn put_continuity(&mut self, record: &PatternContinuity) -> Result<(), StoreError>;
}

pub trait RotationStateStore {
    fn get_rotation_state(
        &self,
        algorithm_id: &str,
        shift_group: &str,
    ) -> Result<Option<RotationState>, StoreError>;

    /// Store `state` only if the persisted version still equals `expected_version`
    /// (0 when nothing is stored yet).
    fn put_rotation_state(
        &mut self,
        state: &RotationState,
        expected_version: u64,
    ) -> Result<(), StoreError>;
}

pub trait LedgerStore {
    fn load_ledger(&self) -> Result<CompOffLedger, StoreError>;

    fn save_ledger(&mut self, ledger: &CompOffLedger) -> Result<(), StoreError>;
}

pub trait AssignmentSink {
    fn create(&mut self, assignment: &Assignment) -> Result<(), StoreError>;

    fn update(&mut self, assignment: &Assignment) -> Result<(), StoreError>;
}

/// Everything a planner needs, held in memory.
#[derive(Clone, Debug, Default)]
pub struct InMemoryStore {
    pub analysts: Vec<Analyst>,
    pub assignments: Vec<Assignment>,
    pub constraints: Vec<Constraint>,
    pub holidays: Vec<NaiveDate>,
    continuity: FxHashMap<(String, String), PatternContinuity>,
    rotation_states: FxHashMap<(String, String), RotationState>,
    transactions: Vec<CompOffTransaction>,
}

impl InMemoryStore {
    pub fn new(analysts: Vec<Analyst>) -> Self {
        Self {
            analysts,
            ..Self::default()
        }
    }

    fn position(&self, analyst_id: &str, date: NaiveDate) -> Option<usize> {
        self.assignments
            .iter()
            .position(|a| a.analyst_id == analyst_id && a.date == date)
    }
}

impl ContextLoader for InMemoryStore {
    fn load_context(
        &self,
        start: NaiveDate,
        end: NaiveDate,
        shift_group: &str,
    ) -> Result<SchedulingContext, StoreError> {
        let from = shift_days(start, -CONTEXT_MARGIN_DAYS);
        let to = shift_days(end, CONTEXT_MARGIN_DAYS);
        Ok(SchedulingContext {
            start_date: start,
            end_date: end,
            shift_group: shift_group.to_string(),
            analysts: self.analysts.clone(),
            existing_assignments: self
                .assignments
                .iter()
                .filter(|a| a.date >= from && a.date <= to)
                .cloned()
                .collect(),
            constraints: self
                .constraints
                .iter()
                .filter(|c| c.start_date <= to && c.end_date >= from)
                .cloned()
                .collect(),
            holidays: self
                .holidays
                .iter()
                .copied()
                .filter(|h| *h >= start && *h <= end)
                .collect(),
        })
    }
}

impl ContinuityStore for InMemoryStore {
    fn get_continuity(
        &self,
        algorithm_id: &str,
        analyst_id: &str,
    ) -> Result<Option<PatternContinuity>, StoreError> {
        Ok(self
            .continuity
            .get(&(algorithm_id.to_string(), analyst_id.to_string()))
            .cloned())
    }

    fn continuity_for(&self, algorithm_id: &str) -> Result<Vec<PatternContinuity>, StoreError> {
        let mut records: Vec<PatternContinuity> = self
            .continuity
            .values()
            .filter(|c| c.algorithm_id == algorithm_id)
            .cloned()
            .collect();
        records.sort_by(|a, b| a.analyst_id.cmp(&b.analyst_id));
        Ok(records)
    }

    fn put_continuity(&mut self, record: &PatternContinuity) -> Result<(), StoreError> {
        self.continuity.insert(
            (record.algorithm_id.clone(), record.analyst_id.clone()),
            record.clone(),
        );
        Ok(())
    }
}

impl RotationStateStore for InMemoryStore {
    fn get_rotation_state(
        &self,
        algorithm_id: &str,
        shift_group: &str,
    ) -> Result<Option<RotationState>, StoreError> {
        Ok(self
            .rotation_states
            .get(&(algorithm_id.to_string(), shift_group.to_string()))
            .cloned())
    }

    fn put_rotation_state(
        &mut self,
        state: &RotationState,
        expected_version: u64,
    ) -> Result<(), StoreError> {
        let key = (state.algorithm_id.clone(), state.shift_group.clone());
        let found = self.rotation_states.get(&key).map_or(0, |s| s.version);
        if found != expected_version {
            return Err(StoreError::VersionConflict {
                expected: expected_version,
                found,
            });
        }
        self.rotation_states.insert(key, state.clone());
        Ok(())
    }
}

impl LedgerStore for InMemoryStore {
    fn load_ledger(&self) -> Result<CompOffLedger, StoreError> {
        CompOffLedger::from_transactions(self.transactions.clone())
            .map_err(|e| StoreError::Backend(e.to_string()))
    }

    fn save_ledger(&mut self, ledger: &CompOffLedger) -> Result<(), StoreError> {
        self.transactions = ledger.transactions().to_vec();
        Ok(())
    }
}

impl AssignmentSink for InMemoryStore {
    fn create(&mut self, assignment: &Assignment) -> Result<(), StoreError> {
        if self.position(&assignment.analyst_id, assignment.date).is_some() {
            return Err(StoreError::Duplicate {
                analyst_id: assignment.analyst_id.clone(),
                date: assignment.date,
            });
        }
        self.assignments.push(assignment.clone());
        Ok(())
    }

    fn update(&mut self, assignment: &Assignment) -> Result<(), StoreError> {
        let idx = self
            .position(&assignment.analyst_id, assignment.date)
            .ok_or_else(|| {
                StoreError::NotFound(format!(
                    "assignment for {} on {}",
                    assignment.analyst_id, assignment.date
                ))
            })?;
        self.assignments[idx] = assignment.clone();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(year: i32, month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, day).unwrap()
    }

    #[test]
    fn test_rotation_state_version_check() {
        let mut store = InMemoryStore::default();
        let mut state = RotationState::empty("weekend_rotation", "AMR-AM");
        state.version = 1;
        store.put_rotation_state(&state, 0).unwrap();

        // A second writer that also read version 0 loses
        let err = store.put_rotation_state(&state, 0).unwrap_err();
        assert_eq!(
            err,
            StoreError::VersionConflict {
                expected: 0,
                found: 1
            }
        );

        state.version = 2;
        store.put_rotation_state(&state, 1).unwrap();
        let stored = store
            .get_rotation_state("weekend_rotation", "AMR-AM")
            .unwrap()
            .unwrap();
        assert_eq!(stored.version, 2);
    }

    #[test]
    fn test_sink_create_and_update() {
        let mut store = InMemoryStore::default();
        let shift = Assignment::rotation("a1", d(2026, 1, 5), "AM");
        store.create(&shift).unwrap();
        assert!(matches!(
            store.create(&shift),
            Err(StoreError::Duplicate { .. })
        ));

        let mut changed = shift.clone();
        changed.shift_type = "PM".to_string();
        store.update(&changed).unwrap();
        assert_eq!(store.assignments[0].shift_type, "PM");

        let missing = Assignment::rotation("a2", d(2026, 1, 5), "AM");
        assert!(matches!(
            store.update(&missing),
            Err(StoreError::NotFound(_))
        ));
    }

    #[test]
    fn test_load_context_window() {
        let mut store = InMemoryStore::default();
        store.assignments = vec![
            Assignment::rotation("a1", d(2025, 12, 1), "AM"),
            Assignment::rotation("a1", d(2025, 12, 30), "AM"),
            Assignment::rotation("a1", d(2026, 1, 10), "AM"),
        ];
        store.holidays = vec![d(2026, 1, 1), d(2026, 1, 19)];
        let ctx = store
            .load_context(d(2026, 1, 4), d(2026, 1, 17), "AMR-AM")
            .unwrap();
        assert_eq!(ctx.existing_assignments.len(), 2);
        assert!(ctx.holidays.is_empty());
        assert_eq!(ctx.shift_group, "AMR-AM");
    }
}
