//! Persistent rotation cursor and per-analyst continuity records.
//!
//! Both types are snapshots: the engine reads them at the start of a run and
//! returns new values at the end. Persisting them atomically is the caller's job.

use chrono::NaiveDate;
use pyo3::prelude::*;
use std::collections::{HashMap, HashSet};

/// Last pattern occurrence an analyst held under a given rotation algorithm.
#[pyclass]
#[derive(Clone, Debug, PartialEq)]
pub struct PatternContinuity {
    #[pyo3(get, set)]
    pub algorithm_id: String,
    #[pyo3(get, set)]
    pub analyst_id: String,
    #[pyo3(get, set)]
    pub last_pattern: String,
    /// Week start on which the `last_pattern` occurrence began
    #[pyo3(get, set)]
    pub pattern_start: NaiveDate,
    #[pyo3(get, set)]
    pub last_worked_date: NaiveDate,
    #[pyo3(get, set)]
    pub last_weekend_date: Option<NaiveDate>,
}

#[pymethods]
impl PatternContinuity {
    #[new]
    #[pyo3(signature = (
        algorithm_id,
        analyst_id,
        last_pattern,
        pattern_start,
        last_worked_date,
        last_weekend_date=None
    ))]
    fn new(
        algorithm_id: String,
        analyst_id: String,
        last_pattern: String,
        pattern_start: NaiveDate,
        last_worked_date: NaiveDate,
        last_weekend_date: Option<NaiveDate>,
    ) -> Self {
        Self {
            algorithm_id,
            analyst_id,
            last_pattern,
            pattern_start,
            last_worked_date,
            last_weekend_date,
        }
    }

    fn __repr__(&self) -> String {
        format!(
            "PatternContinuity(analyst_id={:?}, last_pattern={:?}, pattern_start={}, last_worked={})",
            self.analyst_id, self.last_pattern, self.pattern_start, self.last_worked_date
        )
    }
}

/// Versioned rotation cursor for one (algorithm, shift group).
#[pyclass]
#[derive(Clone, Debug, PartialEq, Default)]
pub struct RotationState {
    #[pyo3(get, set)]
    pub algorithm_id: String,
    #[pyo3(get, set)]
    pub shift_group: String,
    /// Week the holder snapshot describes (None before the first run)
    #[pyo3(get, set)]
    pub as_of: Option<NaiveDate>,
    /// Pattern name -> analysts holding it during `as_of`
    #[pyo3(get, set)]
    pub slot_holders: HashMap<String, Vec<String>>,
    /// Analysts who held every weekend pattern in the cycle containing `as_of`
    #[pyo3(get, set)]
    pub completed: HashSet<String>,
    /// Analysts on a weekend-bearing pattern during `as_of`
    #[pyo3(get, set)]
    pub in_progress: HashSet<String>,
    /// Incremented on every run; stores use it for optimistic concurrency
    #[pyo3(get, set)]
    pub version: u64,
}

impl RotationState {
    /// Empty cursor for a group that has never been generated.
    pub fn empty(algorithm_id: &str, shift_group: &str) -> Self {
        Self {
            algorithm_id: algorithm_id.to_string(),
            shift_group: shift_group.to_string(),
            ..Self::default()
        }
    }

    /// Pattern held by `analyst_id` during `as_of`.
    pub fn pattern_of(&self, analyst_id: &str) -> Option<&str> {
        self.slot_holders
            .iter()
            .find(|(_, holders)| holders.iter().any(|h| h == analyst_id))
            .map(|(pattern, _)| pattern.as_str())
    }

    pub fn is_in_progress(&self, analyst_id: &str) -> bool {
        self.in_progress.contains(analyst_id)
    }

    pub fn holder_count(&self) -> usize {
        self.slot_holders.values().map(Vec::len).sum()
    }
}

#[pymethods]
impl RotationState {
    #[new]
    #[pyo3(signature = (
        algorithm_id,
        shift_group,
        as_of=None,
        slot_holders=None,
        completed=None,
        in_progress=None,
        version=0
    ))]
    fn new(
        algorithm_id: String,
        shift_group: String,
        as_of: Option<NaiveDate>,
        slot_holders: Option<HashMap<String, Vec<String>>>,
        completed: Option<HashSet<String>>,
        in_progress: Option<HashSet<String>>,
        version: u64,
    ) -> Self {
        Self {
            algorithm_id,
            shift_group,
            as_of,
            slot_holders: slot_holders.unwrap_or_default(),
            completed: completed.unwrap_or_default(),
            in_progress: in_progress.unwrap_or_default(),
            version,
        }
    }

    fn __repr__(&self) -> String {
        format!(
            "RotationState(group={:?}, as_of={:?}, holders={}, in_progress={}, version={})",
            self.shift_group,
            self.as_of,
            self.holder_count(),
            self.in_progress.len(),
            self.version
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pattern_lookup() {
        let mut state = RotationState::empty("weekend_rotation", "AMR-AM");
        state
            .slot_holders
            .insert("SUN_THU".to_string(), vec!["a1".to_string(), "a4".to_string()]);
        state
            .slot_holders
            .insert("MON_FRI".to_string(), vec!["a2".to_string()]);
        state.in_progress.insert("a1".to_string());

        assert_eq!(state.pattern_of("a4"), Some("SUN_THU"));
        assert_eq!(state.pattern_of("a2"), Some("MON_FRI"));
        assert_eq!(state.pattern_of("a9"), None);
        assert!(state.is_in_progress("a1"));
        assert!(!state.is_in_progress("a2"));
        assert_eq!(state.holder_count(), 3);
        assert_eq!(state.version, 0);
    }
}
