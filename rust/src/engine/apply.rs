//! Writing a generation decision through an `AssignmentSink`.

use chrono::NaiveDate;
use rustc_hash::FxHashSet;

use crate::log_changes;
use crate::models::{ApplySummary, Assignment, GenerationResult, Severity, Violation, ViolationKind};
use crate::store::AssignmentSink;

/// Persist every proposed assignment, creating or updating as needed.
///
/// A failed write is recorded as a conflict and the loop continues; one bad
/// item never aborts the batch.
pub fn apply_decision(
    result: &GenerationResult,
    existing: &[Assignment],
    sink: &mut dyn AssignmentSink,
    verbosity: u8,
) -> ApplySummary {
    let scheduled: FxHashSet<(&str, NaiveDate)> = existing
        .iter()
        .map(|a| (a.analyst_id.as_str(), a.date))
        .collect();

    let mut summary = ApplySummary::default();
    for assignment in &result.proposed_assignments {
        let key = (assignment.analyst_id.as_str(), assignment.date);
        let (outcome, is_update) = if scheduled.contains(&key) {
            (sink.update(assignment), true)
        } else {
            (sink.create(assignment), false)
        };

        match outcome {
            Ok(()) if is_update => summary.updated += 1,
            Ok(()) => summary.created += 1,
            Err(e) => {
                log_changes!(
                    verbosity,
                    "  Apply failed for {} on {}: {}",
                    assignment.analyst_id,
                    assignment.date,
                    e
                );
                summary.conflicted += 1;
                summary.conflicts.push(Violation::new(
                    ViolationKind::ConstraintViolation,
                    Severity::High,
                    Some(&assignment.analyst_id),
                    Some(assignment.date),
                    e.to_string(),
                ));
            }
        }
    }
    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fairness::{dispersion, FairnessMetrics, SCREENER, WEEKEND, WORKLOAD};
    use crate::rotation::RotationState;
    use crate::store::{InMemoryStore, StoreError};
    use std::collections::HashMap;

    fn d(year: i32, month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, day).unwrap()
    }

    fn result_with(proposed: Vec<Assignment>) -> GenerationResult {
        GenerationResult {
            proposed_assignments: proposed,
            conflicts: Vec::new(),
            overwrites: Vec::new(),
            fairness_metrics: FairnessMetrics {
                workload: dispersion(WORKLOAD, &[]),
                screener: dispersion(SCREENER, &[]),
                weekend: dispersion(WEEKEND, &[]),
                overall_score: 1.0,
                recommendations: Vec::new(),
            },
            performance_metrics: HashMap::new(),
            comp_off_earned: Vec::new(),
            next_rotation_state: RotationState::default(),
            next_continuity: Vec::new(),
            new_to_rotation: Vec::new(),
            algorithm_metadata: HashMap::new(),
        }
    }

    /// Sink that rejects every write for one analyst.
    struct Flaky {
        inner: InMemoryStore,
        reject: &'static str,
    }

    impl AssignmentSink for Flaky {
        fn create(&mut self, assignment: &Assignment) -> Result<(), StoreError> {
            if assignment.analyst_id == self.reject {
                return Err(StoreError::Backend("write refused".to_string()));
            }
            self.inner.create(assignment)
        }

        fn update(&mut self, assignment: &Assignment) -> Result<(), StoreError> {
            self.inner.update(assignment)
        }
    }

    #[test]
    fn test_creates_and_updates() {
        let mut store = InMemoryStore::default();
        let existing = Assignment::rotation("a1", d(2026, 1, 5), "PM");
        store.assignments.push(existing.clone());

        let result = result_with(vec![
            Assignment::rotation("a1", d(2026, 1, 5), "AM"),
            Assignment::rotation("a1", d(2026, 1, 6), "AM"),
        ]);
        let summary = apply_decision(&result, &[existing], &mut store, 0);
        assert_eq!(summary.created, 1);
        assert_eq!(summary.updated, 1);
        assert_eq!(summary.conflicted, 0);
        assert_eq!(store.assignments[0].shift_type, "AM");
    }

    #[test]
    fn test_failures_are_captured_per_item() {
        let mut sink = Flaky {
            inner: InMemoryStore::default(),
            reject: "a2",
        };
        let result = result_with(vec![
            Assignment::rotation("a1", d(2026, 1, 5), "AM"),
            Assignment::rotation("a2", d(2026, 1, 5), "AM"),
            Assignment::rotation("a3", d(2026, 1, 5), "AM"),
        ]);
        let summary = apply_decision(&result, &[], &mut sink, 0);
        assert_eq!(summary.created, 2);
        assert_eq!(summary.conflicted, 1);
        assert_eq!(summary.conflicts[0].analyst_id.as_deref(), Some("a2"));
        assert_eq!(sink.inner.assignments.len(), 2);
    }
}
