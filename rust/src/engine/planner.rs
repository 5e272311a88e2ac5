//! Load, generate and commit around the collaborator stores.

use chrono::NaiveDate;

use crate::config::EngineConfig;
use crate::ledger::CompOffLedger;
use crate::log_changes;
use crate::models::{ApplySummary, GenerationResult, SchedulingContext};
use crate::store::{
    AssignmentSink, ContextLoader, ContinuityStore, LedgerStore, RotationStateStore,
};
use crate::swap::{SwapOutcome, SwapRequest};

use super::apply::apply_decision;
use super::core::{EngineError, ScheduleGenerator};

/// A generated decision together with the snapshot it was computed from.
#[derive(Clone, Debug)]
pub struct PlannedRun {
    pub context: SchedulingContext,
    pub result: GenerationResult,
}

/// Drives one store through the generate/commit cycle.
pub struct Planner<S> {
    store: S,
    config: EngineConfig,
}

impl<S> Planner<S>
where
    S: ContextLoader + ContinuityStore + RotationStateStore + LedgerStore + AssignmentSink,
{
    pub fn new(store: S, config: EngineConfig) -> Self {
        Self { store, config }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Load a snapshot and generate a decision for it. Nothing is written.
    pub fn plan(
        &self,
        start: NaiveDate,
        end: NaiveDate,
        shift_group: &str,
    ) -> Result<PlannedRun, EngineError> {
        let generator = ScheduleGenerator::new(&self.config)?;
        let context = self.store.load_context(start, end, shift_group)?;
        let continuity = self.store.continuity_for(&self.config.algorithm_id)?;
        let state = self
            .store
            .get_rotation_state(&self.config.algorithm_id, shift_group)?;

        let result = generator.generate(&context, &continuity, state.as_ref())?;
        Ok(PlannedRun { context, result })
    }

    /// Persist a planned run.
    ///
    /// The rotation state goes first and is version-checked, so a run planned
    /// from a stale cursor fails with `StoreError::VersionConflict` before any
    /// assignment is written.
    pub fn commit(&mut self, run: &PlannedRun) -> Result<ApplySummary, EngineError> {
        let state = &run.result.next_rotation_state;
        let expected = state.version.saturating_sub(1);
        self.store.put_rotation_state(state, expected)?;

        for record in &run.result.next_continuity {
            self.store.put_continuity(record)?;
        }

        let summary = apply_decision(
            &run.result,
            &run.context.existing_assignments,
            &mut self.store,
            self.config.verbosity,
        );

        if self.config.comp_off_on_weekend {
            let mut ledger: CompOffLedger = self.store.load_ledger()?;
            let earned = ledger.record_weekend_work(&run.result.proposed_assignments);
            log_changes!(
                self.config.verbosity,
                "Committed {} created, {} updated, {} comp-off days earned",
                summary.created,
                summary.updated,
                earned.len()
            );
            self.store.save_ledger(&ledger)?;
        }
        Ok(summary)
    }

    /// Plan and commit in one step.
    pub fn run(
        &mut self,
        start: NaiveDate,
        end: NaiveDate,
        shift_group: &str,
    ) -> Result<(GenerationResult, ApplySummary), EngineError> {
        let planned = self.plan(start, end, shift_group)?;
        let summary = self.commit(&planned)?;
        Ok((planned.result, summary))
    }

    /// Validate a swap against the stored schedule around `[start, end]`.
    pub fn validate_swap(
        &self,
        request: &SwapRequest,
        start: NaiveDate,
        end: NaiveDate,
        shift_group: &str,
    ) -> Result<SwapOutcome, EngineError> {
        let generator = ScheduleGenerator::new(&self.config)?;
        let context = self.store.load_context(start, end, shift_group)?;
        generator.validate_swap(&context, request)
    }
}
