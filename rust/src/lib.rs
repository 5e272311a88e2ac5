//! Rust implementation of the shiftplanner rotation and fairness engine.
//!
//! Generates weekly shift rotations with weekend coverage, layers screener
//! duty on top, validates hard labor rules, scores fairness, keeps the
//! comp-off ledger and simulates shift swaps.

// Allow clippy warning triggered by PyO3 macro expansion
#![allow(clippy::useless_conversion)]

use chrono::NaiveDate;
use pyo3::exceptions::PyValueError;
use pyo3::prelude::*;
use std::collections::HashMap;

pub mod calendar;
mod config;
pub mod constraints;
pub mod engine;
pub mod fairness;
pub mod ledger;
pub mod logging;
mod models;
pub mod ranking;
pub mod rotation;
pub mod screener;
pub mod store;
pub mod swap;
pub mod workload;

pub use config::{EngineConfig, FairnessConfig, RotationConfig, ScreenerWeights, KNOWN_STRATEGIES};
pub use constraints::ConstraintEngine;
pub use engine::{apply_decision, generate, EngineError, PlannedRun, Planner, ScheduleGenerator};
pub use fairness::{DispersionStats, DutyCounts, FairnessEngine, FairnessMetrics, Recommendation};
pub use ledger::{CompOffBalance, CompOffLedger, LedgerError};
pub use models::{
    Analyst, ApplySummary, Assignment, AssignmentSource, CompOffTransaction, Constraint,
    ConstraintKind, GenerationResult, Overwrite, SchedulingContext, Severity, TransactionKind,
    Violation, ViolationKind, WeeklyWorkload,
};
pub use rotation::{PatternContinuity, RotationState, WorkPattern};
pub use store::{InMemoryStore, StoreError};
pub use swap::{DateSpan, SwapOutcome, SwapRequest, SwapSimulator};
pub use workload::{WorkloadBalancer, WorkloadIssue, WorkloadViolation};

/// Generate a schedule decision for one shift group and date range.
///
/// # Arguments
/// * `context` - Snapshot of analysts, existing assignments, constraints and holidays
/// * `continuity` - Continuity records from earlier runs (any algorithm; filtered here)
/// * `rotation_state` - Persisted rotation cursor for the group, if any
/// * `config` - Engine configuration (defaults when omitted)
///
/// # Returns
/// * GenerationResult with proposals, conflicts, overwrites, metrics and the
///   next rotation state/continuity to persist
///
/// # Raises
/// * ValueError on an empty roster, inverted range or invalid configuration
#[pyfunction]
#[pyo3(signature = (context, continuity=None, rotation_state=None, config=None))]
fn generate_schedule(
    context: SchedulingContext,
    continuity: Option<Vec<PatternContinuity>>,
    rotation_state: Option<RotationState>,
    config: Option<EngineConfig>,
) -> PyResult<GenerationResult> {
    let config = config.unwrap_or_default();
    let continuity = continuity.unwrap_or_default();

    match generate(&context, &continuity, rotation_state.as_ref(), &config) {
        Ok(result) => Ok(result),
        Err(e) => Err(PyValueError::new_err(e.to_string())),
    }
}

/// Simulate a swap and report violations on both analysts' timelines.
///
/// # Raises
/// * ValueError if the request is malformed (same analyst, unknown analyst,
///   inverted span, or a giver who works nothing in their span)
#[pyfunction]
#[pyo3(signature = (context, request, config=None))]
fn validate_swap(
    context: SchedulingContext,
    request: SwapRequest,
    config: Option<EngineConfig>,
) -> PyResult<SwapOutcome> {
    let config = config.unwrap_or_default();
    ScheduleGenerator::new(&config)
        .and_then(|generator| generator.validate_swap(&context, &request))
        .map_err(|e| PyValueError::new_err(e.to_string()))
}

/// Score per-analyst duty counts. Analysts missing from a dict count as zero.
#[pyfunction]
#[pyo3(signature = (total_days, screener_days, weekend_days, config=None))]
fn score_fairness(
    total_days: HashMap<String, f64>,
    screener_days: HashMap<String, f64>,
    weekend_days: HashMap<String, f64>,
    config: Option<FairnessConfig>,
) -> FairnessMetrics {
    let config = config.unwrap_or_default();
    let counts = DutyCounts::from_maps(&total_days, &screener_days, &weekend_days);
    FairnessEngine::new(&config).score(&counts)
}

/// Score the duties `analyst_ids` carry in `assignments` between `start` and `end`.
#[pyfunction]
#[pyo3(signature = (analyst_ids, assignments, start, end, config=None))]
fn fairness_from_assignments(
    analyst_ids: Vec<String>,
    assignments: Vec<Assignment>,
    start: NaiveDate,
    end: NaiveDate,
    config: Option<FairnessConfig>,
) -> FairnessMetrics {
    let config = config.unwrap_or_default();
    let roster: Vec<&str> = analyst_ids.iter().map(String::as_str).collect();
    let refs: Vec<&Assignment> = assignments.iter().collect();
    let counts = fairness::counts_from_assignments(&roster, &refs, start, end);
    FairnessEngine::new(&config).score(&counts)
}

/// Workload of one analyst for the week containing `week_of`.
#[pyfunction]
#[pyo3(signature = (analyst_id, week_of, assignments, transactions=None, holidays=None, max_work_days_per_week=5))]
fn summarize_workload(
    analyst_id: &str,
    week_of: NaiveDate,
    assignments: Vec<Assignment>,
    transactions: Option<Vec<CompOffTransaction>>,
    holidays: Option<Vec<NaiveDate>>,
    max_work_days_per_week: u32,
) -> WeeklyWorkload {
    WorkloadBalancer::new(max_work_days_per_week).summarize(
        analyst_id,
        week_of,
        &assignments,
        &transactions.unwrap_or_default(),
        &holidays.unwrap_or_default(),
    )
}

/// Overtime and uncredited holiday work for the week containing `week_of`.
#[pyfunction]
#[pyo3(signature = (analyst_ids, week_of, assignments, transactions=None, holidays=None, max_work_days_per_week=5))]
fn balance_week(
    analyst_ids: Vec<String>,
    week_of: NaiveDate,
    assignments: Vec<Assignment>,
    transactions: Option<Vec<CompOffTransaction>>,
    holidays: Option<Vec<NaiveDate>>,
    max_work_days_per_week: u32,
) -> Vec<WorkloadViolation> {
    WorkloadBalancer::new(max_work_days_per_week).balance_week(
        &analyst_ids,
        week_of,
        &assignments,
        &transactions.unwrap_or_default(),
        &holidays.unwrap_or_default(),
    )
}

/// The shiftplanner.rust Python module.
#[pymodule]
fn rust(m: &Bound<'_, PyModule>) -> PyResult<()> {
    // Core data types
    m.add_class::<Analyst>()?;
    m.add_class::<Assignment>()?;
    m.add_class::<AssignmentSource>()?;
    m.add_class::<Constraint>()?;
    m.add_class::<ConstraintKind>()?;
    m.add_class::<SchedulingContext>()?;
    m.add_class::<Violation>()?;
    m.add_class::<ViolationKind>()?;
    m.add_class::<Severity>()?;
    m.add_class::<Overwrite>()?;
    m.add_class::<GenerationResult>()?;
    m.add_class::<ApplySummary>()?;

    // Rotation
    m.add_class::<WorkPattern>()?;
    m.add_class::<PatternContinuity>()?;
    m.add_class::<RotationState>()?;

    // Config types
    m.add_class::<EngineConfig>()?;
    m.add_class::<RotationConfig>()?;
    m.add_class::<ScreenerWeights>()?;
    m.add_class::<FairnessConfig>()?;

    // Fairness, ledger, workload, swaps
    m.add_class::<DispersionStats>()?;
    m.add_class::<Recommendation>()?;
    m.add_class::<FairnessMetrics>()?;
    m.add_class::<CompOffTransaction>()?;
    m.add_class::<TransactionKind>()?;
    m.add_class::<CompOffBalance>()?;
    m.add_class::<CompOffLedger>()?;
    m.add_class::<WeeklyWorkload>()?;
    m.add_class::<WorkloadIssue>()?;
    m.add_class::<WorkloadViolation>()?;
    m.add_class::<DateSpan>()?;
    m.add_class::<SwapRequest>()?;
    m.add_class::<SwapOutcome>()?;

    // Algorithms
    m.add_function(wrap_pyfunction!(generate_schedule, m)?)?;
    m.add_function(wrap_pyfunction!(validate_swap, m)?)?;
    m.add_function(wrap_pyfunction!(score_fairness, m)?)?;
    m.add_function(wrap_pyfunction!(fairness_from_assignments, m)?)?;
    m.add_function(wrap_pyfunction!(summarize_workload, m)?)?;
    m.add_function(wrap_pyfunction!(balance_week, m)?)?;

    Ok(())
}
