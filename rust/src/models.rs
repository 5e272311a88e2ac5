//! Core data types for the shift engine.

use chrono::NaiveDate;
use pyo3::prelude::*;
use std::collections::HashMap;

use crate::fairness::FairnessMetrics;
use crate::rotation::{PatternContinuity, RotationState};

// Note: We use std HashMap here for PyO3 interface compatibility

/// Severity of a reported violation.
#[pyclass(eq, eq_int)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "LOW",
            Self::Medium => "MEDIUM",
            Self::High => "HIGH",
            Self::Critical => "CRITICAL",
        }
    }
}

/// Category of a reported violation.
#[pyclass(eq, eq_int)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ViolationKind {
    BlackoutDate,
    InsufficientStaff,
    ConstraintViolation,
    FairnessViolation,
}

impl ViolationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BlackoutDate => "BLACKOUT_DATE",
            Self::InsufficientStaff => "INSUFFICIENT_STAFF",
            Self::ConstraintViolation => "CONSTRAINT_VIOLATION",
            Self::FairnessViolation => "FAIRNESS_VIOLATION",
        }
    }
}

/// Kind of date-interval constraint.
#[pyclass(eq, eq_int)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ConstraintKind {
    /// Analyst-scoped leave
    Vacation,
    /// Analyst-scoped blackout
    Blackout,
    /// Organization-wide blackout
    GlobalBlackout,
}

/// Where an assignment came from.
#[pyclass(eq, eq_int)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AssignmentSource {
    Rotation,
    Manual,
    Swap,
}

/// Comp-off ledger entry type.
#[pyclass(eq, eq_int)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TransactionKind {
    Earned,
    AutoAssigned,
    Used,
}

/// A staff member eligible for shift assignment.
#[pyclass]
#[derive(Clone, Debug)]
pub struct Analyst {
    #[pyo3(get, set)]
    pub id: String,
    #[pyo3(get, set)]
    pub name: String,
    #[pyo3(get, set)]
    pub region: String,
    /// Time-of-day shift ("AM", "PM", ...)
    #[pyo3(get, set)]
    pub shift: String,
    #[pyo3(get, set)]
    pub active: bool,
    #[pyo3(get, set)]
    pub skills: Vec<String>,
}

impl Analyst {
    /// Shift-group key: region plus time-of-day shift.
    pub fn group_key(&self) -> String {
        format!("{}-{}", self.region, self.shift)
    }

    pub fn has_skill(&self, skill: &str) -> bool {
        self.skills.iter().any(|s| s == skill)
    }
}

#[pymethods]
impl Analyst {
    #[new]
    #[pyo3(signature = (id, region, shift, name=None, active=true, skills=None))]
    fn new(
        id: String,
        region: String,
        shift: String,
        name: Option<String>,
        active: bool,
        skills: Option<Vec<String>>,
    ) -> Self {
        Self {
            name: name.unwrap_or_else(|| id.clone()),
            id,
            region,
            shift,
            active,
            skills: skills.unwrap_or_default(),
        }
    }

    #[getter]
    fn shift_group(&self) -> String {
        self.group_key()
    }

    fn __repr__(&self) -> String {
        format!(
            "Analyst(id={:?}, group={:?}, active={})",
            self.id,
            self.group_key(),
            self.active
        )
    }
}

/// One schedule entry: (analyst, date) -> shift type and screener flag.
#[pyclass]
#[derive(Clone, Debug, PartialEq)]
pub struct Assignment {
    #[pyo3(get, set)]
    pub analyst_id: String,
    #[pyo3(get, set)]
    pub date: NaiveDate,
    #[pyo3(get, set)]
    pub shift_type: String,
    #[pyo3(get, set)]
    pub is_screener: bool,
    #[pyo3(get, set)]
    pub source: AssignmentSource,
}

impl Assignment {
    /// A regular (non-screener) shift proposed by the rotation.
    pub fn rotation(analyst_id: &str, date: NaiveDate, shift_type: &str) -> Self {
        Self {
            analyst_id: analyst_id.to_string(),
            date,
            shift_type: shift_type.to_string(),
            is_screener: false,
            source: AssignmentSource::Rotation,
        }
    }
}

#[pymethods]
impl Assignment {
    #[new]
    #[pyo3(signature = (analyst_id, date, shift_type, is_screener=false, source=AssignmentSource::Manual))]
    fn new(
        analyst_id: String,
        date: NaiveDate,
        shift_type: String,
        is_screener: bool,
        source: AssignmentSource,
    ) -> Self {
        Self {
            analyst_id,
            date,
            shift_type,
            is_screener,
            source,
        }
    }

    fn __repr__(&self) -> String {
        format!(
            "Assignment(analyst_id={:?}, date={}, shift_type={:?}, screener={})",
            self.analyst_id, self.date, self.shift_type, self.is_screener
        )
    }
}

/// An inclusive date interval during which an analyst (or everyone) may not work.
#[pyclass]
#[derive(Clone, Debug)]
pub struct Constraint {
    #[pyo3(get, set)]
    pub kind: ConstraintKind,
    /// None for organization-wide constraints
    #[pyo3(get, set)]
    pub analyst_id: Option<String>,
    #[pyo3(get, set)]
    pub start_date: NaiveDate,
    #[pyo3(get, set)]
    pub end_date: NaiveDate,
    #[pyo3(get, set)]
    pub active: bool,
    #[pyo3(get, set)]
    pub reason: String,
}

impl Constraint {
    pub fn vacation(analyst_id: &str, start_date: NaiveDate, end_date: NaiveDate) -> Self {
        Self {
            kind: ConstraintKind::Vacation,
            analyst_id: Some(analyst_id.to_string()),
            start_date,
            end_date,
            active: true,
            reason: "vacation".to_string(),
        }
    }

    pub fn global_blackout(start_date: NaiveDate, end_date: NaiveDate, reason: &str) -> Self {
        Self {
            kind: ConstraintKind::GlobalBlackout,
            analyst_id: None,
            start_date,
            end_date,
            active: true,
            reason: reason.to_string(),
        }
    }

    pub fn is_global(&self) -> bool {
        self.analyst_id.is_none() || self.kind == ConstraintKind::GlobalBlackout
    }

    /// Whether this constraint is active and covers `date`.
    pub fn covers(&self, date: NaiveDate) -> bool {
        self.active && self.start_date <= date && date <= self.end_date
    }
}

#[pymethods]
impl Constraint {
    #[new]
    #[pyo3(signature = (kind, start_date, end_date, analyst_id=None, active=true, reason=None))]
    fn new(
        kind: ConstraintKind,
        start_date: NaiveDate,
        end_date: NaiveDate,
        analyst_id: Option<String>,
        active: bool,
        reason: Option<String>,
    ) -> Self {
        Self {
            kind,
            analyst_id,
            start_date,
            end_date,
            active,
            reason: reason.unwrap_or_default(),
        }
    }

    fn __repr__(&self) -> String {
        format!(
            "Constraint(kind={:?}, analyst_id={:?}, start={}, end={}, active={})",
            self.kind, self.analyst_id, self.start_date, self.end_date, self.active
        )
    }
}

/// Read-only snapshot handed to the engine for one call.
#[pyclass]
#[derive(Clone, Debug)]
pub struct SchedulingContext {
    #[pyo3(get, set)]
    pub start_date: NaiveDate,
    #[pyo3(get, set)]
    pub end_date: NaiveDate,
    #[pyo3(get, set)]
    pub shift_group: String,
    #[pyo3(get, set)]
    pub analysts: Vec<Analyst>,
    #[pyo3(get, set)]
    pub existing_assignments: Vec<Assignment>,
    #[pyo3(get, set)]
    pub constraints: Vec<Constraint>,
    #[pyo3(get, set)]
    pub holidays: Vec<NaiveDate>,
}

impl SchedulingContext {
    pub fn analyst(&self, analyst_id: &str) -> Option<&Analyst> {
        self.analysts.iter().find(|a| a.id == analyst_id)
    }

    /// Active analysts of the context's shift group, sorted by id.
    pub fn rotating_analysts(&self) -> Vec<&Analyst> {
        let mut roster: Vec<&Analyst> = self
            .analysts
            .iter()
            .filter(|a| a.active && a.group_key() == self.shift_group)
            .collect();
        roster.sort_by(|a, b| a.id.cmp(&b.id));
        roster
    }
}

#[pymethods]
impl SchedulingContext {
    #[new]
    #[pyo3(signature = (
        start_date,
        end_date,
        shift_group,
        analysts,
        existing_assignments=None,
        constraints=None,
        holidays=None
    ))]
    fn new(
        start_date: NaiveDate,
        end_date: NaiveDate,
        shift_group: String,
        analysts: Vec<Analyst>,
        existing_assignments: Option<Vec<Assignment>>,
        constraints: Option<Vec<Constraint>>,
        holidays: Option<Vec<NaiveDate>>,
    ) -> Self {
        Self {
            start_date,
            end_date,
            shift_group,
            analysts,
            existing_assignments: existing_assignments.unwrap_or_default(),
            constraints: constraints.unwrap_or_default(),
            holidays: holidays.unwrap_or_default(),
        }
    }

    fn __repr__(&self) -> String {
        format!(
            "SchedulingContext(start={}, end={}, group={:?}, analysts={}, existing={})",
            self.start_date,
            self.end_date,
            self.shift_group,
            self.analysts.len(),
            self.existing_assignments.len()
        )
    }
}

/// A reported (non-fatal) rule violation.
#[pyclass]
#[derive(Clone, Debug, PartialEq)]
pub struct Violation {
    #[pyo3(get, set)]
    pub kind: ViolationKind,
    #[pyo3(get, set)]
    pub severity: Severity,
    #[pyo3(get, set)]
    pub analyst_id: Option<String>,
    #[pyo3(get, set)]
    pub date: Option<NaiveDate>,
    #[pyo3(get, set)]
    pub message: String,
}

impl Violation {
    pub fn new(
        kind: ViolationKind,
        severity: Severity,
        analyst_id: Option<&str>,
        date: Option<NaiveDate>,
        message: String,
    ) -> Self {
        Self {
            kind,
            severity,
            analyst_id: analyst_id.map(str::to_string),
            date,
            message,
        }
    }

    /// Total order used to report violations deterministically.
    pub fn sort_key(&self) -> (Option<&str>, Option<NaiveDate>, ViolationKind, &str) {
        (
            self.analyst_id.as_deref(),
            self.date,
            self.kind,
            self.message.as_str(),
        )
    }
}

/// Sort violations into their canonical report order.
pub fn sort_violations(violations: &mut [Violation]) {
    violations.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));
}

#[pymethods]
impl Violation {
    #[getter]
    fn kind_name(&self) -> &'static str {
        self.kind.as_str()
    }

    #[getter]
    fn severity_name(&self) -> &'static str {
        self.severity.as_str()
    }

    fn __repr__(&self) -> String {
        format!(
            "Violation(kind={}, severity={}, analyst_id={:?}, date={:?}, message={:?})",
            self.kind.as_str(),
            self.severity.as_str(),
            self.analyst_id,
            self.date,
            self.message
        )
    }
}

/// Compensatory time-off ledger entry.
#[pyclass]
#[derive(Clone, Debug, PartialEq)]
pub struct CompOffTransaction {
    #[pyo3(get, set)]
    pub id: u64,
    #[pyo3(get, set)]
    pub analyst_id: String,
    #[pyo3(get, set)]
    pub kind: TransactionKind,
    #[pyo3(get, set)]
    pub earned_date: NaiveDate,
    /// Day off taken (USED) or scheduled (AUTO_ASSIGNED)
    #[pyo3(get, set)]
    pub consumed_date: Option<NaiveDate>,
    #[pyo3(get, set)]
    pub days: f64,
    #[pyo3(get, set)]
    pub is_banked: bool,
    #[pyo3(get, set)]
    pub is_auto: bool,
    #[pyo3(get, set)]
    pub reason: String,
}

#[pymethods]
impl CompOffTransaction {
    fn __repr__(&self) -> String {
        format!(
            "CompOffTransaction(id={}, analyst_id={:?}, kind={:?}, days={}, earned={}, consumed={:?})",
            self.id, self.analyst_id, self.kind, self.days, self.earned_date, self.consumed_date
        )
    }
}

/// Per-analyst, per-week workload summary. Derived, never authoritative.
#[pyclass]
#[derive(Clone, Debug, PartialEq)]
pub struct WeeklyWorkload {
    #[pyo3(get)]
    pub analyst_id: String,
    #[pyo3(get)]
    pub week_start: NaiveDate,
    #[pyo3(get)]
    pub scheduled_days: u32,
    #[pyo3(get)]
    pub weekend_days: u32,
    #[pyo3(get)]
    pub holiday_days: u32,
    #[pyo3(get)]
    pub overtime_days: u32,
    #[pyo3(get)]
    pub comp_off_days: f64,
    #[pyo3(get)]
    pub total_work_days: f64,
    #[pyo3(get)]
    pub is_balanced: bool,
}

#[pymethods]
impl WeeklyWorkload {
    fn __repr__(&self) -> String {
        format!(
            "WeeklyWorkload(analyst_id={:?}, week={}, scheduled={}, total={}, balanced={})",
            self.analyst_id,
            self.week_start,
            self.scheduled_days,
            self.total_work_days,
            self.is_balanced
        )
    }
}

/// A proposal that would replace a different existing assignment.
#[pyclass]
#[derive(Clone, Debug, PartialEq)]
pub struct Overwrite {
    #[pyo3(get)]
    pub analyst_id: String,
    #[pyo3(get)]
    pub date: NaiveDate,
    #[pyo3(get)]
    pub existing: Assignment,
    #[pyo3(get)]
    pub proposed: Assignment,
}

#[pymethods]
impl Overwrite {
    fn __repr__(&self) -> String {
        format!(
            "Overwrite(analyst_id={:?}, date={}, existing={:?}, proposed={:?})",
            self.analyst_id, self.date, self.existing.shift_type, self.proposed.shift_type
        )
    }
}

/// Decision object returned by a generation run.
#[pyclass]
#[derive(Clone, Debug)]
pub struct GenerationResult {
    #[pyo3(get)]
    pub proposed_assignments: Vec<Assignment>,
    #[pyo3(get)]
    pub conflicts: Vec<Violation>,
    #[pyo3(get)]
    pub overwrites: Vec<Overwrite>,
    #[pyo3(get)]
    pub fairness_metrics: FairnessMetrics,
    #[pyo3(get)]
    pub performance_metrics: HashMap<String, f64>,
    /// EARNED comp-off entries for generated weekend work (not yet persisted)
    #[pyo3(get)]
    pub comp_off_earned: Vec<CompOffTransaction>,
    /// Rotation cursor the caller should persist atomically
    #[pyo3(get)]
    pub next_rotation_state: RotationState,
    /// Continuity records the caller should persist
    #[pyo3(get)]
    pub next_continuity: Vec<PatternContinuity>,
    /// Analysts who entered the rotation with no history
    #[pyo3(get)]
    pub new_to_rotation: Vec<String>,
    #[pyo3(get)]
    pub algorithm_metadata: HashMap<String, String>,
}

#[pymethods]
impl GenerationResult {
    fn __repr__(&self) -> String {
        format!(
            "GenerationResult(proposed={}, conflicts={}, overwrites={}, fairness={:.3})",
            self.proposed_assignments.len(),
            self.conflicts.len(),
            self.overwrites.len(),
            self.fairness_metrics.overall_score
        )
    }
}

/// Outcome of applying a decision through a persistence sink.
#[pyclass]
#[derive(Clone, Debug, Default)]
pub struct ApplySummary {
    #[pyo3(get)]
    pub created: u32,
    #[pyo3(get)]
    pub updated: u32,
    #[pyo3(get)]
    pub conflicted: u32,
    #[pyo3(get)]
    pub conflicts: Vec<Violation>,
}

#[pymethods]
impl ApplySummary {
    fn __repr__(&self) -> String {
        format!(
            "ApplySummary(created={}, updated={}, conflicted={})",
            self.created, self.updated, self.conflicted
        )
    }
}
