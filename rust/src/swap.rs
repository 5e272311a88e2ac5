//! Swap safety simulation.
//!
//! Both analysts' post-swap timelines are rebuilt from the current schedule
//! and run through the constraint engine independently. Nothing is written.

use chrono::NaiveDate;
use pyo3::prelude::*;
use rustc_hash::FxHashSet;
use thiserror::Error;

use crate::constraints::{simulate_timeline, ConstraintEngine};
use crate::models::{sort_violations, Analyst, Assignment, AssignmentSource, Violation};
use crate::{log_changes, log_checks};

#[derive(Error, Debug, PartialEq)]
pub enum SwapError {
    #[error("Cannot swap {0} with themselves")]
    SameAnalyst(String),
    #[error("Unknown analyst: {0}")]
    UnknownAnalyst(String),
    #[error("Swap span ends ({end}) before it starts ({start})")]
    InvertedSpan { start: NaiveDate, end: NaiveDate },
    #[error("{analyst_id} works no day between {start} and {end}")]
    NothingToGive {
        analyst_id: String,
        start: NaiveDate,
        end: NaiveDate,
    },
}

/// A single day or an inclusive range of days.
#[pyclass]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DateSpan {
    #[pyo3(get, set)]
    pub start: NaiveDate,
    #[pyo3(get, set)]
    pub end: NaiveDate,
}

impl DateSpan {
    pub fn day(date: NaiveDate) -> Self {
        Self {
            start: date,
            end: date,
        }
    }

    pub fn range(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }
}

#[pymethods]
impl DateSpan {
    #[new]
    #[pyo3(signature = (start, end=None))]
    fn new(start: NaiveDate, end: Option<NaiveDate>) -> Self {
        Self {
            start,
            end: end.unwrap_or(start),
        }
    }

    fn __repr__(&self) -> String {
        format!("DateSpan({}..={})", self.start, self.end)
    }
}

/// Analyst A hands over every day worked in `given_by_a`; B optionally hands
/// back every day worked in `given_by_b`.
#[pyclass]
#[derive(Clone, Debug)]
pub struct SwapRequest {
    #[pyo3(get, set)]
    pub analyst_a: String,
    #[pyo3(get, set)]
    pub given_by_a: DateSpan,
    #[pyo3(get, set)]
    pub analyst_b: String,
    #[pyo3(get, set)]
    pub given_by_b: Option<DateSpan>,
    /// Approve even when violations are found (they are still reported)
    #[pyo3(get, set)]
    pub force: bool,
}

#[pymethods]
impl SwapRequest {
    #[new]
    #[pyo3(signature = (analyst_a, given_by_a, analyst_b, given_by_b=None, force=false))]
    fn new(
        analyst_a: String,
        given_by_a: DateSpan,
        analyst_b: String,
        given_by_b: Option<DateSpan>,
        force: bool,
    ) -> Self {
        Self {
            analyst_a,
            given_by_a,
            analyst_b,
            given_by_b,
            force,
        }
    }

    fn __repr__(&self) -> String {
        format!(
            "SwapRequest({} gives {:?}, {} gives {:?}, force={})",
            self.analyst_a, self.given_by_a, self.analyst_b, self.given_by_b, self.force
        )
    }
}

#[pyclass]
#[derive(Clone, Debug, PartialEq)]
pub struct SwapOutcome {
    #[pyo3(get)]
    pub approved: bool,
    /// Approved only because the request was forced
    #[pyo3(get)]
    pub forced: bool,
    #[pyo3(get)]
    pub violations: Vec<Violation>,
    /// Post-swap work days of analyst A
    #[pyo3(get)]
    pub a_timeline: Vec<NaiveDate>,
    /// Post-swap work days of analyst B
    #[pyo3(get)]
    pub b_timeline: Vec<NaiveDate>,
}

#[pymethods]
impl SwapOutcome {
    fn __repr__(&self) -> String {
        format!(
            "SwapOutcome(approved={}, forced={}, violations={})",
            self.approved,
            self.forced,
            self.violations.len()
        )
    }
}

/// One side of a swap after the hand-over is resolved.
struct Side<'a> {
    analyst: &'a Analyst,
    current: Vec<&'a Assignment>,
    given: Vec<&'a Assignment>,
}

impl Side<'_> {
    fn worked_dates(&self) -> Vec<NaiveDate> {
        self.current.iter().map(|a| a.date).collect()
    }

    fn given_dates(&self) -> Vec<NaiveDate> {
        self.given.iter().map(|a| a.date).collect()
    }
}

pub struct SwapSimulator<'a> {
    constraints: &'a ConstraintEngine,
    analysts: &'a [Analyst],
    verbosity: u8,
}

impl<'a> SwapSimulator<'a> {
    pub fn new(constraints: &'a ConstraintEngine, analysts: &'a [Analyst], verbosity: u8) -> Self {
        Self {
            constraints,
            analysts,
            verbosity,
        }
    }

    pub fn validate(
        &self,
        request: &SwapRequest,
        schedule: &'a [Assignment],
    ) -> Result<SwapOutcome, SwapError> {
        if request.analyst_a == request.analyst_b {
            return Err(SwapError::SameAnalyst(request.analyst_a.clone()));
        }
        for id in [&request.analyst_a, &request.analyst_b] {
            if !self.analysts.iter().any(|a| &a.id == id) {
                return Err(SwapError::UnknownAnalyst(id.clone()));
            }
        }
        let a = self.side(&request.analyst_a, Some(&request.given_by_a), schedule)?;
        let b = self.side(&request.analyst_b, request.given_by_b.as_ref(), schedule)?;

        let a_timeline = simulate_timeline(&a.worked_dates(), &a.given_dates(), &b.given_dates());
        let b_timeline = simulate_timeline(&b.worked_dates(), &b.given_dates(), &a.given_dates());

        let mut violations = self.check_receiver(&a, &b, &a_timeline);
        violations.extend(self.check_receiver(&b, &a, &b_timeline));
        sort_violations(&mut violations);

        let approved = violations.is_empty() || request.force;
        let forced = request.force && !violations.is_empty();
        if forced {
            log_changes!(
                self.verbosity,
                "Swap {} <-> {} forced through {} violations",
                request.analyst_a,
                request.analyst_b,
                violations.len()
            );
        }

        Ok(SwapOutcome {
            approved,
            forced,
            violations,
            a_timeline,
            b_timeline,
        })
    }

    fn side(
        &self,
        analyst_id: &str,
        span: Option<&DateSpan>,
        schedule: &'a [Assignment],
    ) -> Result<Side<'a>, SwapError> {
        let analyst = self
            .analysts
            .iter()
            .find(|a| a.id == analyst_id)
            .ok_or_else(|| SwapError::UnknownAnalyst(analyst_id.to_string()))?;

        let current: Vec<&Assignment> = schedule
            .iter()
            .filter(|a| a.analyst_id == analyst_id)
            .collect();

        let given: Vec<&Assignment> = match span {
            Some(span) => {
                if span.end < span.start {
                    return Err(SwapError::InvertedSpan {
                        start: span.start,
                        end: span.end,
                    });
                }
                let given: Vec<&Assignment> = current
                    .iter()
                    .copied()
                    .filter(|a| span.contains(a.date))
                    .collect();
                if given.is_empty() {
                    return Err(SwapError::NothingToGive {
                        analyst_id: analyst_id.to_string(),
                        start: span.start,
                        end: span.end,
                    });
                }
                given
            }
            None => Vec::new(),
        };

        Ok(Side {
            analyst,
            current,
            given,
        })
    }

    /// Violations on `receiver`'s post-swap timeline.
    fn check_receiver(
        &self,
        receiver: &Side<'_>,
        giver: &Side<'_>,
        timeline: &[NaiveDate],
    ) -> Vec<Violation> {
        let id = receiver.analyst.id.as_str();
        let mut violations = self.constraints.check_streaks(id, timeline);

        for shift in &giver.given {
            violations.extend(self.constraints.check_availability(id, shift.date));
        }
        if let Some(first) = giver.given.first() {
            violations.extend(self.constraints.check_eligibility(
                receiver.analyst,
                &giver.analyst.group_key(),
                first.date,
            ));
        }

        // Kept shifts plus received shifts must not collide
        let handed_over: FxHashSet<NaiveDate> = receiver.given_dates().into_iter().collect();
        let received: Vec<Assignment> = giver
            .given
            .iter()
            .map(|shift| Assignment {
                analyst_id: id.to_string(),
                source: AssignmentSource::Swap,
                ..(*shift).clone()
            })
            .collect();
        let after: Vec<&Assignment> = receiver
            .current
            .iter()
            .copied()
            .filter(|a| !handed_over.contains(&a.date))
            .chain(received.iter())
            .collect();
        violations.extend(self.constraints.check_double_booking(&after));

        log_checks!(
            self.verbosity,
            "  Swap check {}: {} days after swap, {} violations",
            id,
            timeline.len(),
            violations.len()
        );
        violations
    }
}
