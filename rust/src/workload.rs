//! Weekly workload summaries and overtime/holiday reporting.
//!
//! Read-only: the balancer reports problems and suggested fixes, it never
//! edits the schedule or the ledger.

use chrono::NaiveDate;
use pyo3::prelude::*;
use rustc_hash::FxHashSet;

use crate::calendar::{is_weekend, week_end, week_start};
use crate::models::{Assignment, CompOffTransaction, TransactionKind, WeeklyWorkload};

#[pyclass(eq, eq_int)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum WorkloadIssue {
    /// Net work days above the weekly maximum
    Overtime,
    /// Holiday worked with no comp-off credited for it
    HolidayWork,
}

#[pyclass]
#[derive(Clone, Debug, PartialEq)]
pub struct WorkloadViolation {
    #[pyo3(get)]
    pub kind: WorkloadIssue,
    #[pyo3(get)]
    pub analyst_id: String,
    #[pyo3(get)]
    pub week_start: NaiveDate,
    #[pyo3(get)]
    pub excess_days: f64,
    #[pyo3(get)]
    pub suggested_fix: String,
}

#[pymethods]
impl WorkloadViolation {
    fn __repr__(&self) -> String {
        format!(
            "WorkloadViolation(kind={:?}, analyst_id={:?}, week={}, excess={})",
            self.kind, self.analyst_id, self.week_start, self.excess_days
        )
    }
}

pub struct WorkloadBalancer {
    max_work_days_per_week: u32,
}

impl WorkloadBalancer {
    pub fn new(max_work_days_per_week: u32) -> Self {
        Self {
            max_work_days_per_week,
        }
    }

    /// Workload of one analyst for the week containing `week_of`.
    pub fn summarize(
        &self,
        analyst_id: &str,
        week_of: NaiveDate,
        assignments: &[Assignment],
        transactions: &[CompOffTransaction],
        holidays: &[NaiveDate],
    ) -> WeeklyWorkload {
        let start = week_start(week_of);
        let end = week_end(week_of);
        let in_week = |date: NaiveDate| date >= start && date <= end;

        let worked: FxHashSet<NaiveDate> = assignments
            .iter()
            .filter(|a| a.analyst_id == analyst_id && in_week(a.date))
            .map(|a| a.date)
            .collect();
        let scheduled_days = worked.len() as u32;
        let weekend_days = worked.iter().filter(|d| is_weekend(**d)).count() as u32;
        let holiday_days = worked.iter().filter(|d| holidays.contains(d)).count() as u32;

        let comp_off_days: f64 = transactions
            .iter()
            .filter(|t| t.analyst_id == analyst_id)
            .filter(|t| matches!(t.kind, TransactionKind::Used | TransactionKind::AutoAssigned))
            .filter(|t| t.consumed_date.is_some_and(in_week))
            .map(|t| t.days)
            .sum();

        let total_work_days = f64::from(scheduled_days) - comp_off_days;
        WeeklyWorkload {
            analyst_id: analyst_id.to_string(),
            week_start: start,
            scheduled_days,
            weekend_days,
            holiday_days,
            overtime_days: scheduled_days.saturating_sub(self.max_work_days_per_week),
            comp_off_days,
            total_work_days,
            is_balanced: total_work_days <= f64::from(self.max_work_days_per_week),
        }
    }

    /// Overtime and uncredited holiday work for each analyst in the week of `week_of`.
    pub fn balance_week(
        &self,
        analyst_ids: &[String],
        week_of: NaiveDate,
        assignments: &[Assignment],
        transactions: &[CompOffTransaction],
        holidays: &[NaiveDate],
    ) -> Vec<WorkloadViolation> {
        let mut ids: Vec<&String> = analyst_ids.iter().collect();
        ids.sort();
        ids.dedup();

        let mut violations: Vec<WorkloadViolation> = Vec::new();
        for analyst_id in ids {
            let summary = self.summarize(analyst_id, week_of, assignments, transactions, holidays);

            if !summary.is_balanced {
                let excess = summary.total_work_days - f64::from(self.max_work_days_per_week);
                violations.push(WorkloadViolation {
                    kind: WorkloadIssue::Overtime,
                    analyst_id: analyst_id.clone(),
                    week_start: summary.week_start,
                    excess_days: excess,
                    suggested_fix: format!(
                        "schedule {} comp-off day(s) for {} or move shifts out of the week of {}",
                        excess, analyst_id, summary.week_start
                    ),
                });
            }

            let uncredited = self.uncredited_holidays(
                analyst_id,
                &summary,
                assignments,
                transactions,
                holidays,
            );
            if uncredited > 0 {
                violations.push(WorkloadViolation {
                    kind: WorkloadIssue::HolidayWork,
                    analyst_id: analyst_id.clone(),
                    week_start: summary.week_start,
                    excess_days: f64::from(uncredited),
                    suggested_fix: format!(
                        "credit {} comp-off day(s) to {} for holiday work",
                        uncredited, analyst_id
                    ),
                });
            }
        }
        violations
    }

    fn uncredited_holidays(
        &self,
        analyst_id: &str,
        summary: &WeeklyWorkload,
        assignments: &[Assignment],
        transactions: &[CompOffTransaction],
        holidays: &[NaiveDate],
    ) -> u32 {
        if summary.holiday_days == 0 {
            return 0;
        }
        let end = week_end(summary.week_start);
        let credited: FxHashSet<NaiveDate> = transactions
            .iter()
            .filter(|t| t.analyst_id == analyst_id && t.kind == TransactionKind::Earned)
            .map(|t| t.earned_date)
            .collect();
        let worked_holidays: FxHashSet<NaiveDate> = assignments
            .iter()
            .filter(|a| a.analyst_id == analyst_id)
            .map(|a| a.date)
            .filter(|date| *date >= summary.week_start && *date <= end)
            .filter(|date| holidays.contains(date))
            .collect();
        worked_holidays.difference(&credited).count() as u32
    }
}
