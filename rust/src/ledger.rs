//! Compensatory time-off ledger.
//!
//! Append-only list of EARNED, AUTO_ASSIGNED and USED entries. Per analyst the
//! earned total never drops below what has been consumed; operations that
//! would break this fail without touching the ledger.

use chrono::NaiveDate;
use pyo3::exceptions::PyValueError;
use pyo3::prelude::*;
use rustc_hash::{FxHashMap, FxHashSet};
use thiserror::Error;

use crate::calendar::is_weekend;
use crate::models::{Assignment, CompOffTransaction, TransactionKind};

/// Tolerance for fractional day comparisons.
const EPSILON: f64 = 1e-9;

pub const WEEKEND_WORK_REASON: &str = "weekend work";

#[derive(Error, Debug, PartialEq)]
pub enum LedgerError {
    #[error("{analyst_id} requested {requested} comp-off days but only {available} available")]
    InsufficientBalance {
        analyst_id: String,
        requested: f64,
        available: f64,
    },
    #[error("Comp-off day count must be positive and finite, got {0}")]
    InvalidDays(f64),
    #[error("Day off {off_date} must fall after the work day it compensates ({earned_date})")]
    InvalidOffDate {
        earned_date: NaiveDate,
        off_date: NaiveDate,
    },
    #[error("Ledger history for {analyst_id} goes negative at transaction {id}")]
    NegativeHistory { analyst_id: String, id: u64 },
}

/// Balance summary for one analyst.
#[pyclass]
#[derive(Clone, Debug, PartialEq)]
pub struct CompOffBalance {
    #[pyo3(get)]
    pub analyst_id: String,
    #[pyo3(get)]
    pub earned: f64,
    #[pyo3(get)]
    pub auto_assigned: f64,
    #[pyo3(get)]
    pub used: f64,
    #[pyo3(get)]
    pub available: f64,
}

#[pymethods]
impl CompOffBalance {
    fn __repr__(&self) -> String {
        format!(
            "CompOffBalance(analyst_id={:?}, earned={}, auto_assigned={}, used={}, available={})",
            self.analyst_id, self.earned, self.auto_assigned, self.used, self.available
        )
    }
}

fn check_days(days: f64) -> Result<(), LedgerError> {
    if days.is_finite() && days > 0.0 {
        Ok(())
    } else {
        Err(LedgerError::InvalidDays(days))
    }
}

/// Unsaved EARNED entries (id 0) for every weekend day in `assignments`.
///
/// At most one entry per analyst and date.
pub fn weekend_earnings<'a>(
    assignments: impl IntoIterator<Item = &'a Assignment>,
) -> Vec<CompOffTransaction> {
    let mut seen: FxHashSet<(&str, NaiveDate)> = FxHashSet::default();
    let mut earned: Vec<CompOffTransaction> = Vec::new();
    for a in assignments {
        if !is_weekend(a.date) || !seen.insert((a.analyst_id.as_str(), a.date)) {
            continue;
        }
        earned.push(CompOffTransaction {
            id: 0,
            analyst_id: a.analyst_id.clone(),
            kind: TransactionKind::Earned,
            earned_date: a.date,
            consumed_date: None,
            days: 1.0,
            is_banked: true,
            is_auto: false,
            reason: WEEKEND_WORK_REASON.to_string(),
        });
    }
    earned.sort_by(|a, b| (&a.analyst_id, a.earned_date).cmp(&(&b.analyst_id, b.earned_date)));
    earned
}

#[pyclass]
#[derive(Clone, Debug)]
pub struct CompOffLedger {
    transactions: Vec<CompOffTransaction>,
    next_id: u64,
}

impl Default for CompOffLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl CompOffLedger {
    pub fn new() -> Self {
        Self {
            transactions: Vec::new(),
            next_id: 1,
        }
    }

    /// Rebuild a ledger from persisted entries, replaying them in id order.
    pub fn from_transactions(
        mut transactions: Vec<CompOffTransaction>,
    ) -> Result<Self, LedgerError> {
        transactions.sort_by_key(|t| t.id);

        let mut running: FxHashMap<&str, f64> = FxHashMap::default();
        for t in &transactions {
            check_days(t.days)?;
            let balance = running.entry(t.analyst_id.as_str()).or_insert(0.0);
            match t.kind {
                TransactionKind::Earned => *balance += t.days,
                TransactionKind::AutoAssigned | TransactionKind::Used => *balance -= t.days,
            }
            if *balance < -EPSILON {
                return Err(LedgerError::NegativeHistory {
                    analyst_id: t.analyst_id.clone(),
                    id: t.id,
                });
            }
        }

        let next_id = transactions.last().map_or(1, |t| t.id + 1);
        Ok(Self {
            transactions,
            next_id,
        })
    }

    pub fn transactions(&self) -> &[CompOffTransaction] {
        &self.transactions
    }

    pub fn transactions_for(&self, analyst_id: &str) -> Vec<&CompOffTransaction> {
        self.transactions
            .iter()
            .filter(|t| t.analyst_id == analyst_id)
            .collect()
    }

    pub fn balance(&self, analyst_id: &str) -> CompOffBalance {
        let mut balance = CompOffBalance {
            analyst_id: analyst_id.to_string(),
            earned: 0.0,
            auto_assigned: 0.0,
            used: 0.0,
            available: 0.0,
        };
        for t in self.transactions_for(analyst_id) {
            match t.kind {
                TransactionKind::Earned => balance.earned += t.days,
                TransactionKind::AutoAssigned => balance.auto_assigned += t.days,
                TransactionKind::Used => balance.used += t.days,
            }
        }
        balance.available = balance.earned - balance.auto_assigned - balance.used;
        balance
    }

    fn push(&mut self, mut transaction: CompOffTransaction) -> CompOffTransaction {
        transaction.id = self.next_id;
        self.next_id += 1;
        self.transactions.push(transaction.clone());
        transaction
    }

    /// Bank `days` of comp-off earned on `earned_date`.
    pub fn earn(
        &mut self,
        analyst_id: &str,
        earned_date: NaiveDate,
        reason: &str,
        days: f64,
    ) -> Result<CompOffTransaction, LedgerError> {
        check_days(days)?;
        Ok(self.push(CompOffTransaction {
            id: 0,
            analyst_id: analyst_id.to_string(),
            kind: TransactionKind::Earned,
            earned_date,
            consumed_date: None,
            days,
            is_banked: true,
            is_auto: false,
            reason: reason.to_string(),
        }))
    }

    /// Consume banked days on `off_date`. Never clamps to the balance.
    pub fn use_days(
        &mut self,
        analyst_id: &str,
        off_date: NaiveDate,
        days: f64,
        reason: &str,
    ) -> Result<CompOffTransaction, LedgerError> {
        check_days(days)?;
        let available = self.balance(analyst_id).available;
        if days > available + EPSILON {
            return Err(LedgerError::InsufficientBalance {
                analyst_id: analyst_id.to_string(),
                requested: days,
                available,
            });
        }
        Ok(self.push(CompOffTransaction {
            id: 0,
            analyst_id: analyst_id.to_string(),
            kind: TransactionKind::Used,
            earned_date: off_date,
            consumed_date: Some(off_date),
            days,
            is_banked: false,
            is_auto: false,
            reason: reason.to_string(),
        }))
    }

    /// Earn and immediately schedule the day off. Both entries are written or neither.
    pub fn auto_assign(
        &mut self,
        analyst_id: &str,
        earned_date: NaiveDate,
        off_date: NaiveDate,
        reason: &str,
        days: f64,
    ) -> Result<(CompOffTransaction, CompOffTransaction), LedgerError> {
        check_days(days)?;
        if off_date <= earned_date {
            return Err(LedgerError::InvalidOffDate {
                earned_date,
                off_date,
            });
        }

        let earned = self.push(CompOffTransaction {
            id: 0,
            analyst_id: analyst_id.to_string(),
            kind: TransactionKind::Earned,
            earned_date,
            consumed_date: None,
            days,
            is_banked: false,
            is_auto: true,
            reason: reason.to_string(),
        });
        let assigned = self.push(CompOffTransaction {
            id: 0,
            analyst_id: analyst_id.to_string(),
            kind: TransactionKind::AutoAssigned,
            earned_date,
            consumed_date: Some(off_date),
            days,
            is_banked: false,
            is_auto: true,
            reason: reason.to_string(),
        });
        Ok((earned, assigned))
    }

    /// Bank one day per weekend work day not already credited.
    ///
    /// Idempotent: calling it again with the same assignments adds nothing.
    pub fn record_weekend_work(&mut self, assignments: &[Assignment]) -> Vec<CompOffTransaction> {
        let credited: FxHashSet<(String, NaiveDate)> = self
            .transactions
            .iter()
            .filter(|t| t.kind == TransactionKind::Earned)
            .map(|t| (t.analyst_id.clone(), t.earned_date))
            .collect();

        weekend_earnings(assignments)
            .into_iter()
            .filter(|t| !credited.contains(&(t.analyst_id.clone(), t.earned_date)))
            .map(|t| self.push(t))
            .collect()
    }
}

#[pymethods]
impl CompOffLedger {
    #[new]
    #[pyo3(signature = (transactions=None))]
    fn py_new(transactions: Option<Vec<CompOffTransaction>>) -> PyResult<Self> {
        match transactions {
            Some(list) => {
                Self::from_transactions(list).map_err(|e| PyValueError::new_err(e.to_string()))
            }
            None => Ok(Self::new()),
        }
    }

    #[getter(transactions)]
    fn py_transactions(&self) -> Vec<CompOffTransaction> {
        self.transactions.clone()
    }

    #[pyo3(name = "balance")]
    fn py_balance(&self, analyst_id: &str) -> CompOffBalance {
        self.balance(analyst_id)
    }

    #[pyo3(name = "earn", signature = (analyst_id, earned_date, reason=WEEKEND_WORK_REASON, days=1.0))]
    fn py_earn(
        &mut self,
        analyst_id: &str,
        earned_date: NaiveDate,
        reason: &str,
        days: f64,
    ) -> PyResult<CompOffTransaction> {
        self.earn(analyst_id, earned_date, reason, days)
            .map_err(|e| PyValueError::new_err(e.to_string()))
    }

    #[pyo3(name = "use_days", signature = (analyst_id, off_date, days=1.0, reason="comp-off"))]
    fn py_use_days(
        &mut self,
        analyst_id: &str,
        off_date: NaiveDate,
        days: f64,
        reason: &str,
    ) -> PyResult<CompOffTransaction> {
        self.use_days(analyst_id, off_date, days, reason)
            .map_err(|e| PyValueError::new_err(e.to_string()))
    }

    #[pyo3(name = "auto_assign", signature = (analyst_id, earned_date, off_date, reason=WEEKEND_WORK_REASON, days=1.0))]
    fn py_auto_assign(
        &mut self,
        analyst_id: &str,
        earned_date: NaiveDate,
        off_date: NaiveDate,
        reason: &str,
        days: f64,
    ) -> PyResult<(CompOffTransaction, CompOffTransaction)> {
        self.auto_assign(analyst_id, earned_date, off_date, reason, days)
            .map_err(|e| PyValueError::new_err(e.to_string()))
    }

    #[pyo3(name = "record_weekend_work")]
    fn py_record_weekend_work(&mut self, assignments: Vec<Assignment>) -> Vec<CompOffTransaction> {
        self.record_weekend_work(&assignments)
    }

    fn __repr__(&self) -> String {
        format!(
            "CompOffLedger(transactions={}, next_id={})",
            self.transactions.len(),
            self.next_id
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(year: i32, month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, day).unwrap()
    }

    #[test]
    fn test_earn_and_use() {
        let mut ledger = CompOffLedger::new();
        ledger.earn("a1", d(2026, 1, 3), "weekend work", 1.0).unwrap();
        ledger.earn("a1", d(2026, 1, 4), "weekend work", 1.0).unwrap();
        let used = ledger.use_days("a1", d(2026, 1, 8), 1.5, "rest").unwrap();
        assert_eq!(used.id, 3);
        assert_eq!(used.consumed_date, Some(d(2026, 1, 8)));

        let balance = ledger.balance("a1");
        assert_eq!(balance.earned, 2.0);
        assert_eq!(balance.used, 1.5);
        assert_eq!(balance.available, 0.5);
    }

    #[test]
    fn test_overdraw_rejected_without_clamping() {
        let mut ledger = CompOffLedger::new();
        ledger.earn("a1", d(2026, 1, 3), "weekend work", 1.0).unwrap();
        let err = ledger.use_days("a1", d(2026, 1, 8), 2.0, "rest").unwrap_err();
        assert_eq!(
            err,
            LedgerError::InsufficientBalance {
                analyst_id: "a1".to_string(),
                requested: 2.0,
                available: 1.0,
            }
        );
        assert_eq!(ledger.transactions().len(), 1);
        assert_eq!(ledger.balance("a1").available, 1.0);
    }

    #[test]
    fn test_invalid_days() {
        let mut ledger = CompOffLedger::new();
        assert_eq!(
            ledger.earn("a1", d(2026, 1, 3), "x", 0.0).unwrap_err(),
            LedgerError::InvalidDays(0.0)
        );
        assert!(ledger.earn("a1", d(2026, 1, 3), "x", f64::NAN).is_err());
        assert!(ledger.transactions().is_empty());
    }

    #[test]
    fn test_auto_assign_is_atomic() {
        let mut ledger = CompOffLedger::new();
        let (earned, assigned) = ledger
            .auto_assign("a1", d(2026, 1, 3), d(2026, 1, 6), "weekend work", 1.0)
            .unwrap();
        assert_eq!(earned.kind, TransactionKind::Earned);
        assert_eq!(assigned.kind, TransactionKind::AutoAssigned);
        assert_eq!(ledger.balance("a1").available, 0.0);

        // Bad off date writes neither entry
        assert!(ledger
            .auto_assign("a1", d(2026, 1, 10), d(2026, 1, 9), "weekend work", 1.0)
            .is_err());
        assert_eq!(ledger.transactions().len(), 2);
    }

    #[test]
    fn test_record_weekend_work_idempotent() {
        let work = vec![
            Assignment::rotation("a1", d(2026, 1, 3), "AM"), // Saturday
            Assignment::rotation("a1", d(2026, 1, 4), "AM"), // Sunday
            Assignment::rotation("a1", d(2026, 1, 5), "AM"), // Monday
            Assignment::rotation("a2", d(2026, 1, 4), "AM"),
        ];
        let mut ledger = CompOffLedger::new();
        let first = ledger.record_weekend_work(&work);
        assert_eq!(first.len(), 3);
        let second = ledger.record_weekend_work(&work);
        assert!(second.is_empty());
        assert_eq!(ledger.balance("a1").earned, 2.0);
        assert_eq!(ledger.balance("a2").earned, 1.0);
    }

    #[test]
    fn test_from_transactions_rejects_negative_history() {
        let mut ledger = CompOffLedger::new();
        ledger.earn("a1", d(2026, 1, 3), "weekend work", 1.0).unwrap();
        ledger.use_days("a1", d(2026, 1, 6), 1.0, "rest").unwrap();

        let restored = CompOffLedger::from_transactions(ledger.transactions().to_vec()).unwrap();
        assert_eq!(restored.balance("a1").available, 0.0);

        let mut bad = ledger.transactions().to_vec();
        bad[0].id = 9; // use replays before earn
        let err = CompOffLedger::from_transactions(bad).unwrap_err();
        assert_eq!(
            err,
            LedgerError::NegativeHistory {
                analyst_id: "a1".to_string(),
                id: 2
            }
        );
    }
}
