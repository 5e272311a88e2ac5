//! Hard-rule validation: blackout/vacation, eligibility, consecutive-day streaks,
//! double booking and daily staffing.
//!
//! Violations are data, not errors. Every check is a pure function of the
//! constraint snapshot and the timeline it is given, so swap simulation and
//! generation share the same rules.

use chrono::NaiveDate;
use rustc_hash::{FxHashMap, FxHashSet};

use crate::calendar::{days_inclusive, shift_days};
use crate::config::EngineConfig;
use crate::models::{
    Analyst, Assignment, Constraint, ConstraintKind, Severity, Violation, ViolationKind,
};

/// Sorted, non-overlapping blocked intervals of one constraint kind (inclusive dates).
#[derive(Clone, Debug, Default)]
struct BlockedPeriods {
    periods: Vec<(NaiveDate, NaiveDate)>,
}

impl BlockedPeriods {
    /// Merge overlapping or adjacent periods into a sorted, non-overlapping list.
    fn merged(mut periods: Vec<(NaiveDate, NaiveDate)>) -> Self {
        if periods.is_empty() {
            return Self::default();
        }

        periods.sort_by_key(|(start, _)| *start);
        let mut merged: Vec<(NaiveDate, NaiveDate)> = Vec::with_capacity(periods.len());
        for (start, end) in periods {
            match merged.last_mut() {
                // Merge if overlapping or adjacent (within 1 day)
                Some((_, last_end)) if start <= shift_days(*last_end, 1) => {
                    *last_end = (*last_end).max(end);
                }
                _ => merged.push((start, end)),
            }
        }
        Self { periods: merged }
    }

    /// Binary search for the period containing `date`.
    fn contains(&self, date: NaiveDate) -> bool {
        let idx = self.periods.partition_point(|(start, _)| *start <= date);
        idx > 0 && self.periods[idx - 1].1 >= date
    }
}

/// Blocked periods for one scope (an analyst, or the whole organization).
#[derive(Clone, Debug, Default)]
struct ScopeBlocks {
    by_kind: Vec<(ConstraintKind, BlockedPeriods)>,
}

impl ScopeBlocks {
    fn build(constraints: &[&Constraint]) -> Self {
        let mut grouped: Vec<(ConstraintKind, Vec<(NaiveDate, NaiveDate)>)> = Vec::new();
        for c in constraints.iter().filter(|c| c.active && c.start_date <= c.end_date) {
            match grouped.iter_mut().find(|(kind, _)| *kind == c.kind) {
                Some((_, periods)) => periods.push((c.start_date, c.end_date)),
                None => grouped.push((c.kind, vec![(c.start_date, c.end_date)])),
            }
        }
        Self {
            by_kind: grouped
                .into_iter()
                .map(|(kind, periods)| (kind, BlockedPeriods::merged(periods)))
                .collect(),
        }
    }

    /// Most severe constraint kind covering `date`.
    fn blocking(&self, date: NaiveDate) -> Option<ConstraintKind> {
        self.by_kind
            .iter()
            .filter(|(_, periods)| periods.contains(date))
            .map(|(kind, _)| *kind)
            .max_by_key(|kind| blocking_severity(*kind))
    }
}

fn blocking_severity(kind: ConstraintKind) -> Severity {
    match kind {
        ConstraintKind::Vacation => Severity::High,
        ConstraintKind::Blackout | ConstraintKind::GlobalBlackout => Severity::Critical,
    }
}

fn blocking_label(kind: ConstraintKind) -> &'static str {
    match kind {
        ConstraintKind::Vacation => "vacation",
        ConstraintKind::Blackout => "personal blackout",
        ConstraintKind::GlobalBlackout => "organization blackout",
    }
}

/// A maximal run of consecutive worked dates.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Streak {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub length: u32,
}

/// Split worked dates into maximal runs of consecutive calendar days.
///
/// Input may be unsorted and contain duplicates. A gap of exactly one day
/// continues a run; any larger gap starts a new one.
pub fn streaks(dates: &[NaiveDate]) -> Vec<Streak> {
    let mut sorted: Vec<NaiveDate> = dates.to_vec();
    sorted.sort();
    sorted.dedup();

    let mut runs: Vec<Streak> = Vec::new();
    for date in sorted {
        match runs.last_mut() {
            Some(run) if (date - run.end).num_days() == 1 => {
                run.end = date;
                run.length += 1;
            }
            _ => runs.push(Streak {
                start: date,
                end: date,
                length: 1,
            }),
        }
    }
    runs
}

/// Post-change work-day list: `current - removed + added`, sorted and de-duplicated.
pub fn simulate_timeline(
    current: &[NaiveDate],
    removed: &[NaiveDate],
    added: &[NaiveDate],
) -> Vec<NaiveDate> {
    let removed: FxHashSet<NaiveDate> = removed.iter().copied().collect();
    let mut timeline: Vec<NaiveDate> = current
        .iter()
        .copied()
        .filter(|d| !removed.contains(d))
        .chain(added.iter().copied())
        .collect();
    timeline.sort();
    timeline.dedup();
    timeline
}

/// Evaluates hard rules against a constraint snapshot.
#[derive(Clone, Debug)]
pub struct ConstraintEngine {
    max_consecutive_days: u32,
    min_staff_per_day: u32,
    global: ScopeBlocks,
    per_analyst: FxHashMap<String, ScopeBlocks>,
}

impl ConstraintEngine {
    pub fn new(constraints: &[Constraint], config: &EngineConfig) -> Self {
        let mut global: Vec<&Constraint> = Vec::new();
        let mut scoped: FxHashMap<&str, Vec<&Constraint>> = FxHashMap::default();
        for constraint in constraints {
            match (&constraint.analyst_id, constraint.is_global()) {
                (Some(analyst_id), false) => {
                    scoped.entry(analyst_id.as_str()).or_default().push(constraint)
                }
                _ => global.push(constraint),
            }
        }

        Self {
            max_consecutive_days: config.max_consecutive_days,
            min_staff_per_day: config.min_staff_per_day,
            global: ScopeBlocks::build(&global),
            per_analyst: scoped
                .into_iter()
                .map(|(id, list)| (id.to_string(), ScopeBlocks::build(&list)))
                .collect(),
        }
    }

    /// Most severe active constraint preventing `analyst_id` from working `date`.
    pub fn blocking_constraint(&self, analyst_id: &str, date: NaiveDate) -> Option<ConstraintKind> {
        let personal = self
            .per_analyst
            .get(analyst_id)
            .and_then(|blocks| blocks.blocking(date));
        let global = self.global.blocking(date);
        match (personal, global) {
            (Some(p), Some(g)) => Some(if blocking_severity(g) >= blocking_severity(p) {
                g
            } else {
                p
            }),
            (p, g) => p.or(g),
        }
    }

    pub fn is_available(&self, analyst_id: &str, date: NaiveDate) -> bool {
        self.blocking_constraint(analyst_id, date).is_none()
    }

    /// BLACKOUT_DATE violation if the analyst may not work `date`.
    pub fn check_availability(&self, analyst_id: &str, date: NaiveDate) -> Option<Violation> {
        self.blocking_constraint(analyst_id, date).map(|kind| {
            Violation::new(
                ViolationKind::BlackoutDate,
                blocking_severity(kind),
                Some(analyst_id),
                Some(date),
                format!("{} is blocked on {} ({})", analyst_id, date, blocking_label(kind)),
            )
        })
    }

    /// Region/shift eligibility of an analyst for a slot of `shift_group`.
    pub fn check_eligibility(
        &self,
        analyst: &Analyst,
        shift_group: &str,
        date: NaiveDate,
    ) -> Option<Violation> {
        let problem = if !analyst.active {
            Some(format!("{} is inactive", analyst.id))
        } else if analyst.group_key() != shift_group {
            Some(format!(
                "{} belongs to {} and cannot cover {}",
                analyst.id,
                analyst.group_key(),
                shift_group
            ))
        } else {
            None
        };
        problem.map(|message| {
            Violation::new(
                ViolationKind::ConstraintViolation,
                Severity::High,
                Some(&analyst.id),
                Some(date),
                message,
            )
        })
    }

    /// Blackout plus eligibility for a single candidate assignment.
    pub fn validate_assignment(
        &self,
        candidate: &Assignment,
        analyst: &Analyst,
        shift_group: &str,
    ) -> Vec<Violation> {
        let mut violations: Vec<Violation> = Vec::new();
        violations.extend(self.check_availability(&candidate.analyst_id, candidate.date));
        violations.extend(self.check_eligibility(analyst, shift_group, candidate.date));
        violations
    }

    /// Streak violations for one analyst's (post-change) timeline.
    pub fn check_streaks(&self, analyst_id: &str, dates: &[NaiveDate]) -> Vec<Violation> {
        streaks(dates)
            .into_iter()
            .filter(|run| run.length > self.max_consecutive_days)
            .map(|run| self.streak_violation(analyst_id, run))
            .collect()
    }

    /// Streak violations limited to runs that touch `[start, end]`.
    pub fn check_streaks_in_range(
        &self,
        analyst_id: &str,
        dates: &[NaiveDate],
        start: NaiveDate,
        end: NaiveDate,
    ) -> Vec<Violation> {
        streaks(dates)
            .into_iter()
            .filter(|run| run.length > self.max_consecutive_days)
            .filter(|run| run.end >= start && run.start <= end)
            .map(|run| self.streak_violation(analyst_id, run))
            .collect()
    }

    fn streak_violation(&self, analyst_id: &str, run: Streak) -> Violation {
        Violation::new(
            ViolationKind::ConstraintViolation,
            Severity::High,
            Some(analyst_id),
            Some(run.start),
            format!(
                "{} consecutive work days from {} to {} exceeds maximum of {}",
                run.length, run.start, run.end, self.max_consecutive_days
            ),
        )
    }

    /// Streak and blackout checks over one analyst's timeline.
    ///
    /// `dates` may reach outside `[start, end]` so streaks are measured across
    /// the boundary; only runs touching the range and dates inside it report.
    pub fn validate_timeline(
        &self,
        analyst_id: &str,
        dates: &[NaiveDate],
        start: NaiveDate,
        end: NaiveDate,
    ) -> Vec<Violation> {
        let mut violations = self.check_streaks_in_range(analyst_id, dates, start, end);
        let mut in_range: Vec<NaiveDate> = dates
            .iter()
            .copied()
            .filter(|date| *date >= start && *date <= end)
            .collect();
        in_range.sort();
        in_range.dedup();
        violations.extend(
            in_range
                .into_iter()
                .filter_map(|date| self.check_availability(analyst_id, date)),
        );
        violations
    }

    /// More than one entry for the same analyst and date.
    pub fn check_double_booking(&self, assignments: &[&Assignment]) -> Vec<Violation> {
        let mut seen: FxHashMap<(&str, NaiveDate), u32> = FxHashMap::default();
        for a in assignments {
            *seen.entry((a.analyst_id.as_str(), a.date)).or_insert(0) += 1;
        }
        let mut duplicates: Vec<((&str, NaiveDate), u32)> =
            seen.into_iter().filter(|(_, count)| *count > 1).collect();
        duplicates.sort();
        duplicates
            .into_iter()
            .map(|((analyst_id, date), count)| {
                Violation::new(
                    ViolationKind::ConstraintViolation,
                    Severity::Critical,
                    Some(analyst_id),
                    Some(date),
                    format!("{} has {} assignments on {}", analyst_id, count, date),
                )
            })
            .collect()
    }

    /// Dates in `[start, end]` staffed below the configured minimum.
    pub fn check_staffing(
        &self,
        assignments: &[&Assignment],
        start: NaiveDate,
        end: NaiveDate,
    ) -> Vec<Violation> {
        let mut staffed: FxHashMap<NaiveDate, FxHashSet<&str>> = FxHashMap::default();
        for a in assignments {
            staffed.entry(a.date).or_default().insert(a.analyst_id.as_str());
        }
        days_inclusive(start, end)
            .filter_map(|date| {
                let count = staffed.get(&date).map_or(0, |s| s.len()) as u32;
                (count < self.min_staff_per_day).then(|| {
                    Violation::new(
                        ViolationKind::InsufficientStaff,
                        Severity::Medium,
                        None,
                        Some(date),
                        format!(
                            "{} analysts scheduled on {}, minimum is {}",
                            count, date, self.min_staff_per_day
                        ),
                    )
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AssignmentSource;

    fn d(year: i32, month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, day).unwrap()
    }

    fn engine(constraints: &[Constraint], max_consecutive_days: u32) -> ConstraintEngine {
        let config = EngineConfig {
            max_consecutive_days,
            ..EngineConfig::default()
        };
        ConstraintEngine::new(constraints, &config)
    }

    fn span(start: NaiveDate, end: NaiveDate) -> Vec<NaiveDate> {
        days_inclusive(start, end).collect()
    }

    #[test]
    fn test_streaks_split_on_gaps() {
        let mut dates = span(d(2026, 1, 27), d(2026, 1, 31));
        dates.push(d(2026, 2, 2));
        dates.push(d(2026, 1, 29)); // duplicate
        let runs = streaks(&dates);
        assert_eq!(runs.len(), 2);
        assert_eq!(runs[0].length, 5);
        assert_eq!(runs[1].start, d(2026, 2, 2));
        assert_eq!(runs[1].length, 1);
    }

    #[test]
    fn test_streak_over_limit_is_high_severity() {
        let engine = engine(&[], 5);
        let dates = span(d(2026, 1, 26), d(2026, 1, 31));
        let violations = engine.check_streaks("a1", &dates);
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].kind, ViolationKind::ConstraintViolation);
        assert_eq!(violations[0].severity, Severity::High);
        assert_eq!(violations[0].date, Some(d(2026, 1, 26)));

        // Exactly at the limit is fine
        assert!(engine.check_streaks("a1", &dates[1..]).is_empty());
    }

    #[test]
    fn test_removal_splits_streak_below_limit() {
        let engine = engine(&[], 5);
        let before = span(d(2026, 1, 26), d(2026, 2, 1)); // 7 days
        assert_eq!(engine.check_streaks("a1", &before).len(), 1);

        let after = simulate_timeline(&before, &[d(2026, 1, 29)], &[]);
        assert_eq!(after.len(), 6);
        assert!(engine.check_streaks("a1", &after).is_empty());
    }

    #[test]
    fn test_streaks_in_range_ignore_history() {
        let engine = engine(&[], 5);
        let dates = span(d(2026, 1, 1), d(2026, 1, 10));
        assert!(engine
            .check_streaks_in_range("a1", &dates, d(2026, 1, 20), d(2026, 1, 31))
            .is_empty());
        assert_eq!(
            engine
                .check_streaks_in_range("a1", &dates, d(2026, 1, 10), d(2026, 1, 31))
                .len(),
            1
        );
    }

    #[test]
    fn test_validate_assignment_blackout_and_eligibility() {
        let training = Constraint {
            kind: ConstraintKind::Blackout,
            analyst_id: Some("a1".to_string()),
            start_date: d(2026, 2, 7),
            end_date: d(2026, 2, 7),
            active: true,
            reason: "training".to_string(),
        };
        let engine = engine(&[training], 5);
        let analyst = Analyst {
            id: "a1".to_string(),
            name: "Ana".to_string(),
            region: "AMR".to_string(),
            shift: "AM".to_string(),
            active: true,
            skills: vec![],
        };

        let fine = Assignment::rotation("a1", d(2026, 2, 6), "AM");
        assert!(engine.validate_assignment(&fine, &analyst, "AMR-AM").is_empty());

        let saturday = Assignment::rotation("a1", d(2026, 2, 7), "AM");
        let violations = engine.validate_assignment(&saturday, &analyst, "EMEA-PM");
        let kinds: Vec<ViolationKind> = violations.iter().map(|v| v.kind).collect();
        assert_eq!(
            kinds,
            vec![ViolationKind::BlackoutDate, ViolationKind::ConstraintViolation]
        );
        assert_eq!(violations[0].severity, Severity::Critical);
    }

    #[test]
    fn test_validate_timeline_limited_to_range() {
        let engine = engine(
            &[
                Constraint::vacation("a1", d(2026, 1, 3), d(2026, 1, 3)),
                Constraint::vacation("a1", d(2026, 1, 10), d(2026, 1, 10)),
            ],
            5,
        );
        // Jan 1..10: one 10-day run crossing into the range
        let dates = span(d(2026, 1, 1), d(2026, 1, 10));
        let violations = engine.validate_timeline("a1", &dates, d(2026, 1, 4), d(2026, 1, 10));

        let reported: Vec<(ViolationKind, Option<NaiveDate>)> =
            violations.iter().map(|v| (v.kind, v.date)).collect();
        // Streak reported from its start; the Jan 3 vacation day is history
        assert_eq!(
            reported,
            vec![
                (ViolationKind::ConstraintViolation, Some(d(2026, 1, 1))),
                (ViolationKind::BlackoutDate, Some(d(2026, 1, 10))),
            ]
        );
        assert!(engine
            .validate_timeline("a1", &dates[..3], d(2026, 1, 4), d(2026, 1, 10))
            .is_empty());
    }

    #[test]
    fn test_vacation_and_global_blackout() {
        let constraints = vec![
            Constraint::vacation("a1", d(2026, 2, 2), d(2026, 2, 4)),
            Constraint::vacation("a1", d(2026, 2, 5), d(2026, 2, 6)),
            Constraint::global_blackout(d(2026, 2, 6), d(2026, 2, 6), "system freeze"),
        ];
        let engine = engine(&constraints, 5);

        assert_eq!(
            engine.blocking_constraint("a1", d(2026, 2, 5)),
            Some(ConstraintKind::Vacation)
        );
        // Global blackout outranks vacation
        assert_eq!(
            engine.blocking_constraint("a1", d(2026, 2, 6)),
            Some(ConstraintKind::GlobalBlackout)
        );
        assert_eq!(
            engine.blocking_constraint("a2", d(2026, 2, 6)),
            Some(ConstraintKind::GlobalBlackout)
        );
        assert!(engine.is_available("a2", d(2026, 2, 3)));
        assert!(engine.is_available("a1", d(2026, 2, 7)));

        let violation = engine.check_availability("a1", d(2026, 2, 3)).unwrap();
        assert_eq!(violation.kind, ViolationKind::BlackoutDate);
        assert_eq!(violation.severity, Severity::High);
    }

    #[test]
    fn test_inactive_constraints_ignored() {
        let mut vacation = Constraint::vacation("a1", d(2026, 2, 2), d(2026, 2, 4));
        vacation.active = false;
        let engine = engine(&[vacation], 5);
        assert!(engine.is_available("a1", d(2026, 2, 3)));
    }

    #[test]
    fn test_eligibility() {
        let engine = engine(&[], 5);
        let mut analyst = Analyst {
            id: "a1".to_string(),
            name: "a1".to_string(),
            region: "EMEA".to_string(),
            shift: "PM".to_string(),
            active: true,
            skills: vec![],
        };
        assert!(engine
            .check_eligibility(&analyst, "EMEA-PM", d(2026, 2, 2))
            .is_none());
        assert!(engine
            .check_eligibility(&analyst, "AMR-AM", d(2026, 2, 2))
            .is_some());
        analyst.active = false;
        assert!(engine
            .check_eligibility(&analyst, "EMEA-PM", d(2026, 2, 2))
            .is_some());
    }

    #[test]
    fn test_double_booking_and_staffing() {
        let engine = engine(&[], 5);
        let a = Assignment::rotation("a1", d(2026, 2, 2), "AM");
        let b = Assignment {
            source: AssignmentSource::Manual,
            ..Assignment::rotation("a1", d(2026, 2, 2), "PM")
        };
        let c = Assignment::rotation("a2", d(2026, 2, 3), "AM");
        let all = vec![&a, &b, &c];

        let doubles = engine.check_double_booking(&all);
        assert_eq!(doubles.len(), 1);
        assert_eq!(doubles[0].severity, Severity::Critical);

        let staffing = engine.check_staffing(&all, d(2026, 2, 2), d(2026, 2, 4));
        assert_eq!(staffing.len(), 1);
        assert_eq!(staffing[0].date, Some(d(2026, 2, 4)));
        assert_eq!(staffing[0].kind, ViolationKind::InsufficientStaff);
    }
}
