//! Screener duty layering on top of regular-shift proposals.

use chrono::{Datelike, NaiveDate, Weekday};
use rustc_hash::FxHashMap;
use std::collections::BTreeSet;

use crate::calendar::{days_inclusive, shift_days, week_start};
use crate::config::{EngineConfig, ScreenerWeights};
use crate::constraints::ConstraintEngine;
use crate::models::{Analyst, Assignment, Severity, Violation, ViolationKind};
use crate::ranking::{rank, RankKey};
use crate::rotation::{PatternTable, RotationPlan};
use crate::{log_changes, log_checks};

/// Where an analyst stands relative to their weekend-bearing pattern.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WeekendLeg {
    None,
    /// Weekend pattern starts next week
    Standby,
    /// Working a weekend pattern this week
    Active,
}

/// Source of weekend-leg information for candidates.
pub trait WeekendLegs {
    fn leg(&self, analyst_id: &str, date: NaiveDate) -> WeekendLeg;
}

/// Weekend legs derived from a rotation plan's slot offsets.
pub struct RotationLegs<'a> {
    pub plan: &'a RotationPlan,
    pub table: &'a PatternTable,
}

impl WeekendLegs for RotationLegs<'_> {
    fn leg(&self, analyst_id: &str, date: NaiveDate) -> WeekendLeg {
        let has_weekend = |day: NaiveDate| {
            self.plan
                .pattern_position(self.table, analyst_id, day)
                .is_some_and(|position| self.table.pattern(position).has_weekend)
        };
        if has_weekend(date) {
            WeekendLeg::Active
        } else if has_weekend(shift_days(week_start(date), 7)) {
            WeekendLeg::Standby
        } else {
            WeekendLeg::None
        }
    }
}

/// Screener days per analyst, including picks made earlier in the same run.
#[derive(Clone, Debug, Default)]
pub struct ScreenerHistory {
    days: FxHashMap<String, BTreeSet<NaiveDate>>,
}

impl ScreenerHistory {
    pub fn from_assignments<'a>(assignments: impl IntoIterator<Item = &'a Assignment>) -> Self {
        let mut history = Self::default();
        for a in assignments.into_iter().filter(|a| a.is_screener) {
            history.record(&a.analyst_id, a.date);
        }
        history
    }

    pub fn record(&mut self, analyst_id: &str, date: NaiveDate) {
        self.days.entry(analyst_id.to_string()).or_default().insert(date);
    }

    pub fn screened_on(&self, analyst_id: &str, date: NaiveDate) -> bool {
        self.days
            .get(analyst_id)
            .is_some_and(|days| days.contains(&date))
    }

    /// Screener days in the `window_days` days before `date` (exclusive).
    pub fn recent_count(&self, analyst_id: &str, date: NaiveDate, window_days: u32) -> usize {
        if window_days == 0 {
            return 0;
        }
        let from = shift_days(date, -i64::from(window_days));
        let to = shift_days(date, -1);
        self.days
            .get(analyst_id)
            .map_or(0, |days| days.range(from..=to).count())
    }
}

/// Scores screener candidates with the configured penalty table.
pub struct ScreenerScorer<'a> {
    weights: &'a ScreenerWeights,
}

impl<'a> ScreenerScorer<'a> {
    pub fn new(weights: &'a ScreenerWeights) -> Self {
        Self { weights }
    }

    pub fn score(
        &self,
        analyst_id: &str,
        date: NaiveDate,
        history: &ScreenerHistory,
        legs: &dyn WeekendLegs,
    ) -> f64 {
        let w = self.weights;
        let recent = history.recent_count(analyst_id, date, w.recent_window_days) as f64;
        let mut score = w.baseline - w.recent_penalty * recent;
        if history.screened_on(analyst_id, shift_days(date, -1)) {
            score -= w.consecutive_penalty;
        }
        score -= match legs.leg(analyst_id, date) {
            WeekendLeg::Active => w.active_weekend_penalty,
            WeekendLeg::Standby => w.standby_weekend_penalty,
            WeekendLeg::None => 0.0,
        };
        score
    }
}

/// A working analyst considered for a screener slot.
#[derive(Clone, Copy, Debug)]
enum Candidate {
    /// Index into the proposals
    Proposed(usize),
    /// Index into the existing schedule
    Existing(usize),
}

impl Candidate {
    fn assignment<'s>(
        &self,
        proposals: &'s [Assignment],
        existing: &'s [Assignment],
    ) -> &'s Assignment {
        match *self {
            Candidate::Proposed(i) => &proposals[i],
            Candidate::Existing(i) => &existing[i],
        }
    }
}

/// Result of one screener pass.
#[derive(Clone, Debug, Default)]
pub struct ScreenerOutcome {
    /// One InsufficientStaff violation per slot that could not be filled
    pub unfilled: Vec<Violation>,
    /// Existing assignments picked as screeners, flagged for update
    pub promoted: Vec<Assignment>,
}

/// Fills daily screener slots from the analysts already working each day.
pub struct ScreenerPlanner<'a> {
    scorer: ScreenerScorer<'a>,
    constraints: &'a ConstraintEngine,
    days: &'a [Weekday],
    per_day: usize,
    skill: Option<&'a str>,
    verbosity: u8,
}

impl<'a> ScreenerPlanner<'a> {
    pub fn new(
        config: &'a EngineConfig,
        constraints: &'a ConstraintEngine,
        days: &'a [Weekday],
    ) -> Self {
        Self {
            scorer: ScreenerScorer::new(&config.screener_weights),
            constraints,
            days,
            per_day: config.screeners_per_day as usize,
            skill: config.screener_skill.as_deref(),
            verbosity: config.verbosity,
        }
    }

    /// Flag screeners for every qualifying day in `[start, end]`.
    ///
    /// Candidates are the analysts working that day, proposed or existing.
    /// Existing screener assignments count toward each day's quota and feed the
    /// history. A pick on a proposal sets its flag in place; a pick on an
    /// unflagged existing row comes back in `promoted` as a flagged copy.
    pub fn assign(
        &self,
        proposals: &mut [Assignment],
        existing: &[Assignment],
        analysts: &[Analyst],
        legs: &dyn WeekendLegs,
        start: NaiveDate,
        end: NaiveDate,
    ) -> ScreenerOutcome {
        let mut history =
            ScreenerHistory::from_assignments(existing.iter().chain(proposals.iter()));
        let by_id: FxHashMap<&str, &Analyst> =
            analysts.iter().map(|a| (a.id.as_str(), a)).collect();

        let mut by_date: FxHashMap<NaiveDate, Vec<Candidate>> = FxHashMap::default();
        for (i, p) in proposals.iter().enumerate() {
            by_date.entry(p.date).or_default().push(Candidate::Proposed(i));
        }
        for (i, e) in existing.iter().enumerate() {
            if e.date < start || e.date > end || e.is_screener {
                continue;
            }
            let day = by_date.entry(e.date).or_default();
            let proposed = day
                .iter()
                .any(|c| c.assignment(proposals, existing).analyst_id == e.analyst_id);
            if !proposed {
                day.push(Candidate::Existing(i));
            }
        }

        let mut outcome = ScreenerOutcome::default();
        for date in days_inclusive(start, end) {
            if !self.days.contains(&date.weekday()) {
                continue;
            }

            let mut screeners_today: BTreeSet<String> = existing
                .iter()
                .chain(proposals.iter())
                .filter(|a| a.date == date && a.is_screener)
                .map(|a| a.analyst_id.clone())
                .collect();

            while screeners_today.len() < self.per_day {
                let candidates: Vec<Candidate> = by_date
                    .get(&date)
                    .map(|day| {
                        day.iter()
                            .copied()
                            .filter(|c| {
                                let id = c.assignment(proposals, existing).analyst_id.as_str();
                                !screeners_today.contains(id)
                                    && by_id.get(id).is_some_and(|a| self.is_eligible(a, date))
                            })
                            .collect()
                    })
                    .unwrap_or_default();

                let keys: Vec<RankKey> = candidates
                    .iter()
                    .map(|c| {
                        let id = c.assignment(proposals, existing).analyst_id.as_str();
                        let score = self.scorer.score(id, date, &history, legs);
                        log_checks!(
                            self.verbosity,
                            "    Screener candidate {} on {}: {:.1}",
                            id,
                            date,
                            score
                        );
                        RankKey::screener(id, score)
                    })
                    .collect();

                let Some(pick) = rank(keys).into_iter().next() else {
                    outcome.unfilled.push(Violation::new(
                        ViolationKind::InsufficientStaff,
                        Severity::High,
                        None,
                        Some(date),
                        format!(
                            "screener slot {} of {} on {} has no eligible candidate",
                            screeners_today.len() + 1,
                            self.per_day,
                            date
                        ),
                    ));
                    break;
                };

                let chosen = candidates
                    .iter()
                    .copied()
                    .find(|c| c.assignment(proposals, existing).analyst_id == pick);
                match chosen {
                    Some(Candidate::Proposed(i)) => proposals[i].is_screener = true,
                    Some(Candidate::Existing(i)) => outcome.promoted.push(Assignment {
                        is_screener: true,
                        ..existing[i].clone()
                    }),
                    None => {}
                }
                log_changes!(self.verbosity, "  Screener {}: {}", date, pick);
                history.record(&pick, date);
                screeners_today.insert(pick);
            }
        }
        outcome
    }

    fn is_eligible(&self, analyst: &Analyst, date: NaiveDate) -> bool {
        analyst.active
            && self.constraints.is_available(&analyst.id, date)
            && self.skill.map_or(true, |skill| analyst.has_skill(skill))
    }
}
