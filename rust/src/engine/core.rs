//! Schedule generation: rotation, filtering, screeners, checks and scoring.

use chrono::{NaiveDate, Weekday};
use rustc_hash::{FxHashMap, FxHashSet};
use std::collections::HashMap;
use std::time::Instant;
use thiserror::Error;

use crate::calendar::{days_inclusive, parse_weekday, week_starts};
use crate::config::{EngineConfig, KNOWN_STRATEGIES};
use crate::constraints::ConstraintEngine;
use crate::fairness::{counts_from_assignments, FairnessEngine};
use crate::ledger::{weekend_earnings, LedgerError};
use crate::models::{
    sort_violations, Analyst, Assignment, GenerationResult, Overwrite, SchedulingContext, Severity,
    Violation, ViolationKind,
};
use crate::rotation::{
    PatternContinuity, PatternError, PatternTable, RotationEngine, RotationState,
};
use crate::screener::{RotationLegs, ScreenerPlanner};
use crate::store::StoreError;
use crate::swap::{SwapError, SwapOutcome, SwapRequest, SwapSimulator};
use crate::{log_changes, log_checks};

/// Fatal errors; constraint problems are reported as `Violation`s instead.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("No active analysts in shift group {0}")]
    EmptyRoster(String),
    #[error("Start date {start} is after end date {end}")]
    InvertedRange { start: NaiveDate, end: NaiveDate },
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("Unknown analyst: {0}")]
    UnknownAnalyst(String),
    #[error("Validation failed: {0}")]
    Validation(String),
    #[error(transparent)]
    Pattern(#[from] PatternError),
    #[error(transparent)]
    Ledger(#[from] LedgerError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<SwapError> for EngineError {
    fn from(err: SwapError) -> Self {
        match err {
            SwapError::UnknownAnalyst(id) => EngineError::UnknownAnalyst(id),
            other => EngineError::Validation(other.to_string()),
        }
    }
}

/// Validated engine configuration plus the tables derived from it.
pub struct ScheduleGenerator<'a> {
    config: &'a EngineConfig,
    table: PatternTable,
    screener_days: Vec<Weekday>,
}

impl<'a> ScheduleGenerator<'a> {
    pub fn new(config: &'a EngineConfig) -> Result<Self, EngineError> {
        if !KNOWN_STRATEGIES.contains(&config.strategy.as_str()) {
            return Err(EngineError::InvalidConfig(format!(
                "Unknown strategy: {}",
                config.strategy
            )));
        }
        if config.max_consecutive_days == 0 {
            return Err(EngineError::InvalidConfig(
                "max_consecutive_days must be at least 1".to_string(),
            ));
        }
        let weights = [
            ("fairness_weight", config.fairness_weight),
            ("efficiency_weight", config.efficiency_weight),
            ("constraint_weight", config.constraint_weight),
        ];
        for (name, value) in weights {
            if !value.is_finite() || value < 0.0 {
                return Err(EngineError::InvalidConfig(format!(
                    "{} must be a non-negative number, got {}",
                    name, value
                )));
            }
        }

        let mut screener_days: Vec<Weekday> = Vec::with_capacity(config.screener_days.len());
        for name in &config.screener_days {
            let day = parse_weekday(name).ok_or_else(|| {
                EngineError::InvalidConfig(format!("Unknown screener day: {}", name))
            })?;
            if !screener_days.contains(&day) {
                screener_days.push(day);
            }
        }

        Ok(Self {
            config,
            table: PatternTable::from_config(&config.rotation)?,
            screener_days,
        })
    }

    /// Produce a decision for `ctx` without side effects.
    pub fn generate(
        &self,
        ctx: &SchedulingContext,
        continuity: &[PatternContinuity],
        rotation_state: Option<&RotationState>,
    ) -> Result<GenerationResult, EngineError> {
        let started = Instant::now();
        let config = self.config;

        if ctx.start_date > ctx.end_date {
            return Err(EngineError::InvertedRange {
                start: ctx.start_date,
                end: ctx.end_date,
            });
        }
        let roster = ctx.rotating_analysts();
        if roster.is_empty() {
            return Err(EngineError::EmptyRoster(ctx.shift_group.clone()));
        }
        log_changes!(
            config.verbosity,
            "Generating {} to {} for {} ({} analysts)",
            ctx.start_date,
            ctx.end_date,
            ctx.shift_group,
            roster.len()
        );

        let constraints = ConstraintEngine::new(&ctx.constraints, config);
        let plan =
            RotationEngine::new(&self.table, config).propose(ctx, continuity, rotation_state);
        let raw_count = plan.assignments.len();

        // Phase 1: drop invalid proposals, resolve collisions with the existing schedule
        let roster_by_id: FxHashMap<&str, &Analyst> =
            roster.iter().map(|a| (a.id.as_str(), *a)).collect();
        let existing: FxHashMap<(&str, NaiveDate), &Assignment> = ctx
            .existing_assignments
            .iter()
            .map(|a| ((a.analyst_id.as_str(), a.date), a))
            .collect();

        let mut conflicts: Vec<Violation> = Vec::new();
        let mut overwrites: Vec<Overwrite> = Vec::new();
        let mut proposals: Vec<Assignment> = Vec::with_capacity(raw_count);
        let mut replaced: FxHashSet<(String, NaiveDate)> = FxHashSet::default();
        let mut dropped = 0usize;
        let mut already_scheduled = 0usize;

        for proposal in &plan.assignments {
            let Some(analyst) = roster_by_id.get(proposal.analyst_id.as_str()) else {
                continue;
            };
            let invalid = constraints.validate_assignment(proposal, analyst, &ctx.shift_group);
            if !invalid.is_empty() {
                for violation in &invalid {
                    log_changes!(config.verbosity, "  Dropped: {}", violation.message);
                }
                conflicts.extend(invalid);
                dropped += 1;
                continue;
            }
            match existing.get(&(proposal.analyst_id.as_str(), proposal.date)) {
                Some(current) if current.shift_type == proposal.shift_type => {
                    already_scheduled += 1;
                }
                Some(current) => {
                    overwrites.push(Overwrite {
                        analyst_id: proposal.analyst_id.clone(),
                        date: proposal.date,
                        existing: (*current).clone(),
                        proposed: proposal.clone(),
                    });
                    if config.allow_overwrite {
                        replaced.insert((proposal.analyst_id.clone(), proposal.date));
                        proposals.push(proposal.clone());
                    }
                }
                None => proposals.push(proposal.clone()),
            }
        }

        let mut kept_existing: Vec<Assignment> = ctx
            .existing_assignments
            .iter()
            .filter(|a| !replaced.contains(&(a.analyst_id.clone(), a.date)))
            .cloned()
            .collect();

        // Phase 2: screener duty, drawn from everyone in the group working the day
        let group_existing: Vec<Assignment> = kept_existing
            .iter()
            .filter(|a| roster_by_id.contains_key(a.analyst_id.as_str()))
            .cloned()
            .collect();
        let legs = RotationLegs {
            plan: &plan,
            table: &self.table,
        };
        let screening = ScreenerPlanner::new(config, &constraints, &self.screener_days).assign(
            &mut proposals,
            &group_existing,
            &ctx.analysts,
            &legs,
            ctx.start_date,
            ctx.end_date,
        );
        conflicts.extend(screening.unfilled);
        let promoted: FxHashSet<(String, NaiveDate)> = screening
            .promoted
            .iter()
            .map(|a| (a.analyst_id.clone(), a.date))
            .collect();
        kept_existing.retain(|a| !promoted.contains(&(a.analyst_id.clone(), a.date)));
        let comp_off_earned = if config.comp_off_on_weekend {
            weekend_earnings(proposals.iter())
        } else {
            Vec::new()
        };
        proposals.extend(screening.promoted);

        // Phase 3: checks on the resulting timelines
        let roster_ids: FxHashSet<&str> = roster.iter().map(|a| a.id.as_str()).collect();
        let combined: Vec<&Assignment> = kept_existing.iter().chain(proposals.iter()).collect();
        let group_schedule: Vec<&Assignment> = combined
            .iter()
            .copied()
            .filter(|a| roster_ids.contains(a.analyst_id.as_str()))
            .collect();

        for analyst in &roster {
            let dates: Vec<NaiveDate> = group_schedule
                .iter()
                .filter(|a| a.analyst_id == analyst.id)
                .map(|a| a.date)
                .collect();
            conflicts.extend(constraints.validate_timeline(
                &analyst.id,
                &dates,
                ctx.start_date,
                ctx.end_date,
            ));
        }
        conflicts.extend(constraints.check_double_booking(&group_schedule));
        conflicts.extend(constraints.check_staffing(
            &group_schedule,
            ctx.start_date,
            ctx.end_date,
        ));

        // Phase 4: fairness over the generated window
        let roster_list: Vec<&str> = roster.iter().map(|a| a.id.as_str()).collect();
        let counts =
            counts_from_assignments(&roster_list, &group_schedule, ctx.start_date, ctx.end_date);
        let fairness_metrics = FairnessEngine::new(&config.fairness).score(&counts);
        if fairness_metrics.overall_score < config.fairness.min_acceptable_score {
            conflicts.push(Violation::new(
                ViolationKind::FairnessViolation,
                Severity::Low,
                None,
                None,
                format!(
                    "fairness score {:.3} is below the acceptable minimum {:.3}",
                    fairness_metrics.overall_score, config.fairness.min_acceptable_score
                ),
            ));
        }

        let range_days = days_inclusive(ctx.start_date, ctx.end_date).count();
        let covered_days = days_inclusive(ctx.start_date, ctx.end_date)
            .filter(|date| group_schedule.iter().any(|a| a.date == *date))
            .count();
        let coverage = covered_days as f64 / range_days as f64;
        let serious = conflicts
            .iter()
            .filter(|v| v.severity >= Severity::High)
            .count();
        let cleanliness = 1.0 / (1.0 + serious as f64);
        let decision_score =
            self.decision_score(fairness_metrics.overall_score, coverage, cleanliness);

        proposals.sort_by(|a, b| (a.date, &a.analyst_id).cmp(&(b.date, &b.analyst_id)));
        overwrites.sort_by(|a, b| (&a.analyst_id, a.date).cmp(&(&b.analyst_id, b.date)));
        sort_violations(&mut conflicts);
        conflicts.dedup();

        log_checks!(
            config.verbosity,
            "  {} proposals, {} conflicts, {} overwrites, fairness {:.3}",
            proposals.len(),
            conflicts.len(),
            overwrites.len(),
            fairness_metrics.overall_score
        );

        let mut performance_metrics: HashMap<String, f64> = HashMap::new();
        performance_metrics.insert(
            "elapsed_us".to_string(),
            started.elapsed().as_micros() as f64,
        );
        performance_metrics.insert("analysts".to_string(), roster.len() as f64);
        performance_metrics.insert(
            "weeks".to_string(),
            week_starts(ctx.start_date, ctx.end_date).len() as f64,
        );
        performance_metrics.insert("raw_proposals".to_string(), raw_count as f64);
        performance_metrics.insert("proposed".to_string(), proposals.len() as f64);
        performance_metrics.insert("dropped".to_string(), dropped as f64);
        performance_metrics.insert("already_scheduled".to_string(), already_scheduled as f64);
        performance_metrics.insert("screeners_promoted".to_string(), promoted.len() as f64);
        performance_metrics.insert("conflicts".to_string(), conflicts.len() as f64);
        performance_metrics.insert("overwrites".to_string(), overwrites.len() as f64);
        performance_metrics.insert("coverage".to_string(), coverage);
        performance_metrics.insert("cleanliness".to_string(), cleanliness);
        performance_metrics.insert("decision_score".to_string(), decision_score);

        let chain: Vec<&str> = (0..self.table.len())
            .map(|p| self.table.pattern(p).name.as_str())
            .collect();
        let mut metadata: HashMap<String, String> = HashMap::new();
        metadata.insert("algorithm".to_string(), config.algorithm_id.clone());
        metadata.insert("strategy".to_string(), config.strategy.clone());
        metadata.insert("shift_group".to_string(), ctx.shift_group.clone());
        metadata.insert("patterns".to_string(), chain.join(">"));
        metadata.insert(
            "anchor_date".to_string(),
            config.rotation.anchor_date.to_string(),
        );
        metadata.insert(
            "rotation_version".to_string(),
            plan.next_state.version.to_string(),
        );

        Ok(GenerationResult {
            proposed_assignments: proposals,
            conflicts,
            overwrites,
            fairness_metrics,
            performance_metrics,
            comp_off_earned,
            next_rotation_state: plan.next_state,
            next_continuity: plan.next_continuity,
            new_to_rotation: plan.new_to_rotation,
            algorithm_metadata: metadata,
        })
    }

    /// Weighted blend of fairness, coverage and constraint cleanliness in [0, 1].
    fn decision_score(&self, fairness: f64, coverage: f64, cleanliness: f64) -> f64 {
        let c = self.config;
        let total = c.fairness_weight + c.efficiency_weight + c.constraint_weight;
        if total <= 0.0 {
            return (fairness + coverage + cleanliness) / 3.0;
        }
        ((c.fairness_weight * fairness
            + c.efficiency_weight * coverage
            + c.constraint_weight * cleanliness)
            / total)
            .clamp(0.0, 1.0)
    }

    /// Simulate a swap against the context's current schedule.
    pub fn validate_swap(
        &self,
        ctx: &SchedulingContext,
        request: &SwapRequest,
    ) -> Result<SwapOutcome, EngineError> {
        let constraints = ConstraintEngine::new(&ctx.constraints, self.config);
        let simulator = SwapSimulator::new(&constraints, &ctx.analysts, self.config.verbosity);
        Ok(simulator.validate(request, &ctx.existing_assignments)?)
    }
}

/// Validate `config` and generate in one step.
pub fn generate(
    ctx: &SchedulingContext,
    continuity: &[PatternContinuity],
    rotation_state: Option<&RotationState>,
    config: &EngineConfig,
) -> Result<GenerationResult, EngineError> {
    ScheduleGenerator::new(config)?.generate(ctx, continuity, rotation_state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RotationConfig;
    use crate::models::Constraint;
    use crate::swap::DateSpan;

    fn d(year: i32, month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, day).unwrap()
    }

    fn analyst(id: &str) -> Analyst {
        Analyst {
            id: id.to_string(),
            name: id.to_string(),
            region: "AMR".to_string(),
            shift: "AM".to_string(),
            active: true,
            skills: vec![],
        }
    }

    fn config() -> EngineConfig {
        EngineConfig {
            rotation: RotationConfig {
                anchor_date: d(2026, 1, 4),
                ..RotationConfig::default()
            },
            ..EngineConfig::default()
        }
    }

    fn context(ids: &[&str], start: NaiveDate, end: NaiveDate) -> SchedulingContext {
        SchedulingContext {
            start_date: start,
            end_date: end,
            shift_group: "AMR-AM".to_string(),
            analysts: ids.iter().map(|id| analyst(id)).collect(),
            existing_assignments: Vec::new(),
            constraints: Vec::new(),
            holidays: Vec::new(),
        }
    }

    #[test]
    fn test_generate_basic_invariants() {
        let ctx = context(&["a1", "a2", "a3", "a4", "a5", "a6"], d(2026, 1, 4), d(2026, 1, 24));
        let result = generate(&ctx, &[], None, &config()).unwrap();

        assert_eq!(result.proposed_assignments.len(), 6 * 3 * 5);
        let mut keys: Vec<(String, NaiveDate)> = result
            .proposed_assignments
            .iter()
            .map(|a| (a.analyst_id.clone(), a.date))
            .collect();
        keys.sort();
        keys.dedup();
        assert_eq!(keys.len(), result.proposed_assignments.len());

        // Exactly one screener on every weekday
        for date in days_inclusive(d(2026, 1, 4), d(2026, 1, 24)) {
            let screeners = result
                .proposed_assignments
                .iter()
                .filter(|a| a.date == date && a.is_screener)
                .count();
            let expected = usize::from(!crate::calendar::is_weekend(date));
            assert_eq!(screeners, expected, "screeners on {}", date);
        }

        assert!(result
            .conflicts
            .iter()
            .all(|v| v.kind != ViolationKind::ConstraintViolation));
        assert_eq!(result.new_to_rotation.len(), 6);
        assert_eq!(result.next_rotation_state.version, 1);
        assert!(!result.comp_off_earned.is_empty());
        assert!(result.performance_metrics.contains_key("decision_score"));
    }

    #[test]
    fn test_generate_is_deterministic() {
        let ctx = context(&["a3", "a1", "a2", "a4"], d(2026, 1, 4), d(2026, 2, 14));
        let first = generate(&ctx, &[], None, &config()).unwrap();
        let second = generate(&ctx, &[], None, &config()).unwrap();
        assert_eq!(first.proposed_assignments, second.proposed_assignments);
        assert_eq!(first.conflicts, second.conflicts);
        assert_eq!(first.next_rotation_state, second.next_rotation_state);
    }

    #[test]
    fn test_vacation_drops_proposals() {
        let mut ctx = context(&["a1", "a2", "a3"], d(2026, 1, 4), d(2026, 1, 10));
        ctx.constraints
            .push(Constraint::vacation("a1", d(2026, 1, 4), d(2026, 1, 10)));
        let result = generate(&ctx, &[], None, &config()).unwrap();

        assert!(result
            .proposed_assignments
            .iter()
            .all(|a| a.analyst_id != "a1"));
        let blackout = result
            .conflicts
            .iter()
            .filter(|v| v.kind == ViolationKind::BlackoutDate)
            .count();
        assert_eq!(blackout, 5);
    }

    #[test]
    fn test_overwrites_reported_and_gated() {
        let mut ctx = context(&["a1", "a2", "a3"], d(2026, 1, 4), d(2026, 1, 10));
        let plain = generate(&ctx, &[], None, &config()).unwrap();
        let target = plain.proposed_assignments[0].clone();

        let mut manual = target.clone();
        manual.shift_type = "PM".to_string();
        let mut same = plain.proposed_assignments[1].clone();
        same.is_screener = false;
        ctx.existing_assignments = vec![manual, same.clone()];

        let result = generate(&ctx, &[], None, &config()).unwrap();
        assert_eq!(result.overwrites.len(), 1);
        assert_eq!(result.overwrites[0].proposed.date, target.date);
        assert!(!result
            .proposed_assignments
            .iter()
            .any(|a| a.analyst_id == target.analyst_id && a.date == target.date));
        // Identical existing entry is only touched to carry the screener flag
        assert!(result
            .proposed_assignments
            .iter()
            .filter(|a| a.analyst_id == same.analyst_id && a.date == same.date)
            .all(|a| a.is_screener));
        assert_eq!(result.performance_metrics["already_scheduled"], 1.0);

        let allow = EngineConfig {
            allow_overwrite: true,
            ..config()
        };
        let result = generate(&ctx, &[], None, &allow).unwrap();
        assert_eq!(result.overwrites.len(), 1);
        assert!(result
            .proposed_assignments
            .iter()
            .any(|a| a.analyst_id == target.analyst_id && a.date == target.date));
    }

    #[test]
    fn test_streak_across_existing_schedule() {
        let mut ctx = context(&["a1", "a2", "a3"], d(2026, 1, 4), d(2026, 1, 10));
        let plain = generate(&ctx, &[], None, &config()).unwrap();
        let first = plain
            .proposed_assignments
            .iter()
            .filter(|a| a.analyst_id == "a1")
            .map(|a| a.date)
            .min()
            .unwrap();
        // Three manual days leading into a1's first generated day
        ctx.existing_assignments = (1..=3)
            .map(|back| Assignment::rotation("a1", first - chrono::Duration::days(back), "AM"))
            .collect();

        let result = generate(&ctx, &[], None, &config()).unwrap();
        assert!(result.conflicts.iter().any(|v| {
            v.kind == ViolationKind::ConstraintViolation
                && v.severity == Severity::High
                && v.analyst_id.as_deref() == Some("a1")
        }));
    }

    #[test]
    fn test_regenerate_over_unflagged_schedule_promotes_screeners() {
        let mut ctx = context(&["a1", "a2", "a3"], d(2026, 1, 4), d(2026, 1, 10));
        let first = generate(&ctx, &[], None, &config()).unwrap();
        ctx.existing_assignments = first
            .proposed_assignments
            .iter()
            .map(|a| Assignment {
                is_screener: false,
                ..a.clone()
            })
            .collect();

        let result = generate(&ctx, &[], None, &config()).unwrap();
        assert!(result
            .conflicts
            .iter()
            .all(|v| v.kind != ViolationKind::InsufficientStaff));
        // Only the weekday screener flags change
        assert_eq!(result.proposed_assignments.len(), 5);
        for a in &result.proposed_assignments {
            assert!(a.is_screener);
            assert!(ctx
                .existing_assignments
                .iter()
                .any(|e| e.analyst_id == a.analyst_id && e.date == a.date));
        }
        let flagged: Vec<(NaiveDate, &str)> = first
            .proposed_assignments
            .iter()
            .filter(|a| a.is_screener)
            .map(|a| (a.date, a.analyst_id.as_str()))
            .collect();
        let promoted: Vec<(NaiveDate, &str)> = result
            .proposed_assignments
            .iter()
            .map(|a| (a.date, a.analyst_id.as_str()))
            .collect();
        assert_eq!(promoted, flagged);
        assert_eq!(result.performance_metrics["screeners_promoted"], 5.0);
        assert!(result.comp_off_earned.is_empty());
        assert!(result
            .conflicts
            .iter()
            .all(|v| v.severity < Severity::Critical));
    }

    #[test]
    fn test_existing_assignment_on_blocked_date_reported() {
        let mut ctx = context(&["a1", "a2", "a3"], d(2026, 1, 4), d(2026, 1, 10));
        ctx.constraints
            .push(Constraint::vacation("a1", d(2026, 1, 9), d(2026, 1, 10)));
        // Manual Saturday for a Mon-Fri analyst during their vacation, plus a
        // stored Friday the rotation would also propose
        ctx.existing_assignments = vec![
            Assignment::rotation("a1", d(2026, 1, 9), "AM"),
            Assignment::rotation("a1", d(2026, 1, 10), "AM"),
        ];

        let result = generate(&ctx, &[], None, &config()).unwrap();
        let blocked: Vec<Option<NaiveDate>> = result
            .conflicts
            .iter()
            .filter(|v| v.kind == ViolationKind::BlackoutDate)
            .map(|v| v.date)
            .collect();
        assert_eq!(blocked, vec![Some(d(2026, 1, 9)), Some(d(2026, 1, 10))]);
        assert!(result
            .conflicts
            .iter()
            .filter(|v| v.kind == ViolationKind::BlackoutDate)
            .all(|v| v.severity == Severity::High && v.analyst_id.as_deref() == Some("a1")));
    }

    #[test]
    fn test_fatal_errors() {
        let ctx = context(&[], d(2026, 1, 4), d(2026, 1, 10));
        assert!(matches!(
            generate(&ctx, &[], None, &config()),
            Err(EngineError::EmptyRoster(_))
        ));

        let ctx = context(&["a1"], d(2026, 1, 10), d(2026, 1, 4));
        assert!(matches!(
            generate(&ctx, &[], None, &config()),
            Err(EngineError::InvertedRange { .. })
        ));

        let bad = EngineConfig {
            strategy: "random".to_string(),
            ..config()
        };
        assert!(matches!(
            ScheduleGenerator::new(&bad),
            Err(EngineError::InvalidConfig(_))
        ));

        let bad = EngineConfig {
            screener_days: vec!["Funday".to_string()],
            ..config()
        };
        assert!(matches!(
            ScheduleGenerator::new(&bad),
            Err(EngineError::InvalidConfig(_))
        ));

        let mut bad = config();
        bad.rotation.cycle_weeks = 4;
        assert!(matches!(
            ScheduleGenerator::new(&bad),
            Err(EngineError::Pattern(_))
        ));
    }

    #[test]
    fn test_validate_swap_maps_errors() {
        let ctx = context(&["a1", "a2"], d(2026, 1, 4), d(2026, 1, 10));
        let config = config();
        let generator = ScheduleGenerator::new(&config).unwrap();
        let request = SwapRequest {
            analyst_a: "a1".to_string(),
            given_by_a: DateSpan::day(d(2026, 1, 5)),
            analyst_b: "zz".to_string(),
            given_by_b: None,
            force: false,
        };
        assert!(matches!(
            generator.validate_swap(&ctx, &request),
            Err(EngineError::UnknownAnalyst(_))
        ));
    }
}
