//! Rotation pattern engine.
//!
//! Every analyst belongs to a slot (an offset into the pattern chain). The
//! pattern a slot holds in a given week is computed from the anchored cycle,
//! so proposals do not depend on iteration order or on how the requested range
//! is split across runs.

use chrono::NaiveDate;
use rustc_hash::{FxHashMap, FxHashSet};

use crate::calendar::{is_weekend, shift_days, week_start, week_starts};
use crate::config::EngineConfig;
use crate::models::{Analyst, Assignment, SchedulingContext};
use crate::ranking::{rank, RankKey};
use crate::{log_changes, log_checks, log_debug};

use super::pattern::PatternTable;
use super::state::{PatternContinuity, RotationState};

/// How a continuity record relates to the run being generated.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ContinuityStatus {
    /// Occurrence began inside the lookback window: resume from it
    Resume,
    /// Occurrence began at or before the lookback window start
    Stale,
    /// Occurrence began in or after the current week (written by an overlapping run)
    Overlapping,
}

/// Classify a continuity record against the first week being generated.
///
/// A record resumes the rotation only when its occurrence began strictly after
/// the lookback start and strictly before the current week start. That
/// occurrence is then treated as already executed and is not handed out again.
pub fn classify_continuity(
    record: &PatternContinuity,
    current_week: NaiveDate,
    lookback_weeks: u32,
) -> ContinuityStatus {
    let lookback_start = shift_days(current_week, -7 * i64::from(lookback_weeks));
    let began = week_start(record.pattern_start);
    if began >= current_week {
        ContinuityStatus::Overlapping
    } else if began <= lookback_start {
        ContinuityStatus::Stale
    } else {
        ContinuityStatus::Resume
    }
}

/// Output of one rotation pass.
#[derive(Clone, Debug)]
pub struct RotationPlan {
    /// Regular-shift proposals inside the requested range
    pub assignments: Vec<Assignment>,
    /// Analyst id -> slot offset
    pub offsets: FxHashMap<String, usize>,
    /// Analysts placed without any rotation history
    pub new_to_rotation: Vec<String>,
    pub next_state: RotationState,
    pub next_continuity: Vec<PatternContinuity>,
}

impl RotationPlan {
    /// Chain position the analyst holds during the week containing `date`.
    pub fn pattern_position(
        &self,
        table: &PatternTable,
        analyst_id: &str,
        date: NaiveDate,
    ) -> Option<usize> {
        self.offsets
            .get(analyst_id)
            .map(|offset| table.slot_pattern(*offset, week_start(date)))
    }
}

/// Assigns weekly work patterns and advances them cycle to cycle.
pub struct RotationEngine<'a> {
    table: &'a PatternTable,
    algorithm_id: &'a str,
    lookback_weeks: u32,
    verbosity: u8,
}

impl<'a> RotationEngine<'a> {
    pub fn new(table: &'a PatternTable, config: &'a EngineConfig) -> Self {
        Self {
            table,
            algorithm_id: &config.algorithm_id,
            lookback_weeks: config.rotation.effective_lookback_weeks(),
            verbosity: config.verbosity,
        }
    }

    /// Propose regular shifts for every active analyst of the context's shift group.
    ///
    /// An empty roster (or empty range) yields an empty plan and leaves the
    /// rotation state untouched.
    pub fn propose(
        &self,
        ctx: &SchedulingContext,
        continuity: &[PatternContinuity],
        prior: Option<&RotationState>,
    ) -> RotationPlan {
        let roster = ctx.rotating_analysts();
        let weeks = week_starts(ctx.start_date, ctx.end_date);

        if roster.is_empty() || weeks.is_empty() {
            return RotationPlan {
                assignments: Vec::new(),
                offsets: FxHashMap::default(),
                new_to_rotation: Vec::new(),
                next_state: prior
                    .cloned()
                    .unwrap_or_else(|| RotationState::empty(self.algorithm_id, &ctx.shift_group)),
                next_continuity: Vec::new(),
            };
        }

        let records: FxHashMap<&str, &PatternContinuity> = continuity
            .iter()
            .filter(|c| c.algorithm_id == self.algorithm_id)
            .map(|c| (c.analyst_id.as_str(), c))
            .collect();

        let first_week = weeks[0];
        let (mut offsets, new_analysts) =
            self.resolve_offsets(&roster, &records, prior, first_week);
        self.place_new(&mut offsets, &new_analysts, first_week);
        self.balance_slots(&roster, &mut offsets, &records, prior);

        let mut assignments: Vec<Assignment> = Vec::new();
        for week in &weeks {
            for analyst in &roster {
                let offset = offsets[analyst.id.as_str()];
                let position = self.table.slot_pattern(offset, *week);
                log_checks!(
                    self.verbosity,
                    "  Week {}: {} -> {}",
                    week,
                    analyst.id,
                    self.table.pattern(position)
                );
                for date in self.table.work_dates(position, *week) {
                    if date >= ctx.start_date && date <= ctx.end_date {
                        assignments.push(Assignment::rotation(&analyst.id, date, &analyst.shift));
                    }
                }
            }
        }

        let last_week = weeks[weeks.len() - 1];
        let next_state = self.next_state(ctx, &roster, &offsets, prior, last_week);
        let next_continuity =
            self.next_continuity(&roster, &offsets, &records, &assignments, last_week);

        RotationPlan {
            assignments,
            offsets,
            new_to_rotation: new_analysts,
            next_state,
            next_continuity,
        }
    }

    /// Resolve slot offsets from continuity, then rotation state.
    ///
    /// Returns the resolved offsets and the ids (sorted) of analysts with no usable history.
    fn resolve_offsets(
        &self,
        roster: &[&Analyst],
        records: &FxHashMap<&str, &PatternContinuity>,
        prior: Option<&RotationState>,
        first_week: NaiveDate,
    ) -> (FxHashMap<String, usize>, Vec<String>) {
        let mut offsets: FxHashMap<String, usize> = FxHashMap::default();
        let mut new_analysts: Vec<String> = Vec::new();

        for analyst in roster {
            let id = analyst.id.as_str();

            if let Some(record) = records.get(id) {
                let status = classify_continuity(record, first_week, self.lookback_weeks);
                log_debug!(
                    self.verbosity,
                    "  Continuity {}: {} since {} ({:?})",
                    id,
                    record.last_pattern,
                    record.pattern_start,
                    status
                );
                if status == ContinuityStatus::Resume {
                    if let Some(position) = self.table.position(&record.last_pattern) {
                        let offset = self
                            .table
                            .offset_for(position, week_start(record.pattern_start));
                        offsets.insert(id.to_string(), offset);
                        continue;
                    }
                }
            }

            let from_state = prior.and_then(|state| {
                let as_of = state.as_of?;
                let position = self.table.position(state.pattern_of(id)?)?;
                Some(self.table.offset_for(position, as_of))
            });
            match from_state {
                Some(offset) => {
                    offsets.insert(id.to_string(), offset);
                }
                None => new_analysts.push(id.to_string()),
            }
        }

        (offsets, new_analysts)
    }

    /// Place analysts with no history into the least populated slots.
    ///
    /// Ties prefer the slot holding the baseline pattern in the first week, then
    /// successor order.
    fn place_new(
        &self,
        offsets: &mut FxHashMap<String, usize>,
        new_analysts: &[String],
        first_week: NaiveDate,
    ) {
        let n = self.table.len();
        let mut counts = vec![0usize; n];
        for offset in offsets.values() {
            counts[*offset] += 1;
        }

        for analyst_id in new_analysts {
            let Some(offset) =
                (0..n).min_by_key(|o| (counts[*o], self.table.slot_pattern(*o, first_week)))
            else {
                continue;
            };
            counts[offset] += 1;
            offsets.insert(analyst_id.clone(), offset);
            log_changes!(
                self.verbosity,
                "  New to rotation: {} starts on {}",
                analyst_id,
                self.table.pattern(self.table.slot_pattern(offset, first_week)).name
            );
        }
    }

    /// Fill empty slots so every pattern keeps coverage when the roster allows it.
    ///
    /// Analysts in progress on a weekend leg keep their slot; otherwise the
    /// least-recently-rotated analyst of the most populated slot moves.
    fn balance_slots(
        &self,
        roster: &[&Analyst],
        offsets: &mut FxHashMap<String, usize>,
        records: &FxHashMap<&str, &PatternContinuity>,
        prior: Option<&RotationState>,
    ) {
        let n = self.table.len();
        if roster.len() < n {
            return;
        }

        loop {
            let mut counts = vec![0usize; n];
            for offset in offsets.values() {
                counts[*offset] += 1;
            }
            let Some(empty) = (0..n).find(|o| counts[*o] == 0) else {
                break;
            };

            let mut donors: Vec<usize> = (0..n).filter(|o| counts[*o] >= 2).collect();
            donors.sort_by(|a, b| counts[*b].cmp(&counts[*a]).then(a.cmp(b)));

            let mut moved = false;
            for donor in donors {
                let keys: Vec<RankKey> = roster
                    .iter()
                    .filter(|a| offsets.get(a.id.as_str()) == Some(&donor))
                    .filter(|a| !prior.is_some_and(|p| p.is_in_progress(&a.id)))
                    .map(|a| {
                        let last = records.get(a.id.as_str()).and_then(|r| r.last_weekend_date);
                        RankKey::rotation(&a.id, last)
                    })
                    .collect();
                if let Some(pick) = rank(keys).into_iter().next() {
                    log_changes!(
                        self.verbosity,
                        "  Rebalance: {} moves from slot {} to empty slot {}",
                        pick,
                        donor,
                        empty
                    );
                    offsets.insert(pick, empty);
                    moved = true;
                    break;
                }
            }
            if !moved {
                break;
            }
        }
    }

    fn next_state(
        &self,
        ctx: &SchedulingContext,
        roster: &[&Analyst],
        offsets: &FxHashMap<String, usize>,
        prior: Option<&RotationState>,
        last_week: NaiveDate,
    ) -> RotationState {
        let mut state = RotationState::empty(self.algorithm_id, &ctx.shift_group);
        state.as_of = Some(last_week);
        state.version = prior.map(|p| p.version + 1).unwrap_or(1);

        let weekend_positions: FxHashSet<usize> =
            self.table.weekend_positions().into_iter().collect();
        let cycle_start = self.table.cycle_start(last_week);

        for analyst in roster {
            let offset = offsets[analyst.id.as_str()];
            let position = self.table.slot_pattern(offset, last_week);
            let pattern = self.table.pattern(position);

            state
                .slot_holders
                .entry(pattern.name.clone())
                .or_default()
                .push(analyst.id.clone());
            if pattern.has_weekend {
                state.in_progress.insert(analyst.id.clone());
            }

            let mut held: FxHashSet<usize> = FxHashSet::default();
            let mut week = cycle_start;
            while week <= last_week {
                held.insert(self.table.slot_pattern(offset, week));
                week = shift_days(week, 7);
            }
            if !weekend_positions.is_empty() && weekend_positions.is_subset(&held) {
                state.completed.insert(analyst.id.clone());
            }
        }
        for holders in state.slot_holders.values_mut() {
            holders.sort();
        }

        log_debug!(
            self.verbosity,
            "  Rotation state v{} as of {} ({} weeks from anchor)",
            state.version,
            last_week,
            self.table.weeks_from_anchor(last_week)
        );
        state
    }

    fn next_continuity(
        &self,
        roster: &[&Analyst],
        offsets: &FxHashMap<String, usize>,
        records: &FxHashMap<&str, &PatternContinuity>,
        assignments: &[Assignment],
        last_week: NaiveDate,
    ) -> Vec<PatternContinuity> {
        let mut last_worked: FxHashMap<&str, NaiveDate> = FxHashMap::default();
        let mut last_weekend: FxHashMap<&str, NaiveDate> = FxHashMap::default();
        for assignment in assignments {
            let id = assignment.analyst_id.as_str();
            let entry = last_worked.entry(id).or_insert(assignment.date);
            *entry = (*entry).max(assignment.date);
            if is_weekend(assignment.date) {
                let entry = last_weekend.entry(id).or_insert(assignment.date);
                *entry = (*entry).max(assignment.date);
            }
        }

        let pattern_start = self.table.occurrence_start(last_week);
        roster
            .iter()
            .map(|analyst| {
                let id = analyst.id.as_str();
                let previous = records.get(id);
                let position = self.table.slot_pattern(offsets[id], last_week);
                PatternContinuity {
                    algorithm_id: self.algorithm_id.to_string(),
                    analyst_id: analyst.id.clone(),
                    last_pattern: self.table.pattern(position).name.clone(),
                    pattern_start,
                    last_worked_date: last_worked
                        .get(id)
                        .copied()
                        .or_else(|| previous.map(|p| p.last_worked_date))
                        .unwrap_or(pattern_start),
                    last_weekend_date: last_weekend
                        .get(id)
                        .copied()
                        .or_else(|| previous.and_then(|p| p.last_weekend_date)),
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RotationConfig;

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

    fn context(ids: &[&str], start: NaiveDate, end: NaiveDate) -> SchedulingContext {
        SchedulingContext {
            start_date: start,
            end_date: end,
            shift_group: "AMR-AM".to_string(),
            analysts: ids.iter().map(|id| analyst(id)).collect(),
            existing_assignments: vec![],
            constraints: vec![],
            holidays: vec![],
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

    fn pattern_counts(
        plan: &RotationPlan,
        table: &PatternTable,
        analyst_id: &str,
        weeks: &[NaiveDate],
    ) -> Vec<usize> {
        let mut counts = vec![0; table.len()];
        for week in weeks {
            counts[plan.pattern_position(table, analyst_id, *week).unwrap()] += 1;
        }
        counts
    }

    #[test]
    fn test_seven_analysts_nine_weeks_each_pattern_three_times() {
        let cfg = config();
        let table = PatternTable::from_config(&cfg.rotation).unwrap();
        let ids = ["a1", "a2", "a3", "a4", "a5", "a6", "a7"];
        let ctx = context(&ids, d(2026, 1, 4), d(2026, 3, 7));
        let plan = RotationEngine::new(&table, &cfg).propose(&ctx, &[], None);

        let weeks = week_starts(ctx.start_date, ctx.end_date);
        assert_eq!(weeks.len(), 9);
        for id in ids {
            assert_eq!(pattern_counts(&plan, &table, id, &weeks), vec![3, 3, 3]);
        }
        assert_eq!(plan.new_to_rotation.len(), 7);
        // 7 analysts over 3 slots: 3/2/2 split every week
        for week in &weeks {
            let mut per_pattern = vec![0; 3];
            for id in ids {
                per_pattern[plan.pattern_position(&table, id, *week).unwrap()] += 1;
            }
            per_pattern.sort();
            assert_eq!(per_pattern, vec![2, 2, 3]);
        }
        // 7 analysts * 9 weeks * 5 days
        assert_eq!(plan.assignments.len(), 7 * 9 * 5);
    }

    #[test]
    fn test_no_double_booking() {
        let cfg = config();
        let table = PatternTable::from_config(&cfg.rotation).unwrap();
        let ctx = context(&["a1", "a2", "a3", "a4"], d(2026, 1, 7), d(2026, 2, 20));
        let plan = RotationEngine::new(&table, &cfg).propose(&ctx, &[], None);

        let mut seen: FxHashSet<(String, NaiveDate)> = FxHashSet::default();
        for a in &plan.assignments {
            assert!(seen.insert((a.analyst_id.clone(), a.date)));
            assert!(a.date >= ctx.start_date && a.date <= ctx.end_date);
        }
    }

    #[test]
    fn test_deterministic_output() {
        let cfg = config();
        let table = PatternTable::from_config(&cfg.rotation).unwrap();
        let ctx = context(&["c", "a", "b", "d", "e"], d(2026, 1, 4), d(2026, 2, 28));
        let engine = RotationEngine::new(&table, &cfg);
        let first = engine.propose(&ctx, &[], None);
        let second = engine.propose(&ctx, &[], None);
        assert_eq!(first.assignments, second.assignments);
        assert_eq!(first.next_state, second.next_state);
        assert_eq!(first.next_continuity, second.next_continuity);
    }

    #[test]
    fn test_split_runs_match_single_run() {
        let cfg = config();
        let table = PatternTable::from_config(&cfg.rotation).unwrap();
        let engine = RotationEngine::new(&table, &cfg);
        let ids = ["a1", "a2", "a3", "a4", "a5"];

        let whole = engine.propose(&context(&ids, d(2026, 1, 4), d(2026, 2, 14)), &[], None);

        let first = engine.propose(&context(&ids, d(2026, 1, 4), d(2026, 1, 24)), &[], None);
        let second = engine.propose(
            &context(&ids, d(2026, 1, 25), d(2026, 2, 14)),
            &first.next_continuity,
            Some(&first.next_state),
        );
        assert!(second.new_to_rotation.is_empty());

        let mut stitched = first.assignments.clone();
        stitched.extend(second.assignments.clone());
        assert_eq!(stitched.len(), whole.assignments.len());
        for a in &whole.assignments {
            assert!(stitched.contains(a));
        }
        assert_eq!(second.next_state.version, 2);
    }

    #[test]
    fn test_continuity_window_classification() {
        let record = PatternContinuity {
            algorithm_id: "weekend_rotation".to_string(),
            analyst_id: "a1".to_string(),
            last_pattern: "SUN_THU".to_string(),
            pattern_start: d(2026, 1, 18),
            last_worked_date: d(2026, 1, 22),
            last_weekend_date: Some(d(2026, 1, 18)),
        };
        // Current week Jan 25, lookback 3 weeks -> window (Jan 4, Jan 25)
        assert_eq!(
            classify_continuity(&record, d(2026, 1, 25), 3),
            ContinuityStatus::Resume
        );
        assert_eq!(
            classify_continuity(&record, d(2026, 1, 18), 3),
            ContinuityStatus::Overlapping
        );
        assert_eq!(
            classify_continuity(&record, d(2026, 2, 8), 3),
            ContinuityStatus::Stale
        );
    }

    #[test]
    fn test_resumed_analyst_does_not_repeat_last_pattern() {
        let cfg = config();
        let table = PatternTable::from_config(&cfg.rotation).unwrap();
        let ctx = context(&["a1"], d(2026, 1, 25), d(2026, 1, 31));
        let record = PatternContinuity {
            algorithm_id: cfg.algorithm_id.clone(),
            analyst_id: "a1".to_string(),
            last_pattern: "SUN_THU".to_string(),
            pattern_start: d(2026, 1, 18),
            last_worked_date: d(2026, 1, 22),
            last_weekend_date: Some(d(2026, 1, 18)),
        };
        let plan = RotationEngine::new(&table, &cfg).propose(&ctx, &[record], None);
        assert!(plan.new_to_rotation.is_empty());
        let position = plan.pattern_position(&table, "a1", d(2026, 1, 25)).unwrap();
        assert_eq!(table.pattern(position).name, "TUE_SAT");
    }

    #[test]
    fn test_stale_continuity_falls_back_to_new() {
        let cfg = config();
        let table = PatternTable::from_config(&cfg.rotation).unwrap();
        let ctx = context(&["a1"], d(2026, 3, 1), d(2026, 3, 7));
        let record = PatternContinuity {
            algorithm_id: cfg.algorithm_id.clone(),
            analyst_id: "a1".to_string(),
            last_pattern: "SUN_THU".to_string(),
            pattern_start: d(2026, 1, 4),
            last_worked_date: d(2026, 1, 8),
            last_weekend_date: None,
        };
        let plan = RotationEngine::new(&table, &cfg).propose(&ctx, &[record], None);
        assert_eq!(plan.new_to_rotation, vec!["a1"]);
        let position = plan.pattern_position(&table, "a1", d(2026, 3, 1)).unwrap();
        assert_eq!(table.pattern(position).name, "MON_FRI");
    }

    #[test]
    fn test_rebalance_keeps_in_progress_and_moves_least_recent() {
        let cfg = config();
        let table = PatternTable::from_config(&cfg.rotation).unwrap();
        let week = d(2026, 1, 25);
        // Everyone recorded on SUN_THU the same week: slot collapse
        let mut prior = RotationState::empty(&cfg.algorithm_id, "AMR-AM");
        prior.as_of = Some(d(2026, 1, 18));
        prior.slot_holders.insert(
            "SUN_THU".to_string(),
            vec!["a1".to_string(), "a2".to_string(), "a3".to_string()],
        );
        prior.in_progress.insert("a1".to_string());
        let records = vec![
            PatternContinuity {
                algorithm_id: "other_algorithm".to_string(),
                analyst_id: "a2".to_string(),
                last_pattern: "SUN_THU".to_string(),
                pattern_start: d(2026, 1, 18),
                last_worked_date: d(2026, 1, 22),
                last_weekend_date: Some(d(2026, 1, 18)),
            },
        ];
        let ctx = context(&["a1", "a2", "a3"], week, d(2026, 1, 31));
        let plan = RotationEngine::new(&table, &cfg).propose(&ctx, &records, Some(&prior));

        let positions: FxHashSet<usize> = ["a1", "a2", "a3"]
            .iter()
            .map(|id| plan.pattern_position(&table, id, week).unwrap())
            .collect();
        assert_eq!(positions.len(), 3);
        // a1 was in progress and keeps the slot derived from the prior state
        assert_eq!(
            table.pattern(plan.pattern_position(&table, "a1", week).unwrap()).name,
            "TUE_SAT"
        );
    }

    #[test]
    fn test_empty_roster_returns_empty_plan() {
        let cfg = config();
        let table = PatternTable::from_config(&cfg.rotation).unwrap();
        let ctx = context(&[], d(2026, 1, 4), d(2026, 1, 31));
        let plan = RotationEngine::new(&table, &cfg).propose(&ctx, &[], None);
        assert!(plan.assignments.is_empty());
        assert!(plan.next_continuity.is_empty());
        assert_eq!(plan.next_state.version, 0);
    }

    #[test]
    fn test_next_state_tracks_weekend_legs() {
        let cfg = config();
        let table = PatternTable::from_config(&cfg.rotation).unwrap();
        let ids = ["a1", "a2", "a3"];
        let ctx = context(&ids, d(2026, 1, 4), d(2026, 1, 24));
        let plan = RotationEngine::new(&table, &cfg).propose(&ctx, &[], None);
        let state = &plan.next_state;

        assert_eq!(state.as_of, Some(d(2026, 1, 18)));
        assert_eq!(state.holder_count(), 3);
        assert_eq!(state.in_progress.len(), 2);
        // A full three-week cycle was generated, so everyone did both weekend legs
        assert_eq!(state.completed.len(), 3);
        for record in &plan.next_continuity {
            assert_eq!(record.pattern_start, d(2026, 1, 18));
            assert!(record.last_worked_date <= d(2026, 1, 24));
        }
    }
}
