//! Weekly work patterns and the anchored pattern table.

use chrono::{Datelike, NaiveDate, Weekday};
use pyo3::prelude::*;
use rustc_hash::{FxHashMap, FxHashSet};
use thiserror::Error;

use crate::calendar::{cycle_position, parse_weekday, shift_days, weekday_label, weeks_since};
use crate::config::RotationConfig;

/// Number of days every work pattern covers.
pub const PATTERN_DAYS: usize = 5;

/// A named weekly template of worked weekdays with its successor in the rotation.
#[pyclass]
#[derive(Clone, Debug, PartialEq)]
pub struct WorkPattern {
    #[pyo3(get, set)]
    pub name: String,
    /// Weekday names ("Sun", "Mon", ...)
    #[pyo3(get, set)]
    pub days: Vec<String>,
    #[pyo3(get, set)]
    pub successor: String,
}

impl WorkPattern {
    pub fn from_days(name: &str, days: &[&str], successor: &str) -> Self {
        Self {
            name: name.to_string(),
            days: days.iter().map(|d| d.to_string()).collect(),
            successor: successor.to_string(),
        }
    }
}

#[pymethods]
impl WorkPattern {
    #[new]
    fn new(name: String, days: Vec<String>, successor: String) -> Self {
        Self {
            name,
            days,
            successor,
        }
    }

    fn __repr__(&self) -> String {
        format!(
            "WorkPattern(name={:?}, days={:?}, successor={:?})",
            self.name, self.days, self.successor
        )
    }
}

/// The standard three-pattern weekend rotation.
///
/// Order is chosen so no transition produces more than five consecutive days:
/// Mon-Fri -> Sun-Thu -> Tue-Sat -> Mon-Fri.
pub fn default_patterns() -> Vec<WorkPattern> {
    vec![
        WorkPattern::from_days("MON_FRI", &["Mon", "Tue", "Wed", "Thu", "Fri"], "SUN_THU"),
        WorkPattern::from_days("SUN_THU", &["Sun", "Mon", "Tue", "Wed", "Thu"], "TUE_SAT"),
        WorkPattern::from_days("TUE_SAT", &["Tue", "Wed", "Thu", "Fri", "Sat"], "MON_FRI"),
    ]
}

/// Errors raised while building a pattern table from configuration.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PatternError {
    #[error("No work patterns configured")]
    Empty,
    #[error("Duplicate pattern name: {0}")]
    DuplicateName(String),
    #[error("Pattern {pattern} has invalid weekday {day:?}")]
    InvalidDay { pattern: String, day: String },
    #[error("Pattern {pattern} must list five distinct weekdays, found {count}")]
    WrongDayCount { pattern: String, count: usize },
    #[error("Pattern {pattern} names unknown successor {successor}")]
    UnknownSuccessor { pattern: String, successor: String },
    #[error("Unknown baseline pattern: {0}")]
    UnknownBaseline(String),
    #[error("Successor links do not form a single cycle through all {total} patterns")]
    BrokenCycle { total: usize },
    #[error("Cycle of {cycle_weeks} weeks cannot be split evenly across {patterns} patterns")]
    CycleLength { cycle_weeks: u32, patterns: usize },
}

/// A validated pattern with parsed weekdays.
#[derive(Clone, Debug)]
pub struct ResolvedPattern {
    pub name: String,
    /// Worked weekdays ordered from Sunday
    pub days: Vec<Weekday>,
    pub has_weekend: bool,
}

/// Pattern chain anchored to the rotation reference date.
///
/// `chain[0]` is the baseline pattern and `chain[i + 1]` is the successor of
/// `chain[i]`. Which chain entry an analyst holds in a given week is a pure
/// function of the week, the anchor date and the analyst's slot offset.
#[derive(Clone, Debug)]
pub struct PatternTable {
    chain: Vec<ResolvedPattern>,
    index: FxHashMap<String, usize>,
    anchor: NaiveDate,
    cycle_weeks: u32,
    weeks_per_pattern: u32,
}

impl PatternTable {
    /// Validate the configured patterns and build the successor chain.
    pub fn from_config(config: &RotationConfig) -> Result<Self, PatternError> {
        if config.patterns.is_empty() {
            return Err(PatternError::Empty);
        }

        let mut by_name: FxHashMap<&str, &WorkPattern> = FxHashMap::default();
        for pattern in &config.patterns {
            if by_name.insert(pattern.name.as_str(), pattern).is_some() {
                return Err(PatternError::DuplicateName(pattern.name.clone()));
            }
        }

        for pattern in &config.patterns {
            if !by_name.contains_key(pattern.successor.as_str()) {
                return Err(PatternError::UnknownSuccessor {
                    pattern: pattern.name.clone(),
                    successor: pattern.successor.clone(),
                });
            }
        }

        let total = config.patterns.len();
        if config.cycle_weeks == 0 || config.cycle_weeks as usize % total != 0 {
            return Err(PatternError::CycleLength {
                cycle_weeks: config.cycle_weeks,
                patterns: total,
            });
        }

        let baseline = by_name
            .get(config.baseline_pattern.as_str())
            .copied()
            .ok_or_else(|| PatternError::UnknownBaseline(config.baseline_pattern.clone()))?;

        // Walk successors from the baseline; must visit every pattern exactly once
        let mut chain: Vec<ResolvedPattern> = Vec::with_capacity(total);
        let mut seen: FxHashSet<&str> = FxHashSet::default();
        let mut current = baseline;
        while seen.insert(current.name.as_str()) {
            chain.push(resolve(current)?);
            current = by_name[current.successor.as_str()];
        }
        if chain.len() != total || current.name != baseline.name {
            return Err(PatternError::BrokenCycle { total });
        }

        let index = chain
            .iter()
            .enumerate()
            .map(|(i, p)| (p.name.clone(), i))
            .collect();

        Ok(Self {
            chain,
            index,
            anchor: config.anchor_date,
            cycle_weeks: config.cycle_weeks,
            weeks_per_pattern: config.cycle_weeks / total as u32,
        })
    }

    pub fn len(&self) -> usize {
        self.chain.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chain.is_empty()
    }

    pub fn weeks_per_pattern(&self) -> u32 {
        self.weeks_per_pattern
    }

    /// Chain position of a pattern name.
    pub fn position(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    pub fn pattern(&self, position: usize) -> &ResolvedPattern {
        &self.chain[position % self.chain.len()]
    }

    /// Chain positions of patterns that include a Saturday or Sunday.
    pub fn weekend_positions(&self) -> Vec<usize> {
        self.chain
            .iter()
            .enumerate()
            .filter(|(_, p)| p.has_weekend)
            .map(|(i, _)| i)
            .collect()
    }

    /// Rotation steps elapsed between the anchor week and `week`.
    pub fn step(&self, week: NaiveDate) -> i64 {
        let (cycle, week_in_cycle) = cycle_position(week, self.anchor, self.cycle_weeks);
        cycle * self.chain.len() as i64 + i64::from(week_in_cycle / self.weeks_per_pattern)
    }

    /// Pattern position held by slot `offset` during `week`.
    pub fn slot_pattern(&self, offset: usize, week: NaiveDate) -> usize {
        (offset as i64 + self.step(week)).rem_euclid(self.chain.len() as i64) as usize
    }

    /// Slot offset of an analyst who held `position` during `week`.
    pub fn offset_for(&self, position: usize, week: NaiveDate) -> usize {
        (position as i64 - self.step(week)).rem_euclid(self.chain.len() as i64) as usize
    }

    /// First week of the pattern occurrence that contains `week`.
    pub fn occurrence_start(&self, week: NaiveDate) -> NaiveDate {
        let (_, week_in_cycle) = cycle_position(week, self.anchor, self.cycle_weeks);
        let into_occurrence = i64::from(week_in_cycle % self.weeks_per_pattern);
        shift_days(week, -7 * into_occurrence)
    }

    /// First week of the rotation cycle that contains `week`.
    pub fn cycle_start(&self, week: NaiveDate) -> NaiveDate {
        let (_, week_in_cycle) = cycle_position(week, self.anchor, self.cycle_weeks);
        shift_days(week, -7 * i64::from(week_in_cycle))
    }

    /// Dates worked under pattern `position` in the week starting `week`.
    pub fn work_dates(&self, position: usize, week: NaiveDate) -> Vec<NaiveDate> {
        self.pattern(position)
            .days
            .iter()
            .map(|day| shift_days(week, i64::from(day.num_days_from_sunday())))
            .collect()
    }

    /// Whether pattern `position` works on `date`'s weekday.
    pub fn works_on(&self, position: usize, date: NaiveDate) -> bool {
        self.pattern(position).days.contains(&date.weekday())
    }

    /// Weeks between the anchor week and `week` (diagnostics only).
    pub fn weeks_from_anchor(&self, week: NaiveDate) -> i64 {
        weeks_since(self.anchor, week)
    }
}

fn resolve(pattern: &WorkPattern) -> Result<ResolvedPattern, PatternError> {
    let mut days: Vec<Weekday> = Vec::with_capacity(pattern.days.len());
    for name in &pattern.days {
        let day = parse_weekday(name).ok_or_else(|| PatternError::InvalidDay {
            pattern: pattern.name.clone(),
            day: name.clone(),
        })?;
        if !days.contains(&day) {
            days.push(day);
        }
    }
    if days.len() != PATTERN_DAYS || pattern.days.len() != PATTERN_DAYS {
        return Err(PatternError::WrongDayCount {
            pattern: pattern.name.clone(),
            count: days.len(),
        });
    }
    days.sort_by_key(|d| d.num_days_from_sunday());
    let has_weekend = days.iter().any(|d| matches!(d, Weekday::Sat | Weekday::Sun));
    Ok(ResolvedPattern {
        name: pattern.name.clone(),
        days,
        has_weekend,
    })
}

impl std::fmt::Display for ResolvedPattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let days: Vec<&str> = self.days.iter().map(|d| weekday_label(*d)).collect();
        write!(f, "{} [{}]", self.name, days.join(" "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(year: i32, month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, day).unwrap()
    }

    fn config() -> RotationConfig {
        RotationConfig {
            anchor_date: d(2026, 1, 4),
            ..RotationConfig::default()
        }
    }

    #[test]
    fn test_chain_starts_at_baseline() {
        let table = PatternTable::from_config(&config()).unwrap();
        assert_eq!(table.len(), 3);
        assert_eq!(table.pattern(0).name, "MON_FRI");
        assert_eq!(table.pattern(1).name, "SUN_THU");
        assert_eq!(table.pattern(2).name, "TUE_SAT");
        assert_eq!(table.weekend_positions(), vec![1, 2]);
        assert_eq!(table.weeks_per_pattern(), 1);
    }

    #[test]
    fn test_slot_pattern_is_pure_function_of_week() {
        let table = PatternTable::from_config(&config()).unwrap();
        // Slot 0 holds the baseline in the anchor week and advances weekly
        assert_eq!(table.slot_pattern(0, d(2026, 1, 4)), 0);
        assert_eq!(table.slot_pattern(0, d(2026, 1, 11)), 1);
        assert_eq!(table.slot_pattern(0, d(2026, 1, 18)), 2);
        assert_eq!(table.slot_pattern(0, d(2026, 1, 25)), 0);
        // Before the anchor
        assert_eq!(table.slot_pattern(0, d(2025, 12, 28)), 2);
        // offset_for inverts slot_pattern
        let week = d(2026, 3, 15);
        for position in 0..3 {
            let offset = table.offset_for(position, week);
            assert_eq!(table.slot_pattern(offset, week), position);
        }
    }

    #[test]
    fn test_multi_week_legs() {
        let mut cfg = config();
        cfg.cycle_weeks = 6;
        let table = PatternTable::from_config(&cfg).unwrap();
        assert_eq!(table.weeks_per_pattern(), 2);
        assert_eq!(table.slot_pattern(0, d(2026, 1, 4)), 0);
        assert_eq!(table.slot_pattern(0, d(2026, 1, 11)), 0);
        assert_eq!(table.slot_pattern(0, d(2026, 1, 18)), 1);
        assert_eq!(table.occurrence_start(d(2026, 1, 11)), d(2026, 1, 4));
        assert_eq!(table.cycle_start(d(2026, 2, 8)), d(2026, 1, 4));
    }

    #[test]
    fn test_work_dates_for_sun_thu() {
        let table = PatternTable::from_config(&config()).unwrap();
        let dates = table.work_dates(1, d(2026, 1, 25));
        assert_eq!(dates.first(), Some(&d(2026, 1, 25)));
        assert_eq!(dates.last(), Some(&d(2026, 1, 29)));
        assert!(table.works_on(2, d(2026, 1, 31)));
        assert!(!table.works_on(0, d(2026, 1, 31)));
    }

    #[test]
    fn test_rejects_broken_successor_cycle() {
        let mut cfg = config();
        cfg.patterns[2].successor = "SUN_THU".to_string();
        assert_eq!(
            PatternTable::from_config(&cfg).unwrap_err(),
            PatternError::BrokenCycle { total: 3 }
        );
    }

    #[test]
    fn test_rejects_bad_definitions() {
        let mut cfg = config();
        cfg.patterns[0].days.pop();
        assert!(matches!(
            PatternTable::from_config(&cfg),
            Err(PatternError::WrongDayCount { .. })
        ));

        let mut cfg = config();
        cfg.patterns[1].days[0] = "Someday".to_string();
        assert!(matches!(
            PatternTable::from_config(&cfg),
            Err(PatternError::InvalidDay { .. })
        ));

        let mut cfg = config();
        cfg.cycle_weeks = 4;
        assert!(matches!(
            PatternTable::from_config(&cfg),
            Err(PatternError::CycleLength { .. })
        ));

        let mut cfg = config();
        cfg.baseline_pattern = "WEEKENDS".to_string();
        assert!(matches!(
            PatternTable::from_config(&cfg),
            Err(PatternError::UnknownBaseline(_))
        ));
    }
}
