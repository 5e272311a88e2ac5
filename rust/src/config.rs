//! Configuration types for the shift engine.
//!
//! Every table the engine consults (patterns, penalty weights, fairness
//! thresholds) lives here and is passed in per call.

use chrono::NaiveDate;
use pyo3::prelude::*;

use crate::rotation::{default_patterns, WorkPattern};

/// Optimization strategy tags accepted by the engine.
///
/// The tag is informational: every strategy runs the deterministic greedy path.
pub const KNOWN_STRATEGIES: [&str; 4] = ["deterministic", "greedy", "balanced", "fairness_first"];

/// Rotation pattern table and cycle anchoring.
#[pyclass]
#[derive(Clone, Debug)]
pub struct RotationConfig {
    /// Reference date; cycle boundaries are whole multiples of `cycle_weeks` from its week
    #[pyo3(get, set)]
    pub anchor_date: NaiveDate,
    /// Length of one full rotation in weeks (must be a multiple of the pattern count)
    #[pyo3(get, set)]
    pub cycle_weeks: u32,
    /// Weekly work patterns with successor links
    #[pyo3(get, set)]
    pub patterns: Vec<WorkPattern>,
    /// Pattern given to analysts with no rotation history
    #[pyo3(get, set)]
    pub baseline_pattern: String,
    /// Continuity lookback in weeks (defaults to `cycle_weeks`)
    #[pyo3(get, set)]
    pub lookback_weeks: Option<u32>,
}

impl Default for RotationConfig {
    fn default() -> Self {
        Self {
            // Sunday
            anchor_date: NaiveDate::from_ymd_opt(2025, 1, 5).unwrap_or(NaiveDate::MIN),
            cycle_weeks: 3,
            patterns: default_patterns(),
            baseline_pattern: "MON_FRI".to_string(),
            lookback_weeks: None,
        }
    }
}

impl RotationConfig {
    pub fn effective_lookback_weeks(&self) -> u32 {
        self.lookback_weeks.unwrap_or(self.cycle_weeks)
    }
}

#[pymethods]
impl RotationConfig {
    #[new]
    #[pyo3(signature = (
        anchor_date=None,
        cycle_weeks=None,
        patterns=None,
        baseline_pattern=None,
        lookback_weeks=None
    ))]
    fn new(
        anchor_date: Option<NaiveDate>,
        cycle_weeks: Option<u32>,
        patterns: Option<Vec<WorkPattern>>,
        baseline_pattern: Option<String>,
        lookback_weeks: Option<u32>,
    ) -> Self {
        let defaults = Self::default();
        Self {
            anchor_date: anchor_date.unwrap_or(defaults.anchor_date),
            cycle_weeks: cycle_weeks.unwrap_or(defaults.cycle_weeks),
            patterns: patterns.unwrap_or(defaults.patterns),
            baseline_pattern: baseline_pattern.unwrap_or(defaults.baseline_pattern),
            lookback_weeks,
        }
    }

    fn __repr__(&self) -> String {
        format!(
            "RotationConfig(anchor_date={}, cycle_weeks={}, patterns={}, baseline={:?})",
            self.anchor_date,
            self.cycle_weeks,
            self.patterns.len(),
            self.baseline_pattern
        )
    }
}

/// Penalty weights for screener selection.
///
/// Only the relative ordering of the resulting scores matters.
#[pyclass]
#[derive(Clone, Debug)]
pub struct ScreenerWeights {
    /// Starting score for every eligible candidate
    #[pyo3(get, set)]
    pub baseline: f64,
    /// Days looked back when counting recent screener duty
    #[pyo3(get, set)]
    pub recent_window_days: u32,
    /// Deducted per screener day inside the recent window
    #[pyo3(get, set)]
    pub recent_penalty: f64,
    /// Deducted when the candidate screened the previous day
    #[pyo3(get, set)]
    pub consecutive_penalty: f64,
    /// Deducted when the candidate is on the active weekend leg this week
    #[pyo3(get, set)]
    pub active_weekend_penalty: f64,
    /// Deducted when the candidate's weekend leg starts next week
    #[pyo3(get, set)]
    pub standby_weekend_penalty: f64,
}

impl Default for ScreenerWeights {
    fn default() -> Self {
        Self {
            baseline: 100.0,
            recent_window_days: 7,
            recent_penalty: 10.0,
            consecutive_penalty: 50.0,
            active_weekend_penalty: 40.0,
            standby_weekend_penalty: 15.0,
        }
    }
}

#[pymethods]
impl ScreenerWeights {
    #[new]
    #[pyo3(signature = (
        baseline=None,
        recent_window_days=None,
        recent_penalty=None,
        consecutive_penalty=None,
        active_weekend_penalty=None,
        standby_weekend_penalty=None
    ))]
    fn new(
        baseline: Option<f64>,
        recent_window_days: Option<u32>,
        recent_penalty: Option<f64>,
        consecutive_penalty: Option<f64>,
        active_weekend_penalty: Option<f64>,
        standby_weekend_penalty: Option<f64>,
    ) -> Self {
        let defaults = Self::default();
        Self {
            baseline: baseline.unwrap_or(defaults.baseline),
            recent_window_days: recent_window_days.unwrap_or(defaults.recent_window_days),
            recent_penalty: recent_penalty.unwrap_or(defaults.recent_penalty),
            consecutive_penalty: consecutive_penalty.unwrap_or(defaults.consecutive_penalty),
            active_weekend_penalty: active_weekend_penalty
                .unwrap_or(defaults.active_weekend_penalty),
            standby_weekend_penalty: standby_weekend_penalty
                .unwrap_or(defaults.standby_weekend_penalty),
        }
    }

    fn __repr__(&self) -> String {
        format!(
            "ScreenerWeights(baseline={}, recent={}, consecutive={}, active={}, standby={})",
            self.baseline,
            self.recent_penalty,
            self.consecutive_penalty,
            self.active_weekend_penalty,
            self.standby_weekend_penalty
        )
    }
}

/// Thresholds and weights for fairness scoring.
#[pyclass]
#[derive(Clone, Debug)]
pub struct FairnessConfig {
    /// Flag analysts deviating from the mean by more than this many standard deviations
    #[pyo3(get, set)]
    pub deviation_multiple: f64,
    /// Flag a metric whose max/min ratio exceeds this value
    #[pyo3(get, set)]
    pub max_min_ratio_threshold: f64,
    /// Weight of total work days in the overall score
    #[pyo3(get, set)]
    pub workload_weight: f64,
    /// Weight of screener days in the overall score
    #[pyo3(get, set)]
    pub screener_weight: f64,
    /// Weight of weekend days in the overall score
    #[pyo3(get, set)]
    pub weekend_weight: f64,
    /// Overall score below this value is reported as a fairness violation
    #[pyo3(get, set)]
    pub min_acceptable_score: f64,
    /// Whether every analyst is expected to carry screener duty in the window
    #[pyo3(get, set)]
    pub screener_required: bool,
    /// Whether every analyst is expected to carry weekend duty in the window
    #[pyo3(get, set)]
    pub weekend_required: bool,
}

impl Default for FairnessConfig {
    fn default() -> Self {
        Self {
            deviation_multiple: 1.5,
            max_min_ratio_threshold: 2.0,
            workload_weight: 0.5,
            screener_weight: 0.25,
            weekend_weight: 0.25,
            min_acceptable_score: 0.7,
            screener_required: true,
            weekend_required: true,
        }
    }
}

#[pymethods]
impl FairnessConfig {
    #[new]
    #[pyo3(signature = (
        deviation_multiple=None,
        max_min_ratio_threshold=None,
        workload_weight=None,
        screener_weight=None,
        weekend_weight=None,
        min_acceptable_score=None,
        screener_required=None,
        weekend_required=None
    ))]
    #[allow(clippy::too_many_arguments)]
    fn new(
        deviation_multiple: Option<f64>,
        max_min_ratio_threshold: Option<f64>,
        workload_weight: Option<f64>,
        screener_weight: Option<f64>,
        weekend_weight: Option<f64>,
        min_acceptable_score: Option<f64>,
        screener_required: Option<bool>,
        weekend_required: Option<bool>,
    ) -> Self {
        let defaults = Self::default();
        Self {
            deviation_multiple: deviation_multiple.unwrap_or(defaults.deviation_multiple),
            max_min_ratio_threshold: max_min_ratio_threshold
                .unwrap_or(defaults.max_min_ratio_threshold),
            workload_weight: workload_weight.unwrap_or(defaults.workload_weight),
            screener_weight: screener_weight.unwrap_or(defaults.screener_weight),
            weekend_weight: weekend_weight.unwrap_or(defaults.weekend_weight),
            min_acceptable_score: min_acceptable_score.unwrap_or(defaults.min_acceptable_score),
            screener_required: screener_required.unwrap_or(defaults.screener_required),
            weekend_required: weekend_required.unwrap_or(defaults.weekend_required),
        }
    }

    fn __repr__(&self) -> String {
        format!(
            "FairnessConfig(deviation_multiple={}, max_min_ratio_threshold={}, min_acceptable_score={})",
            self.deviation_multiple, self.max_min_ratio_threshold, self.min_acceptable_score
        )
    }
}

/// Top-level configuration for generation and swap validation.
#[pyclass]
#[derive(Clone, Debug)]
pub struct EngineConfig {
    /// Identity of the rotation algorithm; scopes continuity and rotation state
    #[pyo3(get, set)]
    pub algorithm_id: String,
    /// Optimization strategy tag (see `KNOWN_STRATEGIES`)
    #[pyo3(get, set)]
    pub strategy: String,
    /// Weight of the fairness score in the decision score
    #[pyo3(get, set)]
    pub fairness_weight: f64,
    /// Weight of coverage in the decision score
    #[pyo3(get, set)]
    pub efficiency_weight: f64,
    /// Weight of constraint cleanliness in the decision score
    #[pyo3(get, set)]
    pub constraint_weight: f64,
    /// Longest allowed run of consecutive work days
    #[pyo3(get, set)]
    pub max_consecutive_days: u32,
    /// Work days per week above which a week is unbalanced
    #[pyo3(get, set)]
    pub max_work_days_per_week: u32,
    /// Minimum analysts working on any date in the range
    #[pyo3(get, set)]
    pub min_staff_per_day: u32,
    /// Screener slots per qualifying day
    #[pyo3(get, set)]
    pub screeners_per_day: u32,
    /// Weekday names that require a screener
    #[pyo3(get, set)]
    pub screener_days: Vec<String>,
    /// Skill tag a screener must carry (None = anyone working)
    #[pyo3(get, set)]
    pub screener_skill: Option<String>,
    /// Propose an EARNED comp-off day for each generated weekend work day
    #[pyo3(get, set)]
    pub comp_off_on_weekend: bool,
    /// Keep proposals that replace a different existing assignment
    #[pyo3(get, set)]
    pub allow_overwrite: bool,
    /// Verbosity level: 0=silent, 1=changes, 2=checks, 3=debug.
    #[pyo3(get, set)]
    pub verbosity: u8,
    #[pyo3(get, set)]
    pub rotation: RotationConfig,
    #[pyo3(get, set)]
    pub screener_weights: ScreenerWeights,
    #[pyo3(get, set)]
    pub fairness: FairnessConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            algorithm_id: "weekend_rotation".to_string(),
            strategy: "deterministic".to_string(),
            fairness_weight: 0.4,
            efficiency_weight: 0.3,
            constraint_weight: 0.3,
            max_consecutive_days: 5,
            max_work_days_per_week: 5,
            min_staff_per_day: 1,
            screeners_per_day: 1,
            screener_days: ["Mon", "Tue", "Wed", "Thu", "Fri"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            screener_skill: None,
            comp_off_on_weekend: true,
            allow_overwrite: false,
            verbosity: 0,
            rotation: RotationConfig::default(),
            screener_weights: ScreenerWeights::default(),
            fairness: FairnessConfig::default(),
        }
    }
}

#[pymethods]
impl EngineConfig {
    #[new]
    #[pyo3(signature = (
        algorithm_id=None,
        strategy=None,
        fairness_weight=None,
        efficiency_weight=None,
        constraint_weight=None,
        max_consecutive_days=None,
        max_work_days_per_week=None,
        min_staff_per_day=None,
        screeners_per_day=None,
        screener_days=None,
        screener_skill=None,
        comp_off_on_weekend=None,
        allow_overwrite=None,
        verbosity=0,
        rotation=None,
        screener_weights=None,
        fairness=None
    ))]
    #[allow(clippy::too_many_arguments)]
    fn new(
        algorithm_id: Option<String>,
        strategy: Option<String>,
        fairness_weight: Option<f64>,
        efficiency_weight: Option<f64>,
        constraint_weight: Option<f64>,
        max_consecutive_days: Option<u32>,
        max_work_days_per_week: Option<u32>,
        min_staff_per_day: Option<u32>,
        screeners_per_day: Option<u32>,
        screener_days: Option<Vec<String>>,
        screener_skill: Option<String>,
        comp_off_on_weekend: Option<bool>,
        allow_overwrite: Option<bool>,
        verbosity: u8,
        rotation: Option<RotationConfig>,
        screener_weights: Option<ScreenerWeights>,
        fairness: Option<FairnessConfig>,
    ) -> Self {
        let defaults = Self::default();
        Self {
            algorithm_id: algorithm_id.unwrap_or(defaults.algorithm_id),
            strategy: strategy.unwrap_or(defaults.strategy),
            fairness_weight: fairness_weight.unwrap_or(defaults.fairness_weight),
            efficiency_weight: efficiency_weight.unwrap_or(defaults.efficiency_weight),
            constraint_weight: constraint_weight.unwrap_or(defaults.constraint_weight),
            max_consecutive_days: max_consecutive_days.unwrap_or(defaults.max_consecutive_days),
            max_work_days_per_week: max_work_days_per_week
                .unwrap_or(defaults.max_work_days_per_week),
            min_staff_per_day: min_staff_per_day.unwrap_or(defaults.min_staff_per_day),
            screeners_per_day: screeners_per_day.unwrap_or(defaults.screeners_per_day),
            screener_days: screener_days.unwrap_or(defaults.screener_days),
            screener_skill,
            comp_off_on_weekend: comp_off_on_weekend.unwrap_or(defaults.comp_off_on_weekend),
            allow_overwrite: allow_overwrite.unwrap_or(defaults.allow_overwrite),
            verbosity,
            rotation: rotation.unwrap_or(defaults.rotation),
            screener_weights: screener_weights.unwrap_or(defaults.screener_weights),
            fairness: fairness.unwrap_or(defaults.fairness),
        }
    }

    fn __repr__(&self) -> String {
        format!(
            "EngineConfig(algorithm_id={:?}, strategy={:?}, max_consecutive_days={}, screeners_per_day={})",
            self.algorithm_id, self.strategy, self.max_consecutive_days, self.screeners_per_day
        )
    }
}
