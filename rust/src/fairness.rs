//! Fairness scoring over per-analyst duty counts.
//!
//! Three metrics are scored independently (total work days, screener days,
//! weekend days) with population standard deviation, Gini coefficient and
//! max/min ratio, then combined into a weighted overall score in [0, 1].

use chrono::NaiveDate;
use pyo3::prelude::*;
use rustc_hash::FxHashMap;
use std::collections::HashMap;

use crate::calendar::is_weekend;
use crate::config::FairnessConfig;
use crate::models::{Assignment, Severity};
use crate::ranking::cmp_f64;

pub const WORKLOAD: &str = "total_days";
pub const SCREENER: &str = "screener_days";
pub const WEEKEND: &str = "weekend_days";

/// Dispersion statistics for one metric.
#[pyclass]
#[derive(Clone, Debug, PartialEq)]
pub struct DispersionStats {
    #[pyo3(get)]
    pub metric: String,
    #[pyo3(get)]
    pub mean: f64,
    #[pyo3(get)]
    pub standard_deviation: f64,
    #[pyo3(get)]
    pub gini_coefficient: f64,
    /// `inf` when the minimum is zero and the maximum is not
    #[pyo3(get)]
    pub max_min_ratio: f64,
    #[pyo3(get)]
    pub max: f64,
    #[pyo3(get)]
    pub min: f64,
    /// 1.0 means perfectly equal
    #[pyo3(get)]
    pub score: f64,
}

#[pymethods]
impl DispersionStats {
    fn __repr__(&self) -> String {
        format!(
            "DispersionStats(metric={:?}, mean={:.2}, std={:.2}, gini={:.3}, score={:.3})",
            self.metric, self.mean, self.standard_deviation, self.gini_coefficient, self.score
        )
    }
}

/// A suggested correction, either for one analyst or for a whole metric.
#[pyclass]
#[derive(Clone, Debug, PartialEq)]
pub struct Recommendation {
    #[pyo3(get)]
    pub metric: String,
    /// None for metric-level recommendations
    #[pyo3(get)]
    pub analyst_id: Option<String>,
    #[pyo3(get)]
    pub severity: Severity,
    #[pyo3(get)]
    pub message: String,
}

#[pymethods]
impl Recommendation {
    fn __repr__(&self) -> String {
        format!(
            "Recommendation(metric={:?}, analyst_id={:?}, severity={}, message={:?})",
            self.metric,
            self.analyst_id,
            self.severity.as_str(),
            self.message
        )
    }
}

#[pyclass]
#[derive(Clone, Debug, PartialEq)]
pub struct FairnessMetrics {
    #[pyo3(get)]
    pub workload: DispersionStats,
    #[pyo3(get)]
    pub screener: DispersionStats,
    #[pyo3(get)]
    pub weekend: DispersionStats,
    #[pyo3(get)]
    pub overall_score: f64,
    #[pyo3(get)]
    pub recommendations: Vec<Recommendation>,
}

#[pymethods]
impl FairnessMetrics {
    fn __repr__(&self) -> String {
        format!(
            "FairnessMetrics(overall={:.3}, workload={:.3}, screener={:.3}, weekend={:.3}, recommendations={})",
            self.overall_score,
            self.workload.score,
            self.screener.score,
            self.weekend.score,
            self.recommendations.len()
        )
    }
}

/// Aligned per-analyst count vectors; index `i` of every vector is `analyst_ids[i]`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DutyCounts {
    pub analyst_ids: Vec<String>,
    pub total_days: Vec<f64>,
    pub screener_days: Vec<f64>,
    pub weekend_days: Vec<f64>,
}

impl DutyCounts {
    /// Build aligned vectors from per-metric maps. Analysts missing from a map count zero.
    pub fn from_maps(
        total_days: &HashMap<String, f64>,
        screener_days: &HashMap<String, f64>,
        weekend_days: &HashMap<String, f64>,
    ) -> Self {
        let mut analyst_ids: Vec<String> = total_days
            .keys()
            .chain(screener_days.keys())
            .chain(weekend_days.keys())
            .cloned()
            .collect();
        analyst_ids.sort();
        analyst_ids.dedup();

        let column = |map: &HashMap<String, f64>| -> Vec<f64> {
            analyst_ids
                .iter()
                .map(|id| map.get(id).copied().unwrap_or(0.0))
                .collect()
        };
        Self {
            total_days: column(total_days),
            screener_days: column(screener_days),
            weekend_days: column(weekend_days),
            analyst_ids,
        }
    }

    pub fn len(&self) -> usize {
        self.analyst_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.analyst_ids.is_empty()
    }
}

/// Count duties per roster analyst for assignments dated in `[start, end]`.
///
/// Every roster analyst gets an entry, so analysts without any duty show up
/// as zeros. Assignments for analysts outside the roster are ignored.
pub fn counts_from_assignments(
    roster: &[&str],
    assignments: &[&Assignment],
    start: NaiveDate,
    end: NaiveDate,
) -> DutyCounts {
    let mut analyst_ids: Vec<String> = roster.iter().map(|id| id.to_string()).collect();
    analyst_ids.sort();
    analyst_ids.dedup();

    let index: FxHashMap<&str, usize> = analyst_ids
        .iter()
        .enumerate()
        .map(|(i, id)| (id.as_str(), i))
        .collect();

    let n = analyst_ids.len();
    let mut counts = DutyCounts {
        total_days: vec![0.0; n],
        screener_days: vec![0.0; n],
        weekend_days: vec![0.0; n],
        analyst_ids: Vec::new(),
    };
    for a in assignments.iter().filter(|a| a.date >= start && a.date <= end) {
        let Some(&i) = index.get(a.analyst_id.as_str()) else {
            continue;
        };
        counts.total_days[i] += 1.0;
        if a.is_screener {
            counts.screener_days[i] += 1.0;
        }
        if is_weekend(a.date) {
            counts.weekend_days[i] += 1.0;
        }
    }
    counts.analyst_ids = analyst_ids;
    counts
}

/// Gini coefficient of non-negative values; 0 when the mean is 0.
pub fn gini(values: &[f64]) -> f64 {
    let n = values.len();
    let sum: f64 = values.iter().sum();
    if n == 0 || sum <= 0.0 {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| cmp_f64(*a, *b));
    // Equivalent to the pairwise mean absolute difference over 2 * mean
    let weighted: f64 = sorted
        .iter()
        .enumerate()
        .map(|(i, x)| (2.0 * (i as f64 + 1.0) - n as f64 - 1.0) * x)
        .sum();
    weighted / (n as f64 * sum)
}

/// Population statistics for one metric.
pub fn dispersion(metric: &str, values: &[f64]) -> DispersionStats {
    if values.is_empty() {
        return DispersionStats {
            metric: metric.to_string(),
            mean: 0.0,
            standard_deviation: 0.0,
            gini_coefficient: 0.0,
            max_min_ratio: 1.0,
            max: 0.0,
            min: 0.0,
            score: 1.0,
        };
    }

    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n;
    let standard_deviation = variance.sqrt();
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max_min_ratio = if max <= 0.0 {
        1.0
    } else if min <= 0.0 {
        f64::INFINITY
    } else {
        max / min
    };
    let gini_coefficient = gini(values);
    let cv = if mean > 0.0 {
        standard_deviation / mean
    } else {
        0.0
    };
    let score = 0.5 * (1.0 - gini_coefficient) + 0.5 / (1.0 + cv);

    DispersionStats {
        metric: metric.to_string(),
        mean,
        standard_deviation,
        gini_coefficient,
        max_min_ratio,
        max,
        min,
        score: score.clamp(0.0, 1.0),
    }
}

/// Scores duty distributions against a `FairnessConfig`.
pub struct FairnessEngine<'a> {
    config: &'a FairnessConfig,
}

impl<'a> FairnessEngine<'a> {
    pub fn new(config: &'a FairnessConfig) -> Self {
        Self { config }
    }

    pub fn score(&self, counts: &DutyCounts) -> FairnessMetrics {
        let workload = dispersion(WORKLOAD, &counts.total_days);
        let screener = dispersion(SCREENER, &counts.screener_days);
        let weekend = dispersion(WEEKEND, &counts.weekend_days);

        let mut recommendations: Vec<Recommendation> = Vec::new();
        recommendations.extend(self.recommend(
            &workload,
            &counts.analyst_ids,
            &counts.total_days,
            true,
        ));
        recommendations.extend(self.recommend(
            &screener,
            &counts.analyst_ids,
            &counts.screener_days,
            self.config.screener_required,
        ));
        recommendations.extend(self.recommend(
            &weekend,
            &counts.analyst_ids,
            &counts.weekend_days,
            self.config.weekend_required,
        ));

        let overall_score = self.overall(&workload, &screener, &weekend);
        FairnessMetrics {
            workload,
            screener,
            weekend,
            overall_score,
            recommendations,
        }
    }

    fn overall(
        &self,
        workload: &DispersionStats,
        screener: &DispersionStats,
        weekend: &DispersionStats,
    ) -> f64 {
        let weighted = [
            (self.config.workload_weight.max(0.0), workload.score),
            (self.config.screener_weight.max(0.0), screener.score),
            (self.config.weekend_weight.max(0.0), weekend.score),
        ];
        let total_weight: f64 = weighted.iter().map(|(w, _)| w).sum();
        let score = if total_weight > 0.0 {
            weighted.iter().map(|(w, s)| w * s).sum::<f64>() / total_weight
        } else {
            (workload.score + screener.score + weekend.score) / 3.0
        };
        score.clamp(0.0, 1.0)
    }

    fn recommend(
        &self,
        stats: &DispersionStats,
        analyst_ids: &[String],
        values: &[f64],
        required: bool,
    ) -> Vec<Recommendation> {
        let mut out: Vec<Recommendation> = Vec::new();
        let threshold = self.config.deviation_multiple * stats.standard_deviation;

        for (analyst_id, value) in analyst_ids.iter().zip(values) {
            if required && *value <= 0.0 {
                out.push(Recommendation {
                    metric: stats.metric.clone(),
                    analyst_id: Some(analyst_id.clone()),
                    severity: Severity::Critical,
                    message: format!("{} has no {} in this window", analyst_id, stats.metric),
                });
            } else if stats.standard_deviation > 0.0 && (value - stats.mean).abs() > threshold {
                let direction = if *value > stats.mean { "reduce" } else { "increase" };
                out.push(Recommendation {
                    metric: stats.metric.clone(),
                    analyst_id: Some(analyst_id.clone()),
                    severity: Severity::Medium,
                    message: format!(
                        "{} {} for {} ({} vs mean {:.2})",
                        direction, stats.metric, analyst_id, value, stats.mean
                    ),
                });
            }
        }

        if stats.max_min_ratio > self.config.max_min_ratio_threshold {
            out.push(Recommendation {
                metric: stats.metric.clone(),
                analyst_id: None,
                severity: Severity::High,
                message: format!(
                    "{} max/min ratio {} exceeds {}",
                    stats.metric, stats.max_min_ratio, self.config.max_min_ratio_threshold
                ),
            });
        }
        out
    }
}
