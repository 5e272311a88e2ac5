//! Candidate ordering for rotation moves and screener selection.
//!
//! Implements two orderings:
//! - `Screener`: highest score first, analyst id breaks ties
//! - `Rotation`: least-recently-rotated first (never rotated before any date), id breaks ties

use chrono::NaiveDate;
use std::cmp::Ordering;

/// Sort key for candidate ranking.
///
/// Implements `Ord` so candidates can be sorted (lower = picked first).
#[derive(Debug, Clone, PartialEq)]
pub enum RankKey {
    /// Screener: (-score, analyst_id)
    Screener { neg_score: f64, analyst_id: String },
    /// Rotation: (last weekend worked, analyst_id); `None` sorts first
    Rotation {
        last_rotated: Option<NaiveDate>,
        analyst_id: String,
    },
}

impl RankKey {
    pub fn screener(analyst_id: &str, score: f64) -> Self {
        Self::Screener {
            neg_score: -score,
            analyst_id: analyst_id.to_string(),
        }
    }

    pub fn rotation(analyst_id: &str, last_rotated: Option<NaiveDate>) -> Self {
        Self::Rotation {
            last_rotated,
            analyst_id: analyst_id.to_string(),
        }
    }

    /// Get the analyst_id from any key variant.
    pub fn analyst_id(&self) -> &str {
        match self {
            Self::Screener { analyst_id, .. } | Self::Rotation { analyst_id, .. } => analyst_id,
        }
    }
}

/// Compare f64 values for sorting, treating NaN as equal to everything.
pub fn cmp_f64(a: f64, b: f64) -> Ordering {
    a.partial_cmp(&b).unwrap_or(Ordering::Equal)
}

impl Eq for RankKey {}

impl Ord for RankKey {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (
                Self::Screener {
                    neg_score: s1,
                    analyst_id: id1,
                },
                Self::Screener {
                    neg_score: s2,
                    analyst_id: id2,
                },
            ) => cmp_f64(*s1, *s2).then(id1.cmp(id2)),

            (
                Self::Rotation {
                    last_rotated: r1,
                    analyst_id: id1,
                },
                Self::Rotation {
                    last_rotated: r2,
                    analyst_id: id2,
                },
            ) => r1.cmp(r2).then(id1.cmp(id2)),

            // Different variants should not be compared, but provide a fallback
            _ => Ordering::Equal,
        }
    }
}

impl PartialOrd for RankKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Sort keys and return analyst ids in pick order.
pub fn rank(mut keys: Vec<RankKey>) -> Vec<String> {
    keys.sort();
    keys.into_iter().map(|k| k.analyst_id().to_string()).collect()
}
