//! Weekly work-pattern rotation.
//!
//! `pattern` validates the configured pattern chain and maps weeks to chain
//! steps, `state` holds the persisted cursor types, and `engine` turns a roster
//! plus prior state into regular-shift proposals.

mod engine;
mod pattern;
mod state;

pub use engine::{classify_continuity, ContinuityStatus, RotationEngine, RotationPlan};
pub use pattern::{
    default_patterns, PatternError, PatternTable, ResolvedPattern, WorkPattern, PATTERN_DAYS,
};
pub use state::{PatternContinuity, RotationState};
