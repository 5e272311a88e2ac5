//! Generation orchestration.
//!
//! `core` turns a snapshot into a `GenerationResult`, `apply` writes a result
//! through an assignment sink, and `planner` wires both to the stores.

mod apply;
mod core;
mod planner;

pub use apply::apply_decision;
pub use core::{generate, EngineError, ScheduleGenerator};
pub use planner::{PlannedRun, Planner};
