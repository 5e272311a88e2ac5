//! Verbosity-gated stderr logging for schedule generation and swaps.
//!
//! `EngineConfig.verbosity` picks how much of a run is narrated:
//!
//! | Level | Constant | What gets printed |
//! |---|---|---|
//! | 0 | `VERBOSITY_SILENT` | nothing; results carry all conflicts |
//! | 1 | `VERBOSITY_CHANGES` | run header, new analysts placed, slot rebalances, dropped proposals, screener picks, forced swaps, failed writes, commits |
//! | 2 | `VERBOSITY_CHECKS` | each analyst's weekly pattern, every screener candidate score, per-side swap timeline checks, run totals |
//! | 3 | `VERBOSITY_DEBUG` | continuity classification per analyst, the rotation cursor written for the next run |
//!
//! Disabled levels cost one integer comparison; format arguments are not evaluated.

pub const VERBOSITY_SILENT: u8 = 0;
pub const VERBOSITY_CHANGES: u8 = 1;
pub const VERBOSITY_CHECKS: u8 = 2;
pub const VERBOSITY_DEBUG: u8 = 3;

/// Decisions that alter the schedule or its persisted state.
#[macro_export]
macro_rules! log_changes {
    ($verbosity:expr, $($arg:tt)*) => {
        if $verbosity >= $crate::logging::VERBOSITY_CHANGES {
            eprintln!($($arg)*);
        }
    };
}

/// The evidence behind those decisions: scores, patterns, rule checks.
#[macro_export]
macro_rules! log_checks {
    ($verbosity:expr, $($arg:tt)*) => {
        if $verbosity >= $crate::logging::VERBOSITY_CHECKS {
            eprintln!($($arg)*);
        }
    };
}

/// Rotation internals.
#[macro_export]
macro_rules! log_debug {
    ($verbosity:expr, $($arg:tt)*) => {
        if $verbosity >= $crate::logging::VERBOSITY_DEBUG {
            eprintln!($($arg)*);
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn counted(calls: &Cell<u32>) -> u32 {
        calls.set(calls.get() + 1);
        calls.get()
    }

    #[test]
    fn test_disabled_levels_skip_argument_evaluation() {
        let calls = Cell::new(0);
        log_changes!(VERBOSITY_SILENT, "pick {}", counted(&calls));
        log_checks!(VERBOSITY_CHANGES, "score {}", counted(&calls));
        log_debug!(VERBOSITY_CHECKS, "cursor {}", counted(&calls));
        assert_eq!(calls.get(), 0);
    }

    #[test]
    fn test_enabled_level_includes_lower_ones() {
        let calls = Cell::new(0);
        log_changes!(VERBOSITY_DEBUG, "pick {}", counted(&calls));
        log_checks!(VERBOSITY_DEBUG, "score {}", counted(&calls));
        log_debug!(VERBOSITY_DEBUG, "cursor {}", counted(&calls));
        assert_eq!(calls.get(), 3);
    }
}
