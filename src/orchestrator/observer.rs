//! Run event hooks for progress reporting.

use std::path::PathBuf;
use std::time::Duration;

use super::RunSummary;

/// How a unit left the run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnitOutcome {
    /// Artifact stored and recorded.
    Completed {
        /// Artifact location.
        path: PathBuf,
    },
    /// Permanent error or retry budget exhausted in this run.
    Failed {
        /// Last error message.
        error: String,
    },
    /// Lifetime budget was already spent; no attempt made.
    Abandoned {
        /// Lifetime attempts on record.
        attempts: u32,
    },
}

/// Receives run events. Every method defaults to a no-op.
///
/// Units are passed in canonical string form. Calls may arrive from several
/// tasks at once when concurrency is above 1.
pub trait RunObserver: Send + Sync {
    /// The range was expanded into `total` units.
    fn run_started(&self, _total: usize) {}

    /// The unit was COMPLETED before this run and is skipped.
    fn unit_skipped(&self, _unit: &str) {}

    /// An attempt began; `attempt` is the lifetime attempt number.
    fn unit_started(&self, _unit: &str, _attempt: u32) {}

    /// The attempt failed and another follows after `delay`.
    fn unit_retrying(&self, _unit: &str, _attempt: u32, _delay: Duration, _error: &str) {}

    /// The unit reached a final state for this run.
    fn unit_finished(&self, _unit: &str, _outcome: &UnitOutcome) {}

    /// The run returned normally.
    fn run_finished(&self, _summary: &RunSummary) {}
}

/// Observer that ignores every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl RunObserver for NoopObserver {}
