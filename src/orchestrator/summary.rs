//! Run counters.

use std::sync::atomic::{AtomicUsize, Ordering};

use serde::Serialize;

/// Outcome counts of one `run` call.
///
/// `completed + failed + skipped + abandoned + pending == total` always holds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    /// Units in the requested range.
    pub total: usize,
    /// Units that reached COMPLETED during this run.
    pub completed: usize,
    /// Units that ended FAILED during this run.
    pub failed: usize,
    /// Units already COMPLETED before this run (resume only).
    pub skipped: usize,
    /// Units not attempted because their lifetime attempt budget was spent.
    pub abandoned: usize,
    /// Units never finalized (stop signal, halt, or interrupted retry wait).
    pub pending: usize,
    /// Retry attempts made, not counting first attempts.
    pub retried: usize,
    /// True when a stop signal cut the run short.
    pub interrupted: bool,
}

impl RunSummary {
    /// Units that ended without an artifact.
    #[must_use]
    pub fn unsuccessful(&self) -> usize {
        self.failed + self.abandoned
    }

    /// Returns true when every unit in range is COMPLETED.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.completed + self.skipped == self.total
    }
}

/// Lock-free counters shared by unit tasks.
#[derive(Debug, Default)]
pub(crate) struct RunStats {
    completed: AtomicUsize,
    failed: AtomicUsize,
    skipped: AtomicUsize,
    abandoned: AtomicUsize,
    retried: AtomicUsize,
}

impl RunStats {
    pub(crate) fn increment_completed(&self) {
        self.completed.fetch_add(1, Ordering::SeqCst);
    }

    pub(crate) fn increment_failed(&self) {
        self.failed.fetch_add(1, Ordering::SeqCst);
    }

    pub(crate) fn increment_skipped(&self) {
        self.skipped.fetch_add(1, Ordering::SeqCst);
    }

    pub(crate) fn increment_abandoned(&self) {
        self.abandoned.fetch_add(1, Ordering::SeqCst);
    }

    pub(crate) fn increment_retried(&self) {
        self.retried.fetch_add(1, Ordering::SeqCst);
    }

    pub(crate) fn summary(&self, total: usize, interrupted: bool) -> RunSummary {
        let completed = self.completed.load(Ordering::SeqCst);
        let failed = self.failed.load(Ordering::SeqCst);
        let skipped = self.skipped.load(Ordering::SeqCst);
        let abandoned = self.abandoned.load(Ordering::SeqCst);
        RunSummary {
            total,
            completed,
            failed,
            skipped,
            abandoned,
            pending: total.saturating_sub(completed + failed + skipped + abandoned),
            retried: self.retried.load(Ordering::SeqCst),
            interrupted,
        }
    }
}
