//! Orchestrator error types.

use thiserror::Error;

use super::RunSummary;
use crate::progress::StoreError;
use crate::unit::RangeError;

/// Errors that end a run early.
///
/// Per-unit failures never show up here; they are recorded as FAILED in the
/// progress store and counted in the [`RunSummary`].
#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// Start bound lies after the end bound.
    #[error(transparent)]
    InvalidRange(#[from] RangeError),

    /// A configuration value is out of range.
    #[error("invalid configuration: {reason}\n  Suggestion: Adjust the value and rerun.")]
    InvalidConfig {
        /// What was wrong.
        reason: String,
    },

    /// The downloader reported a session-level failure; the run halted.
    ///
    /// `unit` is the unit that was in progress and is the resume point.
    #[error("run halted at unit {unit}: {message}")]
    Fatal {
        /// Canonical form of the unit in progress.
        unit: String,
        /// Downloader message including its suggestion.
        message: String,
        /// Counts up to the halt.
        summary: RunSummary,
    },

    /// The progress store failed to load or persist.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Semaphore was closed unexpectedly.
    #[error("semaphore closed unexpectedly")]
    SemaphoreClosed,
}

impl OrchestratorError {
    /// Creates an invalid configuration error.
    pub fn invalid_config(reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            reason: reason.into(),
        }
    }

    /// Returns the summary attached to a fatal halt.
    #[must_use]
    pub fn summary(&self) -> Option<&RunSummary> {
        match self {
            Self::Fatal { summary, .. } => Some(summary),
            _ => None,
        }
    }
}
