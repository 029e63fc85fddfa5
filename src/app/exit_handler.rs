//! Exit code logic for the datefetch process.
//!
//! Single responsibility: map a run summary to the process exit outcome.

use std::process::ExitCode;

use datefetch_core::RunSummary;

/// Process-level result of a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ProcessExit {
    /// Everything requested is done.
    Success,
    /// The run finished but some units failed or were left pending.
    Partial,
    /// The run halted (fatal error) or could not start.
    Failure,
}

impl ProcessExit {
    /// Numeric exit status. A partial run only fails the process under `strict`.
    pub(crate) fn code(self, strict: bool) -> u8 {
        match self {
            Self::Partial if strict => 2,
            Self::Success | Self::Partial => 0,
            Self::Failure => 1,
        }
    }

    pub(crate) fn exit_code(self, strict: bool) -> ExitCode {
        ExitCode::from(self.code(strict))
    }
}

/// Determines the process exit outcome from a finished run.
///
/// A run where every unit failed is still a partial result, not a process
/// failure; only a halt maps to [`ProcessExit::Failure`].
pub(crate) fn determine_exit_outcome(summary: &RunSummary) -> ProcessExit {
    if summary.unsuccessful() == 0 && !summary.interrupted {
        ProcessExit::Success
    } else {
        ProcessExit::Partial
    }
}
