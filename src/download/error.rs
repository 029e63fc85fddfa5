//! Error types for the download module.
//!
//! A downloader reports every failure as one of four classes. The class, not
//! the message, decides what the orchestrator does next:
//!
//! | Variant | Orchestrator reaction |
//! |---------|-----------------------|
//! | [`DownloadError::Transient`] | retry the unit while budget remains |
//! | [`DownloadError::RateLimited`] | penalize the rate limiter, then retry like transient |
//! | [`DownloadError::Permanent`] | mark the unit FAILED, continue with the next unit |
//! | [`DownloadError::Fatal`] | halt the whole run |

use std::time::Duration;

use thiserror::Error;

/// Classified failure of a single download attempt.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DownloadError {
    /// Failure that may succeed on retry (network error, timeout, 5xx).
    #[error("transient failure: {message}")]
    Transient {
        /// Human-readable description.
        message: String,
        /// Server-provided hint for when to try again.
        retry_after: Option<Duration>,
    },

    /// The remote service rejected the request for exceeding its rate limit.
    #[error("rate limited: {message}")]
    RateLimited {
        /// Human-readable description.
        message: String,
        /// Parsed `Retry-After` value, if the server sent one.
        retry_after: Option<Duration>,
    },

    /// Failure specific to this unit that retrying will not fix (e.g. HTTP 404).
    #[error("permanent failure: {message}")]
    Permanent {
        /// Human-readable description.
        message: String,
    },

    /// The session itself is broken (bad configuration, rejected credentials).
    #[error("fatal error: {message}\n  Suggestion: {suggestion}")]
    Fatal {
        /// Human-readable description.
        message: String,
        /// Operator-facing hint.
        suggestion: &'static str,
    },
}

impl DownloadError {
    /// Creates a transient error without a retry hint.
    pub fn transient(message: impl Into<String>) -> Self {
        Self::Transient {
            message: message.into(),
            retry_after: None,
        }
    }

    /// Creates a transient error carrying a server retry hint.
    pub fn transient_with_retry_after(
        message: impl Into<String>,
        retry_after: Option<Duration>,
    ) -> Self {
        Self::Transient {
            message: message.into(),
            retry_after,
        }
    }

    /// Creates a rate-limit rejection.
    pub fn rate_limited(message: impl Into<String>, retry_after: Option<Duration>) -> Self {
        Self::RateLimited {
            message: message.into(),
            retry_after,
        }
    }

    /// Creates a per-unit permanent failure.
    pub fn permanent(message: impl Into<String>) -> Self {
        Self::Permanent {
            message: message.into(),
        }
    }

    /// Creates a run-halting error with the generic configuration suggestion.
    pub fn fatal(message: impl Into<String>) -> Self {
        Self::Fatal {
            message: message.into(),
            suggestion: "Fix the configuration and rerun; completed units will be skipped.",
        }
    }

    /// Creates a run-halting authentication error.
    ///
    /// 407 points at proxy settings, everything else at site credentials.
    pub fn auth_required(url: &str, status: u16) -> Self {
        let suggestion = if status == 407 {
            "Configure your HTTP proxy settings or check proxy credentials."
        } else {
            "Check the credentials or access rights for this source, then rerun."
        };
        Self::Fatal {
            message: format!("authentication required (HTTP {status}) for {url}"),
            suggestion,
        }
    }

    /// Creates the error reported when a download exceeds its time budget.
    pub fn timed_out(limit: Duration) -> Self {
        Self::transient(format!("download timed out after {}s", limit.as_secs_f64()))
    }

    /// Returns true when the orchestrator may retry this unit.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient { .. } | Self::RateLimited { .. })
    }

    /// Returns true when the error must halt the run.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Fatal { .. })
    }

    /// Returns the server retry hint, if any.
    #[must_use]
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::Transient { retry_after, .. } | Self::RateLimited { retry_after, .. } => {
                *retry_after
            }
            Self::Permanent { .. } | Self::Fatal { .. } => None,
        }
    }

    /// Returns the bare message without the class prefix.
    #[must_use]
    pub fn message(&self) -> &str {
        match self {
            Self::Transient { message, .. }
            | Self::RateLimited { message, .. }
            | Self::Permanent { message }
            | Self::Fatal { message, .. } => message,
        }
    }
}
