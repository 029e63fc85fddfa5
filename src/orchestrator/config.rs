//! Orchestrator configuration.

use std::time::Duration;

use crate::download::{DEFAULT_MAX_RETRIES, RetryPolicy};

use super::OrchestratorError;

/// Default per-attempt download time budget.
pub const DEFAULT_DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(300);

/// Default number of units in flight.
pub const DEFAULT_CONCURRENCY: usize = 1;

/// Maximum allowed concurrency value.
pub const MAX_CONCURRENCY: usize = 100;

/// Explicit run settings passed into [`super::Orchestrator::new`].
///
/// # Default Values
///
/// - `max_retries`: 3 attempts per unit
/// - `retry_policy`: exponential from 60 seconds
/// - `validate`: on
/// - `download_timeout`: 300 seconds
/// - `concurrency`: 1 (strictly sequential)
#[derive(Debug, Clone, PartialEq)]
pub struct OrchestratorConfig {
    /// Attempt budget per unit; counts the first attempt.
    pub max_retries: u32,
    /// Delay schedule between attempts of the same unit.
    pub retry_policy: RetryPolicy,
    /// Whether artifacts go through the validator before COMPLETED.
    pub validate: bool,
    /// Upper bound on a single downloader call.
    pub download_timeout: Duration,
    /// Units processed at the same time.
    pub concurrency: usize,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            retry_policy: RetryPolicy::default(),
            validate: true,
            download_timeout: DEFAULT_DOWNLOAD_TIMEOUT,
            concurrency: DEFAULT_CONCURRENCY,
        }
    }
}

impl OrchestratorConfig {
    #[must_use]
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    #[must_use]
    pub fn with_retry_policy(mut self, retry_policy: RetryPolicy) -> Self {
        self.retry_policy = retry_policy;
        self
    }

    #[must_use]
    pub fn with_validation(mut self, validate: bool) -> Self {
        self.validate = validate;
        self
    }

    #[must_use]
    pub fn with_download_timeout(mut self, download_timeout: Duration) -> Self {
        self.download_timeout = download_timeout;
        self
    }

    #[must_use]
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    /// Checks value ranges.
    ///
    /// # Errors
    ///
    /// Returns [`OrchestratorError::InvalidConfig`] naming the first bad field.
    pub fn validate(&self) -> Result<(), OrchestratorError> {
        if self.max_retries == 0 {
            return Err(OrchestratorError::invalid_config(
                "max_retries must be at least 1",
            ));
        }
        if !(1..=MAX_CONCURRENCY).contains(&self.concurrency) {
            return Err(OrchestratorError::invalid_config(format!(
                "concurrency {} must be between 1 and {MAX_CONCURRENCY}",
                self.concurrency
            )));
        }
        if self.download_timeout.is_zero() {
            return Err(OrchestratorError::invalid_config(
                "download_timeout must be greater than zero",
            ));
        }
        Ok(())
    }
}
