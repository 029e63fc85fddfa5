//! Retry delay policy for transient download failures.
//!
//! The orchestrator decides *whether* to retry (attempt budget, error class);
//! [`RetryPolicy`] only decides *how long* to wait before the next attempt.
//! The growth curve is configurable because sources differ in how quickly
//! they recover:
//!
//! | Backoff | Delay before retry `n` (1-indexed) |
//! |---------|------------------------------------|
//! | [`Backoff::Fixed`] | `base` |
//! | [`Backoff::Linear`] | `base * n` |
//! | [`Backoff::Exponential`] | `base * multiplier^(n-1)` |
//!
//! Every delay is capped at `max_delay`; optional jitter adds up to 500ms.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use datefetch_core::download::RetryPolicy;
//!
//! let policy = RetryPolicy::linear(Duration::from_secs(10));
//! assert_eq!(policy.delay_for(1), Duration::from_secs(10));
//! assert_eq!(policy.delay_for(3), Duration::from_secs(30));
//! ```

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use rand::Rng;
use tracing::{debug, instrument};

/// Default maximum download attempts per unit.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Default delay before the first retry (60 seconds).
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(60);

/// Default cap for grown delays (10 minutes).
const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(600);

/// Default exponential multiplier (doubles each retry).
const DEFAULT_BACKOFF_MULTIPLIER: f64 = 2.0;

/// Maximum jitter added to delays (500ms).
const MAX_JITTER: Duration = Duration::from_millis(500);

/// Growth curve of retry delays.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Backoff {
    /// Same delay before every retry.
    Fixed,
    /// Delay grows by `base` each retry.
    Linear,
    /// Delay is multiplied each retry.
    Exponential {
        /// Factor applied per retry (values below 1.0 act as 1.0).
        multiplier: f64,
    },
}

impl Backoff {
    /// Returns the stable label used in config files and CLI flags.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Fixed => "fixed",
            Self::Linear => "linear",
            Self::Exponential { .. } => "exponential",
        }
    }
}

impl fmt::Display for Backoff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Backoff {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "fixed" => Ok(Self::Fixed),
            "linear" => Ok(Self::Linear),
            "exponential" => Ok(Self::Exponential {
                multiplier: DEFAULT_BACKOFF_MULTIPLIER,
            }),
            _ => Err(format!(
                "invalid backoff: {s} (expected fixed, linear or exponential)"
            )),
        }
    }
}

/// Delay schedule between attempts of the same unit.
///
/// # Default Values
///
/// - `backoff`: exponential, multiplier 2.0
/// - `base_delay`: 60 seconds
/// - `max_delay`: 10 minutes
/// - `jitter`: off
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    backoff: Backoff,
    base_delay: Duration,
    max_delay: Duration,
    jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(
            Backoff::Exponential {
                multiplier: DEFAULT_BACKOFF_MULTIPLIER,
            },
            DEFAULT_RETRY_DELAY,
        )
    }
}

impl RetryPolicy {
    /// Creates a policy with the default cap and no jitter.
    #[must_use]
    pub fn new(backoff: Backoff, base_delay: Duration) -> Self {
        Self {
            backoff,
            base_delay,
            max_delay: DEFAULT_MAX_DELAY,
            jitter: false,
        }
    }

    /// Constant delay between retries.
    #[must_use]
    pub fn fixed(base_delay: Duration) -> Self {
        Self::new(Backoff::Fixed, base_delay)
    }

    /// Linearly growing delay.
    #[must_use]
    pub fn linear(base_delay: Duration) -> Self {
        Self::new(Backoff::Linear, base_delay)
    }

    /// Doubling delay.
    #[must_use]
    pub fn exponential(base_delay: Duration) -> Self {
        Self::new(
            Backoff::Exponential {
                multiplier: DEFAULT_BACKOFF_MULTIPLIER,
            },
            base_delay,
        )
    }

    /// Sets the delay cap.
    #[must_use]
    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = max_delay;
        self
    }

    /// Enables or disables random jitter.
    #[must_use]
    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    #[must_use]
    pub fn backoff(&self) -> Backoff {
        self.backoff
    }

    #[must_use]
    pub fn base_delay(&self) -> Duration {
        self.base_delay
    }

    #[must_use]
    pub fn max_delay(&self) -> Duration {
        self.max_delay
    }

    /// Returns the wait before retry number `retry` (1-indexed; 0 is treated as 1).
    #[must_use]
    #[instrument(skip(self), fields(backoff = %self.backoff))]
    pub fn delay_for(&self, retry: u32) -> Duration {
        let retry = retry.max(1);
        let factor = match self.backoff {
            Backoff::Fixed => 1.0,
            Backoff::Linear => f64::from(retry),
            Backoff::Exponential { multiplier } => {
                let exponent = i32::try_from(retry - 1).unwrap_or(i32::MAX);
                multiplier.max(1.0).powi(exponent)
            }
        };

        let seconds = self.base_delay.as_secs_f64() * factor;
        let delay = Duration::try_from_secs_f64(seconds)
            .unwrap_or(self.max_delay)
            .min(self.max_delay);
        let delay = if self.jitter {
            delay + random_jitter()
        } else {
            delay
        };

        debug!(retry, delay_ms = delay.as_millis(), "computed retry delay");
        delay
    }
}

/// Random jitter between 0 and `MAX_JITTER`, so concurrent units do not retry in lockstep.
fn random_jitter() -> Duration {
    let max_ms = u64::try_from(MAX_JITTER.as_millis()).unwrap_or(500);
    Duration::from_millis(rand::thread_rng().gen_range(0..=max_ms))
}
