//! Adaptive request-rate admission control.
//!
//! [`RateLimiter`] is a token bucket shared by every download attempt of a
//! run. Capacity is `requests_per_minute`, refilled continuously at
//! `requests_per_minute / 60` tokens per second. On top of the bucket sits an
//! `extra_delay` penalty:
//!
//! - [`RateLimiter::penalize`] sets it to the server's `Retry-After` hint, or
//!   doubles it (starting from a small initial penalty) up to a ceiling.
//! - [`RateLimiter::record_success`] halves it after a streak of consecutive
//!   successes and drops it to zero once it falls under the recovery floor.
//!
//! Every grant waits `max(bucket_wait, extra_delay)`. A sliding record of the
//! last `requests_per_minute` grant instants keeps a full bucket from admitting
//! more than `requests_per_minute` requests in any 60-second window.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use datefetch_core::download::RateLimiter;
//!
//! # async fn example() {
//! let limiter = Arc::new(RateLimiter::with_requests_per_minute(30));
//!
//! limiter.acquire().await;
//! // ... server answered 429 without a hint
//! limiter.penalize(None);
//! // ... later attempts succeed
//! limiter.record_success();
//! # }
//! ```

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};

use super::constants::MAX_RETRY_AFTER;

/// Default admission budget.
pub const DEFAULT_REQUESTS_PER_MINUTE: u32 = 60;

/// Default number of consecutive successes before the penalty is halved.
pub const DEFAULT_SUCCESS_STREAK: u32 = 5;

/// Hard ceiling for penalties grown by doubling.
pub const DEFAULT_MAX_PENALTY: Duration = Duration::from_secs(300);

/// Penalty applied by the first hint-less `penalize`.
const DEFAULT_INITIAL_PENALTY: Duration = Duration::from_secs(1);

/// Penalties that decay below this value are cleared.
const DEFAULT_RECOVERY_FLOOR: Duration = Duration::from_secs(1);

/// Length of the sliding admission window.
const WINDOW: Duration = Duration::from_secs(60);

/// Tuning knobs for [`RateLimiter`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimiterConfig {
    /// Bucket capacity and per-minute refill.
    pub requests_per_minute: u32,
    /// Consecutive successes required for one halving of the penalty.
    pub success_streak: u32,
    /// Penalty used when `penalize` has no hint and no penalty is active.
    pub initial_penalty: Duration,
    /// Ceiling for doubled penalties.
    pub max_penalty: Duration,
    /// Decayed penalties below this are reset to zero.
    pub recovery_floor: Duration,
}

impl Default for RateLimiterConfig {
    fn default() -> Self {
        Self {
            requests_per_minute: DEFAULT_REQUESTS_PER_MINUTE,
            success_streak: DEFAULT_SUCCESS_STREAK,
            initial_penalty: DEFAULT_INITIAL_PENALTY,
            max_penalty: DEFAULT_MAX_PENALTY,
            recovery_floor: DEFAULT_RECOVERY_FLOOR,
        }
    }
}

/// Shared admission control for one run.
///
/// `RateLimiter` is `Send + Sync`; wrap it in `Arc` to share it between
/// concurrently running units. The internal lock is never held across an
/// await point: `acquire` reserves its grant instant under the lock and
/// sleeps after releasing it.
#[derive(Debug)]
pub struct RateLimiter {
    config: RateLimiterConfig,
    budget: Mutex<RateBudget>,
}

#[derive(Debug)]
struct RateBudget {
    tokens: f64,
    refilled_at: Instant,
    extra_delay: Duration,
    successes: u32,
    last_grant: Option<Instant>,
    recent_grants: VecDeque<Instant>,
}

impl RateBudget {
    fn tokens_at(&self, at: Instant, capacity: f64, per_second: f64) -> f64 {
        let elapsed = at.saturating_duration_since(self.refilled_at).as_secs_f64();
        (self.tokens + elapsed * per_second).min(capacity)
    }
}

impl RateLimiter {
    /// Creates a limiter with a full bucket.
    ///
    /// `requests_per_minute` and `success_streak` are clamped to at least 1.
    #[must_use]
    #[instrument(skip_all, fields(rpm = config.requests_per_minute))]
    pub fn new(config: RateLimiterConfig) -> Self {
        let config = RateLimiterConfig {
            requests_per_minute: config.requests_per_minute.max(1),
            success_streak: config.success_streak.max(1),
            ..config
        };
        debug!("creating rate limiter");

        let budget = RateBudget {
            tokens: f64::from(config.requests_per_minute),
            refilled_at: Instant::now(),
            extra_delay: Duration::ZERO,
            successes: 0,
            last_grant: None,
            recent_grants: VecDeque::new(),
        };
        Self {
            config,
            budget: Mutex::new(budget),
        }
    }

    /// Creates a limiter with default recovery settings.
    #[must_use]
    pub fn with_requests_per_minute(requests_per_minute: u32) -> Self {
        Self::new(RateLimiterConfig {
            requests_per_minute,
            ..RateLimiterConfig::default()
        })
    }

    /// Returns the effective configuration.
    #[must_use]
    pub fn config(&self) -> &RateLimiterConfig {
        &self.config
    }

    /// Returns the current penalty.
    #[must_use]
    pub fn extra_delay(&self) -> Duration {
        self.lock().extra_delay
    }

    /// Waits until one request may be issued, then consumes it.
    ///
    /// Never fails; it only delays.
    #[instrument(skip(self))]
    pub async fn acquire(&self) {
        let grant_at = self.reserve(Instant::now());
        let wait = grant_at.saturating_duration_since(Instant::now());
        if !wait.is_zero() {
            debug!(wait_ms = wait.as_millis(), "waiting for rate limit admission");
            tokio::time::sleep_until(grant_at).await;
        }
    }

    /// Widens the spacing of future grants after a rate-limit rejection.
    #[instrument(skip(self))]
    pub fn penalize(&self, retry_after: Option<Duration>) {
        let mut budget = self.lock();
        let next = match retry_after {
            Some(hint) => hint.min(MAX_RETRY_AFTER),
            None if budget.extra_delay.is_zero() => self.config.initial_penalty,
            None => budget
                .extra_delay
                .saturating_mul(2)
                .min(self.config.max_penalty.max(budget.extra_delay)),
        };
        budget.extra_delay = next;
        budget.successes = 0;

        if retry_after.is_none() && next >= self.config.max_penalty {
            warn!(
                extra_delay_secs = next.as_secs(),
                "rate limit penalty at ceiling - the source keeps rejecting requests"
            );
        } else {
            info!(extra_delay_ms = next.as_millis(), "rate limit penalty applied");
        }
    }

    /// Records a successful download; relaxes an active penalty after a streak.
    #[instrument(skip(self))]
    pub fn record_success(&self) {
        let mut budget = self.lock();
        if budget.extra_delay.is_zero() {
            budget.successes = 0;
            return;
        }

        budget.successes += 1;
        if budget.successes < self.config.success_streak {
            return;
        }

        budget.successes = 0;
        let halved = budget.extra_delay / 2;
        budget.extra_delay = if halved < self.config.recovery_floor {
            Duration::ZERO
        } else {
            halved
        };
        debug!(
            extra_delay_ms = budget.extra_delay.as_millis(),
            "rate limit penalty relaxed"
        );
    }

    fn lock(&self) -> MutexGuard<'_, RateBudget> {
        self.budget.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Picks the instant of the next grant and books it.
    fn reserve(&self, now: Instant) -> Instant {
        let capacity = f64::from(self.config.requests_per_minute);
        let per_second = capacity / WINDOW.as_secs_f64();
        let window_limit = self.config.requests_per_minute as usize;
        let mut budget = self.lock();

        let mut grant_at = now + budget.extra_delay;
        if let Some(last) = budget.last_grant {
            grant_at = grant_at.max(last);
        }

        let available = budget.tokens_at(grant_at, capacity, per_second);
        if available < 1.0 {
            grant_at += Duration::from_secs_f64((1.0 - available) / per_second);
        }

        while budget.recent_grants.len() >= window_limit {
            if let Some(oldest) = budget.recent_grants.pop_front() {
                grant_at = grant_at.max(oldest + WINDOW);
            }
        }

        let available = budget.tokens_at(grant_at, capacity, per_second);
        budget.tokens = (available - 1.0).max(0.0);
        budget.refilled_at = grant_at;
        budget.last_grant = Some(grant_at);
        budget.recent_grants.push_back(grant_at);
        grant_at
    }
}

/// Parses a Retry-After header value into a Duration.
///
/// Accepts integer seconds or an RFC 7231 HTTP-date. Dates in the past give
/// zero; values above one hour are capped.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use datefetch_core::download::parse_retry_after;
///
/// assert_eq!(parse_retry_after("120"), Some(Duration::from_secs(120)));
/// assert_eq!(parse_retry_after("soon"), None);
/// ```
#[must_use]
#[instrument]
pub fn parse_retry_after(header_value: &str) -> Option<Duration> {
    let header_value = header_value.trim();

    if let Ok(seconds) = header_value.parse::<i64>() {
        let Ok(seconds) = u64::try_from(seconds) else {
            debug!(seconds, "negative Retry-After value, ignoring");
            return None;
        };
        return Some(cap_retry_after(Duration::from_secs(seconds)));
    }

    let Ok(deadline) = httpdate::parse_http_date(header_value) else {
        debug!(header_value, "unparseable Retry-After value");
        return None;
    };
    match deadline.duration_since(std::time::SystemTime::now()) {
        Ok(remaining) => Some(cap_retry_after(remaining)),
        Err(_) => Some(Duration::ZERO),
    }
}

fn cap_retry_after(delay: Duration) -> Duration {
    if delay > MAX_RETRY_AFTER {
        warn!(
            delay_secs = delay.as_secs(),
            max_secs = MAX_RETRY_AFTER.as_secs(),
            "Retry-After exceeds maximum, capping at 1 hour"
        );
        MAX_RETRY_AFTER
    } else {
        delay
    }
}
