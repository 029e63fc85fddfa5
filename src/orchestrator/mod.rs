//! Run orchestration: walks a unit range, skips completed work, retries
//! transient failures and records every outcome in the progress store.
//!
//! # Overview
//!
//! Per-unit state machine: `PENDING -> IN_PROGRESS -> {COMPLETED | FAILED}`.
//! FAILED units are picked up again by later runs while their lifetime attempt
//! budget lasts; COMPLETED units are never fetched again while resuming.
//!
//! # Concurrency Model
//!
//! - Units are dispatched in ascending order, one task per unit
//! - A semaphore permit bounds the units in flight (default 1, sequential)
//! - All attempts share one [`RateLimiter`]
//! - Store mutations are serialized behind one async mutex; each mutation is
//!   persisted before the lock is released
//! - Stop and fatal-halt checks happen before each dispatch
//! - A fatal halt also wakes units already in flight: they stop before their
//!   next attempt and abandon any rate-limit or retry wait
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use chrono::NaiveDate;
//! use datefetch_core::download::{HttpDownloader, RateLimiter};
//! use datefetch_core::orchestrator::{Orchestrator, OrchestratorConfig};
//! use datefetch_core::progress::ProgressStore;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let downloader = Arc::new(HttpDownloader::new("https://example.com/{unit}.csv", "data")?);
//! let store = ProgressStore::load("data/datefetch_state.json")?;
//! let orchestrator = Orchestrator::<NaiveDate>::new(
//!     OrchestratorConfig::default(),
//!     downloader,
//!     Arc::new(RateLimiter::with_requests_per_minute(60)),
//!     store,
//! )?;
//!
//! let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
//! let end = NaiveDate::from_ymd_opt(2024, 1, 31).unwrap();
//! let summary = orchestrator.run(&start, &end, true).await?;
//! println!("completed {}, failed {}", summary.completed, summary.failed);
//! # Ok(())
//! # }
//! ```

use std::path::PathBuf;
use std::sync::{Arc, PoisonError};

use tokio::sync::{Mutex, MutexGuard, Semaphore};
use tokio::task::JoinSet;
use tracing::{debug, info, instrument, warn};

use crate::download::{DownloadError, Downloader, RateLimiter};
use crate::progress::{AttemptStatus, ProgressStore, ProgressSummary, StoreError};
use crate::unit::{WorkUnit, units_between};
use crate::validate::{AcceptAll, Validator};

mod config;
mod error;
mod observer;
mod shutdown;
mod summary;

pub use config::{DEFAULT_CONCURRENCY, DEFAULT_DOWNLOAD_TIMEOUT, MAX_CONCURRENCY, OrchestratorConfig};
pub use error::OrchestratorError;
pub use observer::{NoopObserver, RunObserver, UnitOutcome};
pub use shutdown::{SharedShutdown, ShutdownSignal};
pub use summary::RunSummary;

use summary::RunStats;

/// Drives one downloader over a unit range.
pub struct Orchestrator<U: WorkUnit> {
    config: OrchestratorConfig,
    downloader: Arc<dyn Downloader<U>>,
    validator: Arc<dyn Validator>,
    rate_limiter: Arc<RateLimiter>,
    store: Arc<Mutex<ProgressStore>>,
    shutdown: SharedShutdown,
    observer: Arc<dyn RunObserver>,
}

impl<U: WorkUnit> std::fmt::Debug for Orchestrator<U> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("config", &self.config)
            .field("rate_limiter", &self.rate_limiter)
            .field("shutdown", &self.shutdown)
            .finish_non_exhaustive()
    }
}

impl<U: WorkUnit> Orchestrator<U> {
    /// Creates an orchestrator that accepts every artifact until
    /// [`Orchestrator::with_validator`] installs a real validator.
    ///
    /// # Errors
    ///
    /// Returns [`OrchestratorError::InvalidConfig`] when `config` fails
    /// [`OrchestratorConfig::validate`].
    #[instrument(level = "debug", skip_all, fields(max_retries = config.max_retries, concurrency = config.concurrency))]
    pub fn new(
        config: OrchestratorConfig,
        downloader: Arc<dyn Downloader<U>>,
        rate_limiter: Arc<RateLimiter>,
        store: ProgressStore,
    ) -> Result<Self, OrchestratorError> {
        config.validate()?;
        debug!(
            backoff = %config.retry_policy.backoff(),
            base_delay_ms = config.retry_policy.base_delay().as_millis(),
            requests_per_minute = rate_limiter.config().requests_per_minute,
            state_file = %store.path().display(),
            "creating orchestrator"
        );

        Ok(Self {
            config,
            downloader,
            validator: Arc::new(AcceptAll),
            rate_limiter,
            store: Arc::new(Mutex::new(store)),
            shutdown: ShutdownSignal::shared(),
            observer: Arc::new(NoopObserver),
        })
    }

    #[must_use]
    pub fn with_validator(mut self, validator: Arc<dyn Validator>) -> Self {
        self.validator = validator;
        self
    }

    /// Uses an externally owned stop signal (e.g. wired to Ctrl+C).
    #[must_use]
    pub fn with_shutdown(mut self, shutdown: SharedShutdown) -> Self {
        self.shutdown = shutdown;
        self
    }

    #[must_use]
    pub fn with_observer(mut self, observer: Arc<dyn RunObserver>) -> Self {
        self.observer = observer;
        self
    }

    #[must_use]
    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Returns the stop signal checked between units.
    #[must_use]
    pub fn shutdown_handle(&self) -> SharedShutdown {
        Arc::clone(&self.shutdown)
    }

    /// Locks the progress store for inspection.
    pub async fn store(&self) -> MutexGuard<'_, ProgressStore> {
        self.store.lock().await
    }

    /// Status counts over every record in the store, not just one range.
    pub async fn progress_summary(&self) -> ProgressSummary {
        self.store.lock().await.summary()
    }

    /// Processes every unit from `start` to `end` inclusive.
    ///
    /// With `resume`, COMPLETED units are skipped without touching the rate
    /// limiter or the downloader, and the attempt budget is a lifetime cap.
    /// Without it, every unit is attempted and gets a fresh budget.
    ///
    /// # Errors
    ///
    /// - [`OrchestratorError::InvalidRange`] when `start > end`
    /// - [`OrchestratorError::Fatal`] when the downloader reports a fatal
    ///   error; units after the halting unit are left untouched
    /// - [`OrchestratorError::Store`] when progress cannot be persisted
    ///
    /// Units that fail are recorded and counted, they never error the run.
    #[instrument(skip(self, start, end), fields(start = %start, end = %end))]
    pub async fn run(&self, start: &U, end: &U, resume: bool) -> Result<RunSummary, OrchestratorError> {
        let units = units_between(start, end)?;
        let total = units.len();
        let worker = Arc::new(UnitWorker {
            config: self.config.clone(),
            downloader: Arc::clone(&self.downloader),
            validator: Arc::clone(&self.validator),
            rate_limiter: Arc::clone(&self.rate_limiter),
            store: Arc::clone(&self.store),
            shutdown: Arc::clone(&self.shutdown),
            observer: Arc::clone(&self.observer),
            stats: RunStats::default(),
            halt: std::sync::Mutex::new(None),
            halted: ShutdownSignal::new(),
        });
        let semaphore = Arc::new(Semaphore::new(self.config.concurrency));
        let mut tasks = JoinSet::new();
        let mut interrupted = false;

        info!(total, resume, "starting run");
        self.observer.run_started(total);

        for unit in units {
            if worker.is_halted() {
                break;
            }
            if self.shutdown.is_shutdown_requested() {
                interrupted = true;
                break;
            }

            let key = unit.to_string();
            if resume && self.store.lock().await.get_status(&key) == Some(AttemptStatus::Completed) {
                debug!(unit = %key, "already completed, skipping");
                worker.stats.increment_skipped();
                self.observer.unit_skipped(&key);
                continue;
            }

            let permit = Arc::clone(&semaphore)
                .acquire_owned()
                .await
                .map_err(|_| OrchestratorError::SemaphoreClosed)?;

            // An earlier unit may have halted or a stop may have arrived while waiting.
            if worker.is_halted() {
                break;
            }
            if self.shutdown.is_shutdown_requested() {
                interrupted = true;
                break;
            }

            let worker = Arc::clone(&worker);
            tasks.spawn(async move {
                let _permit = permit;
                worker.process(&unit, &key, resume).await;
            });
        }

        debug!(task_count = tasks.len(), "waiting for in-flight units");
        while let Some(joined) = tasks.join_next().await {
            if let Err(e) = joined {
                warn!(error = %e, "unit task panicked");
            }
        }

        // A stop that cut a retry wait short still leaves work undone.
        let interrupted = interrupted || self.shutdown.is_shutdown_requested();
        let summary = worker.stats.summary(total, interrupted);
        if let Some(halt) = worker.take_halt() {
            return Err(match halt {
                Halt::Fatal { unit, message } => {
                    warn!(unit = %unit, completed = summary.completed, "run halted by fatal error");
                    OrchestratorError::Fatal {
                        unit,
                        message,
                        summary,
                    }
                }
                Halt::Store(e) => OrchestratorError::Store(e),
            });
        }

        info!(
            completed = summary.completed,
            failed = summary.failed,
            skipped = summary.skipped,
            abandoned = summary.abandoned,
            pending = summary.pending,
            retried = summary.retried,
            interrupted,
            "run complete"
        );
        self.observer.run_finished(&summary);
        Ok(summary)
    }
}

/// Reason the run must stop dispatching.
#[derive(Debug)]
enum Halt {
    Fatal { unit: String, message: String },
    Store(StoreError),
}

impl From<StoreError> for Halt {
    fn from(error: StoreError) -> Self {
        Self::Store(error)
    }
}

/// State shared by the unit tasks of one run.
struct UnitWorker<U: WorkUnit> {
    config: OrchestratorConfig,
    downloader: Arc<dyn Downloader<U>>,
    validator: Arc<dyn Validator>,
    rate_limiter: Arc<RateLimiter>,
    store: Arc<Mutex<ProgressStore>>,
    shutdown: SharedShutdown,
    observer: Arc<dyn RunObserver>,
    stats: RunStats,
    halt: std::sync::Mutex<Option<Halt>>,
    /// Tripped once `halt` is filled; in-flight units watch it.
    halted: ShutdownSignal,
}

impl<U: WorkUnit> UnitWorker<U> {
    fn is_halted(&self) -> bool {
        self.halted.is_shutdown_requested()
    }

    fn take_halt(&self) -> Option<Halt> {
        self.halt.lock().unwrap_or_else(PoisonError::into_inner).take()
    }

    async fn process(&self, unit: &U, key: &str, resume: bool) {
        if let Err(halt) = self.process_unit(unit, key, resume).await {
            {
                let mut slot = self.halt.lock().unwrap_or_else(PoisonError::into_inner);
                // First halt wins.
                if slot.is_none() {
                    *slot = Some(halt);
                }
            }
            self.halted.request_shutdown();
        }
    }

    /// Runs the retry loop for one unit. Only fatal and store errors escape.
    #[instrument(skip(self, unit, key), fields(unit = %key))]
    async fn process_unit(&self, unit: &U, key: &str, resume: bool) -> Result<(), Halt> {
        let prior = self.store.lock().await.attempts(key);
        let limit = if resume {
            self.config.max_retries
        } else {
            prior.saturating_add(self.config.max_retries)
        };

        if prior >= limit {
            let mut store = self.store.lock().await;
            if store.get_status(key) != Some(AttemptStatus::Failed) {
                store.fail(key, &format!("retry budget exhausted after {prior} attempts"))?;
            }
            drop(store);
            info!(attempts = prior, "attempt budget spent, abandoning unit");
            self.stats.increment_abandoned();
            self.observer
                .unit_finished(key, &UnitOutcome::Abandoned { attempts: prior });
            return Ok(());
        }

        let mut retry = 0u32;
        loop {
            if self.is_halted() {
                debug!("run halted, not starting another attempt");
                return Ok(());
            }
            let attempt = self.store.lock().await.begin(key)?;
            self.observer.unit_started(key, attempt);
            tokio::select! {
                biased;
                () = self.halted.wait_for_shutdown() => {
                    debug!(attempt, "run halted while waiting for a request slot");
                    return Ok(());
                }
                () = self.rate_limiter.acquire() => {}
            }
            debug!(attempt, "attempting download");

            let error = match self.attempt(unit).await {
                Ok(path) => {
                    self.store.lock().await.complete(key, &path)?;
                    self.rate_limiter.record_success();
                    self.stats.increment_completed();
                    info!(attempt, path = %path.display(), "unit completed");
                    self.observer
                        .unit_finished(key, &UnitOutcome::Completed { path });
                    return Ok(());
                }
                Err(error) => error,
            };

            if error.is_fatal() {
                return Err(Halt::Fatal {
                    unit: key.to_string(),
                    message: error.to_string(),
                });
            }

            if matches!(error, DownloadError::RateLimited { .. }) || error.retry_after().is_some() {
                self.rate_limiter.penalize(error.retry_after());
            }

            let message = error.to_string();
            if !error.is_retryable() || attempt >= limit {
                self.store.lock().await.fail(key, &message)?;
                self.stats.increment_failed();
                warn!(attempt, error = %message, "unit failed");
                self.observer
                    .unit_finished(key, &UnitOutcome::Failed { error: message });
                return Ok(());
            }

            self.store.lock().await.note_error(key, &message)?;
            retry += 1;
            let delay = self.config.retry_policy.delay_for(retry);
            self.stats.increment_retried();
            info!(
                attempt,
                max_attempts = limit,
                delay_ms = delay.as_millis(),
                error = %message,
                "retrying unit"
            );
            self.observer.unit_retrying(key, attempt, delay, &message);

            tokio::select! {
                biased;
                () = self.shutdown.wait_for_shutdown() => {
                    info!("stop requested during retry wait, leaving unit in progress");
                    return Ok(());
                }
                () = self.halted.wait_for_shutdown() => {
                    info!("run halted during retry wait, leaving unit in progress");
                    return Ok(());
                }
                () = tokio::time::sleep(delay) => {}
            }
        }
    }

    /// One bounded download plus validation.
    async fn attempt(&self, unit: &U) -> Result<PathBuf, DownloadError> {
        let limit = self.config.download_timeout;
        let path = tokio::time::timeout(limit, self.downloader.download(unit))
            .await
            .map_err(|_| DownloadError::timed_out(limit))??;

        if self.config.validate {
            self.validator
                .validate(&path)
                .await
                .map_err(|e| DownloadError::transient(format!("validation failed: {e}")))?;
        }
        Ok(path)
    }
}
