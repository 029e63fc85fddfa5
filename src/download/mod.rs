//! Everything that touches the remote source: the downloader seam, the
//! shared rate limiter, retry delays and the error classes.
//!
//! # Features
//!
//! - [`Downloader`] trait: one call fetches one unit and returns the artifact path
//! - [`HttpDownloader`]: URL-template implementation streaming to disk
//! - [`RateLimiter`]: adaptive token bucket shared by all attempts of a run
//! - [`RetryPolicy`]: fixed, linear or exponential delay between attempts
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use chrono::NaiveDate;
//! use datefetch_core::download::{Downloader, HttpDownloader, RateLimiter};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let limiter = Arc::new(RateLimiter::with_requests_per_minute(60));
//! let downloader = HttpDownloader::new("https://example.com/{unit}.csv", "./data")?;
//!
//! limiter.acquire().await;
//! let day = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
//! let path = downloader.download(&day).await?;
//! limiter.record_success();
//! println!("Downloaded: {}", path.display());
//! # Ok(())
//! # }
//! ```

use std::path::PathBuf;

use async_trait::async_trait;

use crate::unit::WorkUnit;

mod client;
mod constants;
mod error;
pub mod rate_limiter;
mod retry;

pub use client::{HttpDownloader, classify_status};
pub use constants::{DEFAULT_FILENAME_TEMPLATE, UNIT_PLACEHOLDER};
pub use error::DownloadError;
pub use rate_limiter::{
    DEFAULT_MAX_PENALTY, DEFAULT_REQUESTS_PER_MINUTE, DEFAULT_SUCCESS_STREAK, RateLimiter,
    RateLimiterConfig, parse_retry_after,
};
pub use retry::{Backoff, DEFAULT_MAX_RETRIES, DEFAULT_RETRY_DELAY, RetryPolicy};

/// Fetches the artifact for one work unit.
///
/// Implementations classify every failure (see [`DownloadError`]); the
/// orchestrator owns retries, rate limiting and progress bookkeeping.
#[async_trait]
pub trait Downloader<U: WorkUnit>: Send + Sync {
    /// Downloads `unit` and returns where the artifact was stored.
    async fn download(&self, unit: &U) -> Result<PathBuf, DownloadError>;
}
