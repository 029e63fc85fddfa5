//! Datefetch Core Library
//!
//! Resumable, rate-limited batch downloads over an ordered range of work
//! units (typically calendar dates).
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//! - [`unit`] - Work unit ordering and range expansion
//! - [`download`] - Downloader seam, HTTP implementation, rate limiter, retry policy
//! - [`validate`] - Artifact validation seam and file checks
//! - [`progress`] - Crash-safe per-unit progress store
//! - [`orchestrator`] - Run loop tying the above together

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod download;
pub mod orchestrator;
pub mod progress;
pub mod unit;
pub mod validate;

// Re-export commonly used types
pub use download::{
    Backoff, DownloadError, Downloader, HttpDownloader, RateLimiter, RateLimiterConfig,
    RetryPolicy,
};
pub use orchestrator::{
    Orchestrator, OrchestratorConfig, OrchestratorError, RunObserver, RunSummary, ShutdownSignal,
};
pub use progress::{AttemptRecord, AttemptStatus, ProgressStore, ProgressSummary, StoreError};
pub use unit::{RangeError, WorkUnit, units_between};
pub use validate::{AcceptAll, FileValidator, ValidationError, Validator};
