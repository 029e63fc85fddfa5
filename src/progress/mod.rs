//! Durable record of which units were attempted and how they ended.
//!
//! The store is the single source of truth for resume decisions: a unit whose
//! record says COMPLETED is never fetched again by a resuming run.

mod error;
mod record;
mod store;

pub use error::StoreError;
pub use record::{AttemptRecord, AttemptStatus, ProgressSnapshot, ProgressSummary};
pub use store::{ProgressStore, lock_path_for};
