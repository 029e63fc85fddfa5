//! Artifact validation seam.
//!
//! A [`Validator`] inspects what a downloader produced before the unit is
//! marked COMPLETED. Any rejection counts against the unit's retry budget
//! exactly like a transient download failure.

use std::path::Path;

use async_trait::async_trait;

mod error;
mod file;

pub use error::ValidationError;
pub use file::{CsvRules, DEFAULT_MIN_FILE_SIZE, DEFAULT_MIN_ROWS, FileValidator};

/// Accepts or rejects a downloaded artifact.
#[async_trait]
pub trait Validator: Send + Sync {
    /// Returns `Ok(())` when the artifact is usable.
    async fn validate(&self, artifact: &Path) -> Result<(), ValidationError>;
}

/// Validator that accepts everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct AcceptAll;

#[async_trait]
impl Validator for AcceptAll {
    async fn validate(&self, _artifact: &Path) -> Result<(), ValidationError> {
        Ok(())
    }
}
