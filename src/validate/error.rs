//! Error types for artifact validation.

use std::path::PathBuf;

use thiserror::Error;

/// A downloaded artifact was rejected.
///
/// The orchestrator treats every variant like a transient download failure:
/// the unit is retried while attempts remain.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// The downloader returned a path that does not exist.
    #[error("artifact does not exist: {path}")]
    Missing {
        /// Reported artifact path.
        path: PathBuf,
    },

    /// The artifact could not be read.
    #[error("cannot read artifact {path}: {source}")]
    Io {
        /// Artifact path.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The artifact is smaller than the configured minimum.
    #[error("artifact {path} too small ({size} bytes, minimum {min})")]
    TooSmall {
        /// Artifact path.
        path: PathBuf,
        /// Actual size in bytes.
        size: u64,
        /// Configured minimum in bytes.
        min: u64,
    },

    /// The artifact did not parse as delimited text with more than one column.
    #[error("artifact {path} is not a delimited table (tried ',' and ';')")]
    NotTabular {
        /// Artifact path.
        path: PathBuf,
    },

    /// Header is missing required columns.
    #[error("artifact {path} missing required columns: {}", .missing.join(", "))]
    MissingColumns {
        /// Artifact path.
        path: PathBuf,
        /// Columns not found in the header.
        missing: Vec<String>,
    },

    /// Fewer data rows than required.
    #[error("artifact {path} has {rows} data rows (minimum {min})")]
    TooFewRows {
        /// Artifact path.
        path: PathBuf,
        /// Data rows found (header excluded).
        rows: usize,
        /// Configured minimum.
        min: usize,
    },

    /// The table parser gave up partway through the file.
    #[error("artifact {path} is not valid CSV: {reason}")]
    Malformed {
        /// Artifact path.
        path: PathBuf,
        /// Parser message.
        reason: String,
    },

    /// Rejected by a custom validator.
    #[error("artifact {path} rejected: {reason}")]
    Rejected {
        /// Artifact path.
        path: PathBuf,
        /// Why the artifact was rejected.
        reason: String,
    },
}

impl ValidationError {
    /// Creates an IO error for `path`.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Creates a custom rejection.
    pub fn rejected(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::Rejected {
            path: path.into(),
            reason: reason.into(),
        }
    }
}
