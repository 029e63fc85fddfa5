//! Progress store error types.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while loading or persisting the progress snapshot.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The progress file exists but cannot be read or parsed.
    ///
    /// The file is never overwritten in this case.
    #[error(
        "progress file {path} is corrupt: {reason}\n  Suggestion: restore it from a backup or move it aside to start a fresh run; it was left untouched"
    )]
    CorruptState {
        /// Path of the progress file.
        path: PathBuf,
        /// Parser or IO message.
        reason: String,
    },

    /// Another process holds the writer lock on this progress file.
    #[error(
        "progress file {path} is in use by another run\n  Suggestion: wait for the other run to finish or point --state-file elsewhere"
    )]
    Locked {
        /// Path of the progress file.
        path: PathBuf,
    },

    /// Writing the snapshot or its lock file failed.
    #[error("IO error on {path}: {source}")]
    Io {
        /// Path involved in the failed operation.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The snapshot could not be encoded.
    #[error("failed to encode progress snapshot: {0}")]
    Encode(#[from] serde_json::Error),
}

impl StoreError {
    /// Creates a corrupt-state error.
    pub fn corrupt(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::CorruptState {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Creates an IO error.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
