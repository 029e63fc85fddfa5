//! Persisted progress types.
//!
//! The JSON layout is the resume contract between versions:
//!
//! ```json
//! {
//!   "created_at": "2024-01-01T09:00:00.000001",
//!   "last_updated": "2024-01-01T09:05:00.000002",
//!   "downloads": {
//!     "2024-01-01": {
//!       "status": "completed",
//!       "attempts": 1,
//!       "file_path": "data/2024-01-01.csv",
//!       "created_at": "2024-01-01T09:00:01.000003",
//!       "updated_at": "2024-01-01T09:00:02.000004"
//!     }
//!   },
//!   "metadata": {}
//! }
//! ```
//!
//! Timestamps are naive local time. Older files may carry `null` for
//! `file_path`/`error`, the retired `skipped` status (read as `pending`) and
//! fields this version does not know; all of them load.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Per-unit state machine position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptStatus {
    /// Known but not attempted yet.
    #[serde(alias = "skipped")]
    Pending,
    /// An attempt started and has not finished.
    InProgress,
    /// Artifact downloaded and validated. Terminal while resuming.
    Completed,
    /// Gave up on this unit (retries exhausted or permanent error).
    Failed,
}

impl AttemptStatus {
    /// Returns the persisted string form.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for AttemptStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for AttemptStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" | "skipped" => Ok(Self::Pending),
            "in_progress" => Ok(Self::InProgress),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            _ => Err(format!("invalid attempt status: {s}")),
        }
    }
}

/// History of one unit.
///
/// `file_path` is set exactly when `status` is `Completed`; `attempts` never
/// decreases.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttemptRecord {
    pub status: AttemptStatus,
    #[serde(default)]
    pub attempts: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_path: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub created_at: NaiveDateTime,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<NaiveDateTime>,
}

impl AttemptRecord {
    pub(crate) fn new(now: NaiveDateTime) -> Self {
        Self {
            status: AttemptStatus::Pending,
            attempts: 0,
            file_path: None,
            error: None,
            created_at: now,
            updated_at: None,
        }
    }
}

/// Whole-file unit of persistence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressSnapshot {
    pub created_at: NaiveDateTime,
    #[serde(default = "local_now")]
    pub last_updated: NaiveDateTime,
    #[serde(default)]
    pub downloads: BTreeMap<String, AttemptRecord>,
    #[serde(default)]
    pub metadata: BTreeMap<String, serde_json::Value>,
}

impl Default for ProgressSnapshot {
    fn default() -> Self {
        let now = local_now();
        Self {
            created_at: now,
            last_updated: now,
            downloads: BTreeMap::new(),
            metadata: BTreeMap::new(),
        }
    }
}

impl ProgressSnapshot {
    /// Counts records per status.
    #[must_use]
    pub fn summary(&self) -> ProgressSummary {
        let mut summary = ProgressSummary {
            total: self.downloads.len(),
            ..ProgressSummary::default()
        };
        for record in self.downloads.values() {
            match record.status {
                AttemptStatus::Pending => summary.pending += 1,
                AttemptStatus::InProgress => summary.in_progress += 1,
                AttemptStatus::Completed => summary.completed += 1,
                AttemptStatus::Failed => summary.failed += 1,
            }
        }
        summary
    }
}

/// Status counts over every record in a snapshot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ProgressSummary {
    pub total: usize,
    pub completed: usize,
    pub failed: usize,
    pub in_progress: usize,
    pub pending: usize,
}

impl ProgressSummary {
    /// Completed share of all records, as a percentage (0.0 when empty).
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn success_rate(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.completed as f64 / self.total as f64 * 100.0
        }
    }
}

pub(crate) fn local_now() -> NaiveDateTime {
    chrono::Local::now().naive_local()
}
