//! Crash-safe progress store.
//!
//! Every mutation rewrites the whole snapshot through a temp file in the same
//! directory followed by an atomic rename, so a crash at any instant leaves
//! either the previous or the next complete snapshot on disk.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::{debug, info, instrument, warn};

use super::record::{
    AttemptRecord, AttemptStatus, ProgressSnapshot, ProgressSummary, local_now,
};
use super::StoreError;

/// Suffix of the writer lock file kept next to the progress file.
const LOCK_SUFFIX: &str = ".lock";

/// Durable per-unit attempt history.
///
/// A store opened with [`ProgressStore::load`] holds an exclusive lock on
/// `<path>.lock` until dropped, so two runs can never interleave writes to the
/// same file. [`ProgressStore::load_read_only`] skips the lock for inspection
/// commands.
#[derive(Debug)]
pub struct ProgressStore {
    path: PathBuf,
    snapshot: ProgressSnapshot,
    lock: Option<File>,
}

impl ProgressStore {
    /// Opens the progress file for writing, creating an empty snapshot when it
    /// does not exist yet.
    ///
    /// # Errors
    ///
    /// - [`StoreError::Locked`] when another run holds the file
    /// - [`StoreError::CorruptState`] when the file exists but does not parse;
    ///   the file is left untouched
    /// - [`StoreError::Io`] when the parent directory or lock file cannot be created
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn load(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        let lock = acquire_lock(&path)?;
        let snapshot = read_snapshot(&path)?;
        info!(records = snapshot.downloads.len(), "progress loaded");
        Ok(Self {
            path,
            snapshot,
            lock: Some(lock),
        })
    }

    /// Opens the progress file without taking the writer lock.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::CorruptState`] when the file exists but does not parse.
    pub fn load_read_only(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        let snapshot = read_snapshot(&path)?;
        Ok(Self {
            path,
            snapshot,
            lock: None,
        })
    }

    /// Returns the progress file location.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns true when this store holds the writer lock.
    #[must_use]
    pub fn is_locked(&self) -> bool {
        self.lock.is_some()
    }

    #[must_use]
    pub fn snapshot(&self) -> &ProgressSnapshot {
        &self.snapshot
    }

    /// Returns the status of `key`, or `None` for a unit never seen.
    #[must_use]
    pub fn get_status(&self, key: &str) -> Option<AttemptStatus> {
        self.snapshot.downloads.get(key).map(|record| record.status)
    }

    #[must_use]
    pub fn record(&self, key: &str) -> Option<&AttemptRecord> {
        self.snapshot.downloads.get(key)
    }

    /// Lifetime attempt count for `key` (0 when unseen).
    #[must_use]
    pub fn attempts(&self, key: &str) -> u32 {
        self.record(key).map_or(0, |record| record.attempts)
    }

    /// Iterates all records in key order.
    pub fn records(&self) -> impl Iterator<Item = (&str, &AttemptRecord)> {
        self.snapshot
            .downloads
            .iter()
            .map(|(key, record)| (key.as_str(), record))
    }

    /// Returns the keys of FAILED records, in key order.
    #[must_use]
    pub fn failed_units(&self) -> Vec<&str> {
        self.keys_with(AttemptStatus::Failed)
    }

    /// Returns the keys of COMPLETED records, in key order.
    #[must_use]
    pub fn completed_units(&self) -> Vec<&str> {
        self.keys_with(AttemptStatus::Completed)
    }

    fn keys_with(&self, status: AttemptStatus) -> Vec<&str> {
        self.records()
            .filter(|(_, record)| record.status == status)
            .map(|(key, _)| key)
            .collect()
    }

    #[must_use]
    pub fn summary(&self) -> ProgressSummary {
        self.snapshot.summary()
    }

    /// Returns a free-form metadata value.
    #[must_use]
    pub fn metadata(&self, key: &str) -> Option<&serde_json::Value> {
        self.snapshot.metadata.get(key)
    }

    /// Starts an attempt: creates the record if needed, increments
    /// `attempts`, sets IN_PROGRESS and persists. Returns the new lifetime
    /// attempt count.
    ///
    /// # Errors
    ///
    /// Returns an error when the snapshot cannot be persisted.
    pub fn begin(&mut self, key: &str) -> Result<u32, StoreError> {
        let now = local_now();
        let record = self
            .snapshot
            .downloads
            .entry(key.to_string())
            .or_insert_with(|| AttemptRecord::new(now));
        record.status = AttemptStatus::InProgress;
        record.attempts = record.attempts.saturating_add(1);
        record.file_path = None;
        record.updated_at = Some(now);
        let attempts = record.attempts;

        self.save()?;
        debug!(unit = key, attempts, "attempt started");
        Ok(attempts)
    }

    /// Marks `key` COMPLETED at `location` and persists.
    ///
    /// # Errors
    ///
    /// Returns an error when the snapshot cannot be persisted.
    pub fn complete(&mut self, key: &str, location: &Path) -> Result<(), StoreError> {
        let record = self.touch(key);
        record.status = AttemptStatus::Completed;
        record.file_path = Some(location.to_path_buf());
        record.error = None;
        self.save()
    }

    /// Marks `key` FAILED with `message` and persists. Does not count an attempt.
    ///
    /// # Errors
    ///
    /// Returns an error when the snapshot cannot be persisted.
    pub fn fail(&mut self, key: &str, message: &str) -> Result<(), StoreError> {
        let record = self.touch(key);
        record.status = AttemptStatus::Failed;
        record.file_path = None;
        record.error = Some(message.to_string());
        self.save()
    }

    /// Records the latest error for `key` without changing its status.
    ///
    /// # Errors
    ///
    /// Returns an error when the snapshot cannot be persisted.
    pub fn note_error(&mut self, key: &str, message: &str) -> Result<(), StoreError> {
        self.touch(key).error = Some(message.to_string());
        self.save()
    }

    /// Sets a free-form metadata value and persists.
    ///
    /// # Errors
    ///
    /// Returns an error when the snapshot cannot be persisted.
    pub fn set_metadata(
        &mut self,
        key: &str,
        value: serde_json::Value,
    ) -> Result<(), StoreError> {
        self.snapshot.metadata.insert(key.to_string(), value);
        self.save()
    }

    /// Drops every record and metadata entry, then persists the empty snapshot.
    ///
    /// # Errors
    ///
    /// Returns an error when the snapshot cannot be persisted.
    #[instrument(skip(self), fields(path = %self.path.display()))]
    pub fn reset(&mut self) -> Result<(), StoreError> {
        let cleared = self.snapshot.downloads.len();
        self.snapshot = ProgressSnapshot::default();
        self.save()?;
        info!(cleared, "progress reset");
        Ok(())
    }

    /// Persists the snapshot to its own path.
    ///
    /// # Errors
    ///
    /// Returns an error when encoding, writing or renaming fails.
    pub fn save(&mut self) -> Result<(), StoreError> {
        let path = self.path.clone();
        self.save_to(&path)
    }

    /// Persists the snapshot to `path` atomically.
    ///
    /// # Errors
    ///
    /// Returns an error when encoding, writing or renaming fails.
    pub fn save_to(&mut self, path: &Path) -> Result<(), StoreError> {
        self.snapshot.last_updated = local_now();
        write_atomic(path, &self.snapshot)
    }

    fn touch(&mut self, key: &str) -> &mut AttemptRecord {
        let now = local_now();
        let record = self
            .snapshot
            .downloads
            .entry(key.to_string())
            .or_insert_with(|| AttemptRecord::new(now));
        record.updated_at = Some(now);
        record
    }
}

fn parent_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    }
}

/// Returns `<path>.lock`.
#[must_use]
pub fn lock_path_for(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(LOCK_SUFFIX);
    PathBuf::from(name)
}

fn acquire_lock(path: &Path) -> Result<File, StoreError> {
    let parent = parent_dir(path);
    std::fs::create_dir_all(parent).map_err(|e| StoreError::io(parent, e))?;

    let lock_path = lock_path_for(path);
    let file = OpenOptions::new()
        .create(true)
        .truncate(false)
        .write(true)
        .open(&lock_path)
        .map_err(|e| StoreError::io(&lock_path, e))?;

    if let Err(e) = fs2::FileExt::try_lock_exclusive(&file) {
        warn!(lock = %lock_path.display(), error = %e, "progress file already locked");
        return Err(StoreError::Locked {
            path: path.to_path_buf(),
        });
    }
    Ok(file)
}

fn read_snapshot(path: &Path) -> Result<ProgressSnapshot, StoreError> {
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "no progress file yet, starting fresh");
            return Ok(ProgressSnapshot::default());
        }
        Err(e) => return Err(StoreError::corrupt(path, format!("unreadable: {e}"))),
    };

    serde_json::from_str(&raw).map_err(|e| StoreError::corrupt(path, e.to_string()))
}

fn write_atomic(path: &Path, snapshot: &ProgressSnapshot) -> Result<(), StoreError> {
    let parent = parent_dir(path);
    std::fs::create_dir_all(parent).map_err(|e| StoreError::io(parent, e))?;

    let json = serde_json::to_vec_pretty(snapshot)?;
    let mut temp = tempfile::Builder::new()
        .prefix(".datefetch-")
        .suffix(".tmp")
        .tempfile_in(parent)
        .map_err(|e| StoreError::io(parent, e))?;
    let temp_path = temp.path().to_path_buf();
    temp.write_all(&json)
        .map_err(|e| StoreError::io(&temp_path, e))?;
    temp.flush().map_err(|e| StoreError::io(&temp_path, e))?;
    temp.as_file()
        .sync_all()
        .map_err(|e| StoreError::io(&temp_path, e))?;
    temp.persist(path)
        .map_err(|e| StoreError::io(path, e.error))?;

    // Make the rename itself durable. Not supported for directories everywhere.
    if let Err(e) = sync_dir(parent) {
        debug!(dir = %parent.display(), error = %e, "directory fsync skipped");
    }
    Ok(())
}

fn sync_dir(dir: &Path) -> std::io::Result<()> {
    File::open(dir)?.sync_all()
}
