//! Scripted downloader and orchestrator builders.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use datefetch_core::{
    DownloadError, Downloader, Orchestrator, OrchestratorConfig, ProgressStore, RateLimiter,
    RetryPolicy, WorkUnit,
};
use tempfile::TempDir;

/// What one scripted attempt does.
pub enum Outcome {
    /// Write these bytes to `<dir>/<unit>.csv` and return the path.
    Write(Vec<u8>),
    /// Return this error.
    Fail(DownloadError),
    /// Never finish.
    Hang,
}

/// Good CSV body, comfortably above the default size floor.
pub fn csv_body() -> Vec<u8> {
    let mut body = b"date,open,close\n".to_vec();
    for i in 0..10 {
        body.extend_from_slice(format!("2024-01-01,{i}.50,{i}.75\n").as_bytes());
    }
    body
}

type Script = dyn Fn(&str, u32) -> Outcome + Send + Sync;

/// Downloader driven by a closure of `(unit key, 1-based call number for that unit)`.
pub struct ScriptedDownloader {
    dir: PathBuf,
    script: Box<Script>,
    latency: Duration,
    calls: Mutex<Vec<String>>,
    per_unit: Mutex<HashMap<String, u32>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl ScriptedDownloader {
    pub fn new(
        dir: &Path,
        script: impl Fn(&str, u32) -> Outcome + Send + Sync + 'static,
    ) -> Arc<Self> {
        Self::with_latency(dir, Duration::ZERO, script)
    }

    pub fn with_latency(
        dir: &Path,
        latency: Duration,
        script: impl Fn(&str, u32) -> Outcome + Send + Sync + 'static,
    ) -> Arc<Self> {
        Arc::new(Self {
            dir: dir.to_path_buf(),
            script: Box::new(script),
            latency,
            calls: Mutex::new(Vec::new()),
            per_unit: Mutex::new(HashMap::new()),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        })
    }

    /// Always succeeds with [`csv_body`].
    pub fn always_ok(dir: &Path) -> Arc<Self> {
        Self::new(dir, |_, _| Outcome::Write(csv_body()))
    }

    /// Unit keys in call order, one entry per attempt.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl<U: WorkUnit> Downloader<U> for ScriptedDownloader {
    async fn download(&self, unit: &U) -> Result<PathBuf, DownloadError> {
        let key = unit.to_string();
        self.calls.lock().unwrap().push(key.clone());
        let call = {
            let mut per_unit = self.per_unit.lock().unwrap();
            let count = per_unit.entry(key.clone()).or_insert(0);
            *count += 1;
            *count
        };

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        let outcome = (self.script)(&key, call);
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        match outcome {
            Outcome::Write(bytes) => {
                let path = self.dir.join(format!("{key}.csv"));
                std::fs::write(&path, bytes).unwrap();
                Ok(path)
            }
            Outcome::Fail(error) => Err(error),
            Outcome::Hang => std::future::pending().await,
        }
    }
}

pub fn day(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).unwrap()
}

pub fn state_path(dir: &TempDir) -> PathBuf {
    dir.path().join("state.json")
}

/// Millisecond retry delays so retry paths finish quickly.
pub fn fast_config() -> OrchestratorConfig {
    OrchestratorConfig::default()
        .with_retry_policy(RetryPolicy::fixed(Duration::from_millis(2)))
        .with_download_timeout(Duration::from_secs(5))
}

pub fn fast_limiter() -> Arc<RateLimiter> {
    Arc::new(RateLimiter::with_requests_per_minute(1000))
}

/// Builds an orchestrator over a fresh store at `state_path(dir)`.
pub fn build<U: WorkUnit>(
    dir: &TempDir,
    downloader: Arc<ScriptedDownloader>,
    config: OrchestratorConfig,
) -> Orchestrator<U> {
    let store = ProgressStore::load(state_path(dir)).unwrap();
    Orchestrator::new(config, downloader, fast_limiter(), store).unwrap()
}
