//! Progress survives process exit, crashes mid-attempt and stray temp files.

use std::path::Path;

use datefetch_core::{AttemptStatus, ProgressStore};
use tempfile::TempDir;

use crate::support::fixtures::{ScriptedDownloader, build, day, fast_config, state_path};

#[test]
fn p0_snapshot_persists_after_reopen() {
    let temp_dir = TempDir::new().expect("temp dir");
    let path = state_path(&temp_dir);

    {
        let mut store = ProgressStore::load(&path).expect("open store");
        store.begin("2024-01-01").expect("begin");
        store
            .complete("2024-01-01", Path::new("out/2024-01-01.csv"))
            .expect("complete");
        store.begin("2024-01-02").expect("begin");
        store.fail("2024-01-02", "HTTP 404").expect("fail");
    }

    let store = ProgressStore::load(&path).expect("reopen store");
    let done = store.record("2024-01-01").expect("record");
    assert_eq!(done.status, AttemptStatus::Completed);
    assert_eq!(done.file_path.as_deref(), Some(Path::new("out/2024-01-01.csv")));
    let failed = store.record("2024-01-02").expect("record");
    assert_eq!(failed.status, AttemptStatus::Failed);
    assert_eq!(failed.error.as_deref(), Some("HTTP 404"));
}

#[test]
fn p0_interrupted_temp_write_leaves_previous_snapshot() {
    let temp_dir = TempDir::new().expect("temp dir");
    let path = state_path(&temp_dir);

    {
        let mut store = ProgressStore::load(&path).expect("open store");
        store.begin("2024-01-01").expect("begin");
        store
            .complete("2024-01-01", Path::new("a.csv"))
            .expect("complete");
    }
    let committed = std::fs::read(&path).expect("read committed snapshot");

    // A crash between temp write and rename leaves a half-written sibling.
    let stray = temp_dir.path().join(".datefetch-crash.tmp");
    std::fs::write(&stray, &committed[..committed.len() / 2]).expect("write stray");

    let store = ProgressStore::load(&path).expect("reopen store");
    assert_eq!(store.get_status("2024-01-01"), Some(AttemptStatus::Completed));
    assert_eq!(std::fs::read(&path).expect("read"), committed);
}

#[tokio::test]
async fn p0_crash_mid_attempt_is_retried_on_resume() {
    let temp_dir = TempDir::new().expect("temp dir");
    let path = state_path(&temp_dir);

    // Simulates a process killed after the attempt was recorded.
    {
        let mut store = ProgressStore::load(&path).expect("open store");
        store.begin("2024-01-01").expect("begin");
    }
    {
        let store = ProgressStore::load_read_only(&path).expect("read store");
        assert_eq!(store.get_status("2024-01-01"), Some(AttemptStatus::InProgress));
        assert_eq!(store.attempts("2024-01-01"), 1);
    }

    let downloader = ScriptedDownloader::always_ok(temp_dir.path());
    let orchestrator = build(&temp_dir, downloader.clone(), fast_config());
    let summary = orchestrator
        .run(&day(2024, 1, 1), &day(2024, 1, 1), true)
        .await
        .expect("resumed run");

    assert_eq!(summary.completed, 1);
    assert_eq!(downloader.call_count(), 1);
    let store = orchestrator.store().await;
    assert_eq!(store.get_status("2024-01-01"), Some(AttemptStatus::Completed));
    assert_eq!(store.attempts("2024-01-01"), 2);
}

#[test]
fn p0_lock_released_when_store_dropped() {
    let temp_dir = TempDir::new().expect("temp dir");
    let path = state_path(&temp_dir);

    let first = ProgressStore::load(&path).expect("first open");
    assert!(ProgressStore::load(&path).is_err(), "second writer must be refused");
    drop(first);

    let reopened = ProgressStore::load(&path).expect("open after release");
    assert!(reopened.is_locked());
}
