//! Unreadable progress files are reported and never overwritten.

use datefetch_core::{AttemptStatus, ProgressStore, StoreError};
use tempfile::TempDir;

use crate::support::fixtures::state_path;

fn assert_corrupt_and_untouched(contents: &[u8]) {
    let temp_dir = TempDir::new().expect("temp dir");
    let path = state_path(&temp_dir);
    std::fs::write(&path, contents).expect("write fixture");

    let err = ProgressStore::load(&path).unwrap_err();
    assert!(
        matches!(err, StoreError::CorruptState { .. }),
        "expected corrupt state, got {err:?}"
    );
    assert_eq!(std::fs::read(&path).expect("read back"), contents);
}

#[test]
fn p0_garbage_file_is_rejected_untouched() {
    assert_corrupt_and_untouched(b"\x00\x01 not json at all");
}

#[test]
fn p0_truncated_snapshot_is_rejected_untouched() {
    let truncated = br#"{"created_at":"2024-01-01T00:00:00","last_updated":"2024-01-01T00:00:00","downloads":{"2024-01-01":{"status":"completed","attempts":1"#;
    assert_corrupt_and_untouched(truncated);
}

#[test]
fn p0_empty_file_is_rejected_untouched() {
    assert_corrupt_and_untouched(b"");
}

#[test]
fn p0_unknown_status_is_rejected() {
    assert_corrupt_and_untouched(
        br#"{"created_at":"2024-01-01T00:00:00","downloads":{"2024-01-01":{"status":"exploded","created_at":"2024-01-01T00:00:00"}}}"#,
    );
}

#[test]
fn p0_corrupt_error_names_the_file() {
    let temp_dir = TempDir::new().expect("temp dir");
    let path = state_path(&temp_dir);
    std::fs::write(&path, b"{").expect("write fixture");

    let message = ProgressStore::load_read_only(&path).unwrap_err().to_string();
    assert!(message.contains("state.json"), "{message}");
}

#[test]
fn p0_legacy_snapshot_still_loads() {
    let temp_dir = TempDir::new().expect("temp dir");
    let path = state_path(&temp_dir);
    std::fs::write(
        &path,
        br#"{
  "created_at": "2023-06-01T08:00:00",
  "last_updated": "2023-06-01T09:00:00",
  "downloads": {
    "2023-06-01": {"status": "completed", "file_path": "d/2023-06-01.csv", "created_at": "2023-06-01T08:00:01"},
    "2023-06-02": {"status": "skipped", "created_at": "2023-06-01T08:00:02"}
  },
  "metadata": {}
}"#,
    )
    .expect("write fixture");

    let store = ProgressStore::load(&path).expect("legacy load");
    assert_eq!(store.get_status("2023-06-01"), Some(AttemptStatus::Completed));
    assert_eq!(store.attempts("2023-06-01"), 0);
    assert_eq!(store.get_status("2023-06-02"), Some(AttemptStatus::Pending));
}
