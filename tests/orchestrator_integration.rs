//! Integration tests for the run orchestrator.
//!
//! Every test drives a scripted downloader over a real progress file in a
//! temp dir, so persistence is exercised end to end.

mod support;

use std::sync::Arc;
use std::time::Duration;

use datefetch_core::orchestrator::ShutdownSignal;
use datefetch_core::{
    AttemptStatus, DownloadError, FileValidator, OrchestratorError, ProgressStore, RetryPolicy,
};
use tempfile::TempDir;

use support::fixtures::{
    Outcome, ScriptedDownloader, build, csv_body, day, fast_config, state_path,
};

// ==================== Completion and Resume ====================

#[tokio::test]
async fn test_range_completes_in_ascending_order() {
    let dir = TempDir::new().expect("temp dir");
    let downloader = ScriptedDownloader::always_ok(dir.path());
    let orchestrator = build(&dir, downloader.clone(), fast_config());

    let summary = orchestrator
        .run(&day(2024, 1, 1), &day(2024, 1, 5), true)
        .await
        .expect("run");

    assert_eq!(summary.total, 5);
    assert_eq!(summary.completed, 5);
    assert_eq!(summary.failed, 0);
    assert!(summary.is_complete());
    assert_eq!(
        downloader.calls(),
        ["2024-01-01", "2024-01-02", "2024-01-03", "2024-01-04", "2024-01-05"]
    );

    let store = orchestrator.store().await;
    let records: Vec<_> = store.records().collect();
    assert_eq!(records.len(), 5);
    for (key, record) in &records {
        assert_eq!(record.status, AttemptStatus::Completed, "{key}");
        assert_eq!(record.attempts, 1, "{key}");
        assert_eq!(
            record.file_path.as_deref(),
            Some(dir.path().join(format!("{key}.csv")).as_path())
        );
    }
    for pair in records.windows(2) {
        assert!(
            pair[0].1.created_at <= pair[1].1.created_at,
            "records must be created in unit order"
        );
    }
}

#[tokio::test]
async fn test_second_resume_run_is_a_no_op() {
    let dir = TempDir::new().expect("temp dir");
    let downloader = ScriptedDownloader::always_ok(dir.path());
    let orchestrator = build(&dir, downloader.clone(), fast_config());

    orchestrator
        .run(&day(2024, 1, 1), &day(2024, 1, 5), true)
        .await
        .expect("first run");
    let before = orchestrator.store().await.snapshot().downloads.clone();

    let second = orchestrator
        .run(&day(2024, 1, 1), &day(2024, 1, 5), true)
        .await
        .expect("second run");

    assert_eq!(second.skipped, 5);
    assert_eq!(second.completed, 0);
    assert_eq!(downloader.call_count(), 5);
    assert_eq!(orchestrator.store().await.snapshot().downloads, before);
}

#[tokio::test]
async fn test_resume_after_restart_only_fetches_missing_units() {
    let dir = TempDir::new().expect("temp dir");
    {
        let downloader = ScriptedDownloader::always_ok(dir.path());
        let orchestrator = build(&dir, downloader, fast_config());
        orchestrator
            .run(&day(2024, 1, 1), &day(2024, 1, 3), true)
            .await
            .expect("first run");
    }

    let downloader = ScriptedDownloader::always_ok(dir.path());
    let orchestrator = build(&dir, downloader.clone(), fast_config());
    let summary = orchestrator
        .run(&day(2024, 1, 1), &day(2024, 1, 5), true)
        .await
        .expect("second run");

    assert_eq!(summary.skipped, 3);
    assert_eq!(summary.completed, 2);
    assert_eq!(downloader.calls(), ["2024-01-04", "2024-01-05"]);
}

// ==================== Retry Exhaustion ====================

#[tokio::test]
async fn test_transient_failures_exhaust_budget_for_every_backoff() {
    let policies = [
        RetryPolicy::fixed(Duration::from_millis(1)),
        RetryPolicy::linear(Duration::from_millis(1)),
        RetryPolicy::exponential(Duration::from_millis(1)),
    ];

    for policy in policies {
        let dir = TempDir::new().expect("temp dir");
        let downloader = ScriptedDownloader::new(dir.path(), |_, call| {
            Outcome::Fail(DownloadError::transient(format!("HTTP 503 on call {call}")))
        });
        let config = fast_config().with_max_retries(3).with_retry_policy(policy.clone());
        let orchestrator = build(&dir, downloader.clone(), config);

        let summary = orchestrator
            .run(&day(2024, 1, 1), &day(2024, 1, 1), true)
            .await
            .expect("run");

        assert_eq!(summary.failed, 1, "{policy:?}");
        assert_eq!(summary.retried, 2, "{policy:?}");
        assert_eq!(downloader.call_count(), 3, "{policy:?}");

        let store = orchestrator.store().await;
        let record = store.record("2024-01-01").expect("record");
        assert_eq!(record.status, AttemptStatus::Failed);
        assert_eq!(record.attempts, 3);
        assert!(record.file_path.is_none());
        assert!(
            record.error.as_deref().is_some_and(|e| e.contains("call 3")),
            "last error is kept: {:?}",
            record.error
        );
    }
}

#[tokio::test]
async fn test_permanent_failure_is_not_retried() {
    let dir = TempDir::new().expect("temp dir");
    let downloader = ScriptedDownloader::new(dir.path(), |_, _| {
        Outcome::Fail(DownloadError::permanent("HTTP 404 Not Found"))
    });
    let orchestrator = build(&dir, downloader.clone(), fast_config().with_max_retries(5));

    let summary = orchestrator
        .run(&day(2024, 1, 1), &day(2024, 1, 2), true)
        .await
        .expect("run");

    assert_eq!(summary.failed, 2);
    assert_eq!(summary.retried, 0);
    assert_eq!(downloader.call_count(), 2);
    assert_eq!(orchestrator.store().await.attempts("2024-01-02"), 1);
}

#[tokio::test]
async fn test_lifetime_budget_across_resumed_runs() {
    let dir = TempDir::new().expect("temp dir");
    {
        let downloader = ScriptedDownloader::new(dir.path(), |_, _| {
            Outcome::Fail(DownloadError::transient("connection reset"))
        });
        let orchestrator = build(&dir, downloader, fast_config().with_max_retries(2));
        orchestrator
            .run(&day(2024, 1, 1), &day(2024, 1, 1), true)
            .await
            .expect("first run");
        assert_eq!(orchestrator.store().await.attempts("2024-01-01"), 2);
    }

    // Raising the cap grants exactly the difference.
    {
        let downloader = ScriptedDownloader::new(dir.path(), |_, _| {
            Outcome::Fail(DownloadError::transient("connection reset"))
        });
        let orchestrator = build(&dir, downloader.clone(), fast_config().with_max_retries(3));
        let summary = orchestrator
            .run(&day(2024, 1, 1), &day(2024, 1, 1), true)
            .await
            .expect("second run");
        assert_eq!(downloader.call_count(), 1);
        assert_eq!(summary.failed, 1);
        assert_eq!(orchestrator.store().await.attempts("2024-01-01"), 3);
    }

    let downloader = ScriptedDownloader::always_ok(dir.path());
    let orchestrator = build(&dir, downloader.clone(), fast_config().with_max_retries(3));
    let summary = orchestrator
        .run(&day(2024, 1, 1), &day(2024, 1, 1), true)
        .await
        .expect("third run");

    assert_eq!(summary.abandoned, 1);
    assert_eq!(summary.unsuccessful(), 1);
    assert_eq!(downloader.call_count(), 0);
    let store = orchestrator.store().await;
    assert_eq!(store.get_status("2024-01-01"), Some(AttemptStatus::Failed));
    assert_eq!(store.attempts("2024-01-01"), 3);
}

#[tokio::test]
async fn test_no_resume_grants_fresh_budget_to_failed_unit() {
    let dir = TempDir::new().expect("temp dir");
    {
        let downloader = ScriptedDownloader::new(dir.path(), |_, _| {
            Outcome::Fail(DownloadError::transient("connection reset"))
        });
        let orchestrator = build(&dir, downloader, fast_config().with_max_retries(2));
        orchestrator
            .run(&day(2024, 1, 1), &day(2024, 1, 1), true)
            .await
            .expect("first run");
    }

    let downloader = ScriptedDownloader::new(dir.path(), |_, call| {
        if call == 1 {
            Outcome::Fail(DownloadError::transient("connection reset"))
        } else {
            Outcome::Write(csv_body())
        }
    });
    let orchestrator = build(&dir, downloader.clone(), fast_config().with_max_retries(2));
    let summary = orchestrator
        .run(&day(2024, 1, 1), &day(2024, 1, 1), false)
        .await
        .expect("second run");

    assert_eq!(summary.completed, 1);
    assert_eq!(downloader.call_count(), 2);
    let store = orchestrator.store().await;
    assert_eq!(store.get_status("2024-01-01"), Some(AttemptStatus::Completed));
    assert_eq!(store.attempts("2024-01-01"), 4);
}

// ==================== Fatal Halt ====================

#[tokio::test]
async fn test_fatal_error_halts_before_later_units() {
    let dir = TempDir::new().expect("temp dir");
    let downloader = ScriptedDownloader::new(dir.path(), |key, _| {
        if key == "3" {
            Outcome::Fail(DownloadError::auth_required("https://example.com/3", 401))
        } else {
            Outcome::Write(csv_body())
        }
    });
    let orchestrator = build::<u32>(&dir, downloader.clone(), fast_config().with_max_retries(5));

    let err = orchestrator.run(&1, &10, true).await.unwrap_err();

    let OrchestratorError::Fatal { unit, message, summary } = err else {
        panic!("expected fatal halt, got {err:?}");
    };
    assert_eq!(unit, "3");
    assert!(message.contains("HTTP 401"));
    assert_eq!(summary.completed, 2);
    assert_eq!(summary.pending, 8);
    assert_eq!(downloader.calls(), ["1", "2", "3"]);

    let store = orchestrator.store().await;
    assert_eq!(store.get_status("1"), Some(AttemptStatus::Completed));
    assert_eq!(store.get_status("2"), Some(AttemptStatus::Completed));
    assert_eq!(store.get_status("3"), Some(AttemptStatus::InProgress));
    assert_eq!(store.attempts("3"), 1);
    for later in 4..=10 {
        assert!(store.record(&later.to_string()).is_none(), "unit {later}");
    }
}

#[tokio::test]
async fn test_fatal_halt_is_resumable() {
    let dir = TempDir::new().expect("temp dir");
    {
        let downloader = ScriptedDownloader::new(dir.path(), |key, _| {
            if key == "2" {
                Outcome::Fail(DownloadError::fatal("bad template"))
            } else {
                Outcome::Write(csv_body())
            }
        });
        let orchestrator = build::<u32>(&dir, downloader, fast_config());
        assert!(orchestrator.run(&1, &3, true).await.is_err());
    }

    let downloader = ScriptedDownloader::always_ok(dir.path());
    let orchestrator = build::<u32>(&dir, downloader.clone(), fast_config());
    let summary = orchestrator.run(&1, &3, true).await.expect("resumed run");

    assert_eq!(summary.skipped, 1);
    assert_eq!(summary.completed, 2);
    assert_eq!(downloader.calls(), ["2", "3"]);
    assert_eq!(orchestrator.store().await.attempts("2"), 2);
}

// ==================== Validation and Timeouts ====================

#[tokio::test]
async fn test_validation_failure_retries_then_fails() {
    let dir = TempDir::new().expect("temp dir");
    let downloader = ScriptedDownloader::new(dir.path(), |_, _| Outcome::Write(b"tiny".to_vec()));
    let orchestrator = build(&dir, downloader.clone(), fast_config().with_max_retries(2))
        .with_validator(Arc::new(FileValidator::new(100)));

    let summary = orchestrator
        .run(&day(2024, 1, 1), &day(2024, 1, 1), true)
        .await
        .expect("run");

    assert_eq!(summary.failed, 1);
    assert_eq!(downloader.call_count(), 2);
    let store = orchestrator.store().await;
    let record = store.record("2024-01-01").expect("record");
    assert_eq!(record.status, AttemptStatus::Failed);
    assert!(record.error.as_deref().is_some_and(|e| e.contains("validation failed")));
}

#[tokio::test]
async fn test_validation_disabled_accepts_small_files() {
    let dir = TempDir::new().expect("temp dir");
    let downloader = ScriptedDownloader::new(dir.path(), |_, _| Outcome::Write(b"tiny".to_vec()));
    let orchestrator = build(&dir, downloader, fast_config().with_validation(false))
        .with_validator(Arc::new(FileValidator::new(100)));

    let summary = orchestrator
        .run(&day(2024, 1, 1), &day(2024, 1, 1), true)
        .await
        .expect("run");
    assert_eq!(summary.completed, 1);
}

#[tokio::test]
async fn test_hung_download_times_out_as_transient() {
    let dir = TempDir::new().expect("temp dir");
    let downloader = ScriptedDownloader::new(dir.path(), |_, call| {
        if call == 1 { Outcome::Hang } else { Outcome::Write(csv_body()) }
    });
    let config = fast_config()
        .with_max_retries(2)
        .with_download_timeout(Duration::from_millis(50));
    let orchestrator = build(&dir, downloader.clone(), config);

    let summary = orchestrator
        .run(&day(2024, 1, 1), &day(2024, 1, 1), true)
        .await
        .expect("run");

    assert_eq!(summary.completed, 1);
    assert_eq!(summary.retried, 1);
    assert_eq!(downloader.call_count(), 2);
}

// ==================== Stop Signal ====================

#[tokio::test]
async fn test_stop_request_leaves_later_units_untouched() {
    let dir = TempDir::new().expect("temp dir");
    let shutdown = ShutdownSignal::shared();
    let trigger = Arc::clone(&shutdown);
    let downloader = ScriptedDownloader::new(dir.path(), move |key, _| {
        if key == "3" {
            trigger.request_shutdown();
        }
        Outcome::Write(csv_body())
    });
    let orchestrator =
        build::<u32>(&dir, downloader.clone(), fast_config()).with_shutdown(shutdown);

    let summary = orchestrator.run(&1, &6, true).await.expect("run");

    assert!(summary.interrupted);
    assert_eq!(summary.completed, 3);
    assert_eq!(summary.pending, 3);
    assert_eq!(downloader.calls(), ["1", "2", "3"]);
    let store = orchestrator.store().await;
    assert_eq!(store.get_status("3"), Some(AttemptStatus::Completed));
    assert!(store.record("4").is_none());
}

#[tokio::test]
async fn test_stop_during_retry_wait_leaves_unit_in_progress() {
    let dir = TempDir::new().expect("temp dir");
    let shutdown = ShutdownSignal::shared();
    let trigger = Arc::clone(&shutdown);
    let downloader = ScriptedDownloader::new(dir.path(), move |_, _| {
        trigger.request_shutdown();
        Outcome::Fail(DownloadError::transient("HTTP 502"))
    });
    let config = fast_config()
        .with_max_retries(3)
        .with_retry_policy(RetryPolicy::fixed(Duration::from_secs(60)));
    let orchestrator = build::<u32>(&dir, downloader.clone(), config).with_shutdown(shutdown);

    let summary = tokio::time::timeout(Duration::from_secs(5), orchestrator.run(&1, &2, true))
        .await
        .expect("stop must cut the retry wait short")
        .expect("run");

    assert!(summary.interrupted);
    assert_eq!(downloader.call_count(), 1);
    let store = orchestrator.store().await;
    assert_eq!(store.get_status("1"), Some(AttemptStatus::InProgress));
    assert_eq!(store.attempts("1"), 1);
    assert!(store.record("2").is_none());
}

// ==================== Concurrency ====================

#[tokio::test]
async fn test_concurrency_bounds_units_in_flight() {
    let dir = TempDir::new().expect("temp dir");
    let downloader =
        ScriptedDownloader::with_latency(dir.path(), Duration::from_millis(30), |_, _| {
            Outcome::Write(csv_body())
        });
    let orchestrator = build::<u32>(&dir, downloader.clone(), fast_config().with_concurrency(4));

    let summary = orchestrator.run(&1, &12, true).await.expect("run");

    assert_eq!(summary.completed, 12);
    assert!(downloader.max_in_flight() <= 4, "max {}", downloader.max_in_flight());
    assert!(downloader.max_in_flight() >= 2, "max {}", downloader.max_in_flight());
    assert_eq!(orchestrator.store().await.completed_units().len(), 12);
}

#[tokio::test]
async fn test_concurrent_fatal_still_halts_dispatch() {
    let dir = TempDir::new().expect("temp dir");
    let downloader = ScriptedDownloader::with_latency(dir.path(), Duration::from_millis(5), |key, _| {
        if key == "2" {
            Outcome::Fail(DownloadError::fatal("credentials rejected"))
        } else {
            Outcome::Write(csv_body())
        }
    });
    let orchestrator = build::<u32>(&dir, downloader.clone(), fast_config().with_concurrency(2));

    let err = orchestrator.run(&1, &50, true).await.unwrap_err();
    assert!(matches!(err, OrchestratorError::Fatal { ref unit, .. } if unit == "2"));
    assert!(downloader.call_count() < 50);
}

#[tokio::test]
async fn test_concurrent_fatal_cuts_sibling_retry_wait_short() {
    let dir = TempDir::new().expect("temp dir");
    let downloader = ScriptedDownloader::with_latency(dir.path(), Duration::from_millis(20), |key, _| {
        if key == "2" {
            Outcome::Fail(DownloadError::fatal("credentials rejected"))
        } else {
            Outcome::Fail(DownloadError::transient("connection reset"))
        }
    });
    let config = fast_config()
        .with_retry_policy(RetryPolicy::fixed(Duration::from_secs(3)))
        .with_concurrency(2);
    let orchestrator = build::<u32>(&dir, downloader.clone(), config);

    let started = std::time::Instant::now();
    let err = orchestrator.run(&1, &10, true).await.unwrap_err();

    assert!(matches!(err, OrchestratorError::Fatal { ref unit, .. } if unit == "2"));
    assert!(
        started.elapsed() < Duration::from_secs(2),
        "halt waited {:?}",
        started.elapsed()
    );
    let sibling_calls = downloader.calls().iter().filter(|key| key.as_str() == "1").count();
    assert!(sibling_calls <= 1, "unit 1 retried {sibling_calls} times after the halt");

    let store = orchestrator.store().await;
    assert_ne!(store.get_status("1"), Some(AttemptStatus::Failed));
    assert!(store.record("3").is_none());
}

// ==================== Rate Limiting ====================

#[tokio::test]
async fn test_rate_limited_attempt_penalizes_shared_limiter() {
    let dir = TempDir::new().expect("temp dir");
    let downloader = ScriptedDownloader::new(dir.path(), |_, call| {
        if call == 1 {
            Outcome::Fail(DownloadError::rate_limited(
                "HTTP 429",
                Some(Duration::from_millis(20)),
            ))
        } else {
            Outcome::Write(csv_body())
        }
    });
    let limiter = support::fixtures::fast_limiter();
    let store = ProgressStore::load(state_path(&dir)).expect("store");
    let orchestrator = datefetch_core::Orchestrator::new(
        fast_config(),
        downloader.clone(),
        Arc::clone(&limiter),
        store,
    )
    .expect("orchestrator");

    let summary = orchestrator
        .run(&day(2024, 1, 1), &day(2024, 1, 1), true)
        .await
        .expect("run");

    assert_eq!(summary.completed, 1);
    assert_eq!(downloader.call_count(), 2);
    // One success is short of the recovery streak, so the penalty holds.
    assert_eq!(limiter.extra_delay(), Duration::from_millis(20));
}

// ==================== Range Errors ====================

#[tokio::test]
async fn test_inverted_range_touches_nothing() {
    let dir = TempDir::new().expect("temp dir");
    let downloader = ScriptedDownloader::always_ok(dir.path());
    let orchestrator = build(&dir, downloader.clone(), fast_config());

    let err = orchestrator
        .run(&day(2024, 1, 5), &day(2024, 1, 1), true)
        .await
        .unwrap_err();

    assert!(matches!(err, OrchestratorError::InvalidRange(_)));
    assert_eq!(downloader.call_count(), 0);
    assert_eq!(orchestrator.progress_summary().await.total, 0);
}
