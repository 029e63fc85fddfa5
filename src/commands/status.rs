//! Status command handler.

use std::fmt::Write as _;

use anyhow::{Context, Result, bail};
use datefetch_core::ProgressStore;

use crate::app::config_runtime::resolve_state_path;
use crate::app_config::FileConfig;
use crate::cli::StateArgs;

const MAX_FAILED_SHOWN: usize = 10;

pub(crate) fn run_status_command(args: &StateArgs, file_config: &FileConfig) -> Result<()> {
    let path = resolve_state_path(args, file_config);
    if !path.exists() {
        bail!(
            "No progress file at '{}'\n  Suggestion: run `datefetch run` first or pass --state-file",
            path.display()
        );
    }
    let store = ProgressStore::load_read_only(&path)
        .with_context(|| format!("Failed to read progress file '{}'", path.display()))?;
    print!("{}", render_status(&store));
    Ok(())
}

/// Formats counts, timestamps and the first few failures.
pub(crate) fn render_status(store: &ProgressStore) -> String {
    let summary = store.summary();
    let snapshot = store.snapshot();
    let mut out = String::new();

    let _ = writeln!(out, "Progress file: {}", store.path().display());
    let _ = writeln!(out, "Created:       {}", snapshot.created_at.format("%Y-%m-%d %H:%M:%S"));
    let _ = writeln!(out, "Last updated:  {}", snapshot.last_updated.format("%Y-%m-%d %H:%M:%S"));
    let _ = writeln!(out);
    let _ = writeln!(out, "Total:       {}", summary.total);
    let _ = writeln!(out, "Completed:   {}", summary.completed);
    let _ = writeln!(out, "Failed:      {}", summary.failed);
    let _ = writeln!(out, "In progress: {}", summary.in_progress);
    let _ = writeln!(out, "Pending:     {}", summary.pending);
    let _ = writeln!(out, "Success rate: {:.1}%", summary.success_rate());

    let failed = store.failed_units();
    if !failed.is_empty() {
        let _ = writeln!(out);
        let _ = writeln!(out, "Failed units:");
        for unit in failed.iter().take(MAX_FAILED_SHOWN) {
            let error = store
                .record(unit)
                .and_then(|record| record.error.as_deref())
                .unwrap_or("unknown error");
            let _ = writeln!(out, "  {unit}: {error}");
        }
        if failed.len() > MAX_FAILED_SHOWN {
            let _ = writeln!(
                out,
                "  ... and {} more (see `datefetch list --failed-only`)",
                failed.len() - MAX_FAILED_SHOWN
            );
        }
    }
    out
}
