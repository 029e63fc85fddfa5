//! List command handler.

use anyhow::{Context, Result, bail};
use datefetch_core::{AttemptStatus, ProgressStore};

use crate::app::config_runtime::resolve_state_path;
use crate::app_config::FileConfig;
use crate::cli::ListArgs;

pub(crate) fn run_list_command(args: &ListArgs, file_config: &FileConfig) -> Result<()> {
    let path = resolve_state_path(&args.state, file_config);
    if !path.exists() {
        bail!(
            "No progress file at '{}'\n  Suggestion: run `datefetch run` first or pass --state-file",
            path.display()
        );
    }
    let store = ProgressStore::load_read_only(&path)
        .with_context(|| format!("Failed to read progress file '{}'", path.display()))?;

    let lines = render_list(&store, args.failed_only);
    if lines.is_empty() {
        println!("No matching units");
    }
    for line in lines {
        println!("{line}");
    }
    Ok(())
}

/// One line per record: `unit  status  attempts  detail`.
pub(crate) fn render_list(store: &ProgressStore, failed_only: bool) -> Vec<String> {
    store
        .records()
        .filter(|(_, record)| !failed_only || record.status == AttemptStatus::Failed)
        .map(|(unit, record)| {
            let detail = match record.status {
                AttemptStatus::Completed => record
                    .file_path
                    .as_ref()
                    .map(|path| path.display().to_string())
                    .unwrap_or_default(),
                _ => record.error.clone().unwrap_or_default(),
            };
            format!(
                "{unit}  {:<11}  {:>2}  {detail}",
                record.status.as_str(),
                record.attempts
            )
            .trim_end()
            .to_string()
        })
        .collect()
}
