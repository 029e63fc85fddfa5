//! Merges CLI flags, file config and built-in defaults into run settings.
//!
//! Priority for every value: CLI flag > config file > default.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Result, bail};
use datefetch_core::download::{DEFAULT_MAX_RETRIES, DEFAULT_REQUESTS_PER_MINUTE, DEFAULT_RETRY_DELAY};
use datefetch_core::orchestrator::{DEFAULT_CONCURRENCY, DEFAULT_DOWNLOAD_TIMEOUT};
use datefetch_core::validate::{CsvRules, DEFAULT_MIN_FILE_SIZE, DEFAULT_MIN_ROWS};
use datefetch_core::{Backoff, OrchestratorConfig, RetryPolicy};

use crate::app_config::FileConfig;
use crate::cli::{RunArgs, StateArgs};

pub(crate) const DEFAULT_OUTPUT_DIR: &str = "downloads";
pub(crate) const DEFAULT_STATE_FILE_NAME: &str = "datefetch_state.json";

pub(crate) fn resolve_output_dir(args: &StateArgs, file: &FileConfig) -> PathBuf {
    args.output_dir
        .clone()
        .or_else(|| file.output_dir.clone())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_DIR))
}

/// Progress file: explicit path, else `<output_dir>/datefetch_state.json`.
pub(crate) fn resolve_state_path(args: &StateArgs, file: &FileConfig) -> PathBuf {
    args.state_file
        .clone()
        .or_else(|| file.state_file.clone())
        .unwrap_or_else(|| resolve_output_dir(args, file).join(DEFAULT_STATE_FILE_NAME))
}

/// Fully resolved inputs for `datefetch run`.
#[derive(Debug, Clone)]
pub(crate) struct RunSettings {
    pub(crate) url_template: String,
    pub(crate) filename_template: Option<String>,
    pub(crate) output_dir: PathBuf,
    pub(crate) state_file: PathBuf,
    pub(crate) resume: bool,
    pub(crate) requests_per_minute: u32,
    pub(crate) min_file_size: u64,
    pub(crate) csv_rules: Option<CsvRules>,
    pub(crate) orchestrator: OrchestratorConfig,
}

impl RunSettings {
    pub(crate) fn resolve(args: &RunArgs, file: &FileConfig) -> Result<Self> {
        let Some(url_template) = args
            .url_template
            .clone()
            .or_else(|| file.url_template.clone())
        else {
            bail!(
                "No URL template given\n  Suggestion: pass --url-template 'https://host/path/{{unit}}.csv' or set url_template in the config file"
            );
        };

        let backoff = args
            .backoff
            .map(Backoff::from)
            .or(file.backoff)
            .unwrap_or_else(|| RetryPolicy::default().backoff());
        let retry_delay = args
            .retry_delay_secs
            .or(file.retry_delay_secs)
            .map_or(DEFAULT_RETRY_DELAY, Duration::from_secs);
        let download_timeout = args
            .download_timeout_secs
            .or(file.download_timeout_secs)
            .map_or(DEFAULT_DOWNLOAD_TIMEOUT, Duration::from_secs);
        let concurrency = args
            .concurrency
            .or(file.concurrency)
            .map_or(DEFAULT_CONCURRENCY, usize::from);
        let validate = !args.no_validate && file.validate.unwrap_or(true);

        let orchestrator = OrchestratorConfig::default()
            .with_max_retries(
                args.max_retries
                    .or(file.max_retries)
                    .unwrap_or(DEFAULT_MAX_RETRIES),
            )
            .with_retry_policy(RetryPolicy::new(backoff, retry_delay))
            .with_validation(validate)
            .with_download_timeout(download_timeout)
            .with_concurrency(concurrency);

        let required_columns = if args.require_columns.is_empty() {
            file.require_columns.clone().unwrap_or_default()
        } else {
            args.require_columns.clone()
        };
        let min_rows = args.min_rows.or(file.min_rows);
        // Column or row requirements only make sense for a table.
        let tabular = args.tabular
            || file.tabular.unwrap_or(false)
            || !required_columns.is_empty()
            || min_rows.is_some();
        let csv_rules = tabular.then(|| CsvRules {
            required_columns,
            min_rows: min_rows.unwrap_or(DEFAULT_MIN_ROWS),
        });

        Ok(Self {
            url_template,
            filename_template: args
                .filename_template
                .clone()
                .or_else(|| file.filename_template.clone()),
            output_dir: resolve_output_dir(&args.state, file),
            state_file: resolve_state_path(&args.state, file),
            resume: !args.no_resume,
            requests_per_minute: args
                .requests_per_minute
                .or(file.requests_per_minute)
                .unwrap_or(DEFAULT_REQUESTS_PER_MINUTE),
            min_file_size: args
                .min_file_size
                .or(file.min_file_size)
                .unwrap_or(DEFAULT_MIN_FILE_SIZE),
            csv_rules,
            orchestrator,
        })
    }
}
