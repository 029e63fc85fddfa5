//! Run command handler: download a date range.

use std::io::IsTerminal;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use datefetch_core::orchestrator::{NoopObserver, RunObserver, ShutdownSignal};
use datefetch_core::{
    FileValidator, HttpDownloader, Orchestrator, OrchestratorError, ProgressStore, RateLimiter,
    RateLimiterConfig, RunSummary, units_between,
};
use tracing::{debug, info, warn};

use crate::app::config_runtime::RunSettings;
use crate::app::exit_handler::{ProcessExit, determine_exit_outcome};
use crate::app::progress_manager::ProgressReporter;
use crate::app::terminal;
use crate::app_config::FileConfig;
use crate::cli::RunArgs;

pub(crate) async fn run_download_command(
    args: &RunArgs,
    file_config: &FileConfig,
    quiet: bool,
) -> Result<ProcessExit> {
    let settings = RunSettings::resolve(args, file_config)?;
    debug!(?settings, "resolved run settings");
    // Reject a bad range before the progress file is created or locked.
    let total = units_between(&args.start, &args.end)?.len();

    let mut downloader = HttpDownloader::new(settings.url_template.clone(), &settings.output_dir)?;
    if let Some(template) = &settings.filename_template {
        downloader = downloader.with_filename_template(template.clone());
    }

    let mut store = ProgressStore::load(&settings.state_file).with_context(|| {
        format!("Failed to open progress file '{}'", settings.state_file.display())
    })?;
    store.set_metadata("url_template", settings.url_template.clone().into())?;

    let mut validator = FileValidator::new(settings.min_file_size);
    if let Some(rules) = settings.csv_rules.clone() {
        validator = validator.with_csv_rules(rules);
    }

    let rate_limiter = Arc::new(RateLimiter::new(RateLimiterConfig {
        requests_per_minute: settings.requests_per_minute,
        ..RateLimiterConfig::default()
    }));

    let shutdown = ShutdownSignal::shared();
    let observer: Arc<dyn RunObserver> = if terminal::should_use_progress_bar(
        std::io::stderr().is_terminal(),
        quiet,
        terminal::is_dumb_terminal(),
    ) {
        Arc::new(ProgressReporter::stderr())
    } else {
        Arc::new(NoopObserver)
    };

    let orchestrator = Orchestrator::<NaiveDate>::new(
        settings.orchestrator.clone(),
        Arc::new(downloader),
        rate_limiter,
        store,
    )?
    .with_validator(Arc::new(validator))
    .with_shutdown(Arc::clone(&shutdown))
    .with_observer(observer);

    let ctrl_c = tokio::spawn({
        let shutdown = Arc::clone(&shutdown);
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("stop requested, finishing in-flight downloads");
                shutdown.request_shutdown();
            }
        }
    });

    info!(
        start = %args.start,
        end = %args.end,
        total,
        state_file = %settings.state_file.display(),
        "starting download run"
    );
    let result = orchestrator
        .run(&args.start, &args.end, settings.resume)
        .await;
    ctrl_c.abort();

    match result {
        Ok(summary) => {
            print!("{}", render_run_summary(&summary));
            Ok(determine_exit_outcome(&summary))
        }
        Err(OrchestratorError::Fatal {
            unit,
            message,
            summary,
        }) => {
            print!("{}", render_run_summary(&summary));
            eprintln!("Run halted at {unit}: {message}");
            eprintln!("Resume point: {unit} (rerun the same command to continue)");
            Ok(ProcessExit::Failure)
        }
        Err(e) => Err(e.into()),
    }
}

/// Renders the end-of-run report.
pub(crate) fn render_run_summary(summary: &RunSummary) -> String {
    let mut out = format!(
        "Total: {}  Completed: {}  Failed: {}  Skipped: {}  Pending: {}\n",
        summary.total, summary.completed, summary.failed, summary.skipped, summary.pending
    );
    if summary.abandoned > 0 {
        out.push_str(&format!(
            "Abandoned (attempt budget spent): {}\n",
            summary.abandoned
        ));
    }
    if summary.retried > 0 {
        out.push_str(&format!("Retries: {}\n", summary.retried));
    }
    if summary.interrupted {
        out.push_str("Interrupted: remaining dates were left pending\n");
    }
    out
}
