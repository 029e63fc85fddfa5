//! Progress bar for download runs.

use std::time::Duration;

use datefetch_core::orchestrator::{RunObserver, UnitOutcome};
use datefetch_core::RunSummary;
use indicatif::{ProgressBar, ProgressStyle};

const TEMPLATE: &str = "{spinner} [{elapsed_precise}] {bar:30} {pos}/{len} {msg}";

/// Drives an indicatif bar from orchestrator events.
///
/// Skipped and finished units both advance the bar, so it reaches `len`
/// exactly when every unit in range has been accounted for.
#[derive(Debug)]
pub(crate) struct ProgressReporter {
    bar: ProgressBar,
}

impl ProgressReporter {
    /// Creates a reporter drawing to stderr.
    pub(crate) fn stderr() -> Self {
        let bar = ProgressBar::new(0);
        bar.set_style(
            ProgressStyle::with_template(TEMPLATE)
                .unwrap_or_else(|_| ProgressStyle::default_bar()),
        );
        bar.enable_steady_tick(Duration::from_millis(120));
        Self { bar }
    }

    #[cfg(test)]
    fn hidden() -> Self {
        Self {
            bar: ProgressBar::hidden(),
        }
    }
}

impl RunObserver for ProgressReporter {
    fn run_started(&self, total: usize) {
        self.bar.set_length(u64::try_from(total).unwrap_or(u64::MAX));
    }

    fn unit_skipped(&self, _unit: &str) {
        self.bar.inc(1);
    }

    fn unit_started(&self, unit: &str, attempt: u32) {
        if attempt > 1 {
            self.bar.set_message(format!("{unit} (attempt {attempt})"));
        } else {
            self.bar.set_message(unit.to_string());
        }
    }

    fn unit_retrying(&self, unit: &str, attempt: u32, delay: Duration, _error: &str) {
        self.bar.set_message(format!(
            "{unit} failed attempt {attempt}, retrying in {}s",
            delay.as_secs()
        ));
    }

    fn unit_finished(&self, _unit: &str, _outcome: &UnitOutcome) {
        self.bar.inc(1);
    }

    fn run_finished(&self, _summary: &RunSummary) {
        self.bar.finish_and_clear();
    }
}

impl Drop for ProgressReporter {
    fn drop(&mut self) {
        // A halted run never reaches run_finished.
        if !self.bar.is_finished() {
            self.bar.finish_and_clear();
        }
    }
}
