//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand, ValueEnum};
use datefetch_core::Backoff;

/// Resumable, rate-limited downloads over a date range.
///
/// Each date is fetched from a URL template, validated, and recorded in a
/// progress file so interrupted runs pick up where they stopped.
#[derive(Parser, Debug)]
#[command(name = "datefetch")]
#[command(author, version, about)]
pub struct Cli {
    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Config file (default: $XDG_CONFIG_HOME/datefetch/config.toml)
    #[arg(long, value_name = "PATH", global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Top-level subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Download every date in a range, skipping completed ones
    Run(RunArgs),
    /// Show progress counts for a progress file
    Status(StateArgs),
    /// List recorded units
    List(ListArgs),
    /// Clear all recorded progress
    Reset(ResetArgs),
}

/// Locates the progress file.
#[derive(Args, Debug, Clone, Default)]
pub struct StateArgs {
    /// Progress file (default: <output-dir>/datefetch_state.json)
    #[arg(long, value_name = "PATH")]
    pub state_file: Option<PathBuf>,

    /// Directory for downloaded files (default: ./downloads)
    #[arg(short, long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,
}

/// Arguments for `datefetch run`.
#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    /// First date to fetch (YYYY-MM-DD, inclusive)
    #[arg(long, value_name = "DATE")]
    pub start: NaiveDate,

    /// Last date to fetch (YYYY-MM-DD, inclusive)
    #[arg(long, value_name = "DATE")]
    pub end: NaiveDate,

    /// URL template containing {unit}, e.g. https://host/data/{unit}.csv
    #[arg(short = 'u', long, value_name = "TEMPLATE")]
    pub url_template: Option<String>,

    /// File name template containing {unit} (default: {unit}.csv)
    #[arg(long, value_name = "TEMPLATE")]
    pub filename_template: Option<String>,

    #[command(flatten)]
    pub state: StateArgs,

    /// Re-fetch dates already marked completed
    #[arg(long)]
    pub no_resume: bool,

    /// Skip artifact validation
    #[arg(long)]
    pub no_validate: bool,

    /// Attempts per date before giving up (1-10)
    #[arg(short = 'r', long, value_parser = clap::value_parser!(u32).range(1..=10))]
    pub max_retries: Option<u32>,

    /// Request budget per minute (1-1000)
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..=1000))]
    pub requests_per_minute: Option<u32>,

    /// Base delay between attempts in seconds (0-3600)
    #[arg(long, value_parser = clap::value_parser!(u64).range(0..=3600))]
    pub retry_delay_secs: Option<u64>,

    /// Delay growth between attempts
    #[arg(long, value_enum)]
    pub backoff: Option<BackoffArg>,

    /// Dates downloaded at the same time (1-100)
    #[arg(short = 'c', long, value_parser = clap::value_parser!(u8).range(1..=100))]
    pub concurrency: Option<u8>,

    /// Time budget per download attempt in seconds (1-3600)
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..=3600))]
    pub download_timeout_secs: Option<u64>,

    /// Minimum accepted file size in bytes
    #[arg(long, value_name = "BYTES")]
    pub min_file_size: Option<u64>,

    /// Reject files that do not parse as a ',' or ';' delimited table
    #[arg(long)]
    pub tabular: bool,

    /// Header columns every CSV must contain (comma separated, implies --tabular)
    #[arg(long, value_delimiter = ',', value_name = "COLUMNS")]
    pub require_columns: Vec<String>,

    /// Minimum data rows below the header (implies --tabular)
    #[arg(long, value_name = "ROWS")]
    pub min_rows: Option<usize>,

    /// Exit with code 2 when some dates failed
    #[arg(long)]
    pub strict: bool,
}

/// Arguments for `datefetch list`.
#[derive(Args, Debug, Clone)]
pub struct ListArgs {
    #[command(flatten)]
    pub state: StateArgs,

    /// Only show failed units
    #[arg(long)]
    pub failed_only: bool,
}

/// Arguments for `datefetch reset`.
#[derive(Args, Debug, Clone)]
pub struct ResetArgs {
    #[command(flatten)]
    pub state: StateArgs,

    /// Do not ask for confirmation
    #[arg(short, long)]
    pub force: bool,
}

/// CLI spelling of [`Backoff`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum BackoffArg {
    Fixed,
    Linear,
    Exponential,
}

impl From<BackoffArg> for Backoff {
    fn from(value: BackoffArg) -> Self {
        match value {
            BackoffArg::Fixed => Backoff::Fixed,
            BackoffArg::Linear => Backoff::Linear,
            BackoffArg::Exponential => Backoff::Exponential { multiplier: 2.0 },
        }
    }
}
