//! CLI entry point for datefetch.

use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use tracing::debug;

mod app;
mod app_config;
mod cli;
mod commands;

use app::terminal;
use cli::{Cli, Command};

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let cli = Cli::parse();

    let loaded = app_config::load_config(cli.config.as_deref())?;

    let default_level = terminal::default_log_level(cli.verbose, cli.quiet, loaded.config.verbosity);
    terminal::init_tracing(default_level, terminal::no_color_env_requested());

    debug!(?cli, "CLI arguments parsed");
    debug!(
        path = ?loaded.path,
        loaded_from_file = loaded.loaded_from_file,
        "configuration resolved"
    );

    match &cli.command {
        Command::Run(args) => {
            let exit = commands::run_download_command(args, &loaded.config, cli.quiet).await?;
            Ok(exit.exit_code(args.strict))
        }
        Command::Status(args) => {
            commands::run_status_command(args, &loaded.config)?;
            Ok(ExitCode::SUCCESS)
        }
        Command::List(args) => {
            commands::run_list_command(args, &loaded.config)?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Reset(args) => {
            commands::run_reset_command(args, &loaded.config)?;
            Ok(ExitCode::SUCCESS)
        }
    }
}
