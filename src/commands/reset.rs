//! Reset command handler.

use std::io::{self, BufRead, IsTerminal, Write};

use anyhow::{Context, Result, bail};
use datefetch_core::ProgressStore;
use tracing::info;

use crate::app::config_runtime::resolve_state_path;
use crate::app_config::FileConfig;
use crate::cli::ResetArgs;

pub(crate) fn run_reset_command(args: &ResetArgs, file_config: &FileConfig) -> Result<()> {
    let path = resolve_state_path(&args.state, file_config);
    if !path.exists() {
        println!("Nothing to reset: no progress file at '{}'", path.display());
        return Ok(());
    }

    if !args.force {
        if !io::stdin().is_terminal() {
            bail!(
                "Refusing to reset '{}' without confirmation\n  Suggestion: pass --force",
                path.display()
            );
        }
        print!("Clear all progress in '{}'? [y/N] ", path.display());
        io::stdout().flush()?;
        let mut answer = String::new();
        io::stdin().lock().read_line(&mut answer)?;
        if !is_confirmation(&answer) {
            println!("Aborted");
            return Ok(());
        }
    }

    let mut store = ProgressStore::load(&path)
        .with_context(|| format!("Failed to open progress file '{}'", path.display()))?;
    let cleared = store.summary().total;
    store.reset()?;
    info!(cleared, path = %path.display(), "progress cleared");
    println!("Cleared {cleared} record(s) from '{}'", path.display());
    Ok(())
}

fn is_confirmation(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}
