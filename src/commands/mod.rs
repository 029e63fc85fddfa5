//! CLI command handlers.

mod list;
mod reset;
mod run;
mod status;

pub(crate) use list::run_list_command;
pub(crate) use reset::run_reset_command;
pub(crate) use run::run_download_command;
pub(crate) use status::run_status_command;
