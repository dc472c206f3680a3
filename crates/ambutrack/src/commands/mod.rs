//! Command handlers.

pub mod config_cmd;
pub mod online;
pub mod watch;

use ambutrack_core::Tracker;

use crate::cli::{Command, GlobalOpts};
use crate::config::Resolved;
use crate::error::CliError;

/// Dispatch a service-bound command to the appropriate handler.
pub async fn dispatch(cmd: Command, resolved: Resolved, global: &GlobalOpts) -> Result<(), CliError> {
    let profile_name = resolved.profile_name;
    let tracker = Tracker::new(resolved.tracker, resolved.tokens)?;

    match cmd {
        Command::Online => online::handle(&tracker, global).await,
        Command::Watch(args) => watch::handle(&tracker, args, &profile_name, global).await,
        // Config and Completions are handled before dispatch
        Command::Config(_) | Command::Completions(_) => unreachable!(),
    }
}
