//! Command dispatch: bridges CLI args -> core / REST calls -> output formatting.

pub mod config_cmd;
pub mod export;
pub mod history;
pub mod snapshot;
pub mod tail;
pub mod watch;

use circlescope_core::DashboardConfig;

use crate::cli::{Command, GlobalOpts};
use crate::error::CliError;

/// Dispatch a server-bound command to the appropriate handler.
pub async fn dispatch(
    cmd: Command,
    config: DashboardConfig,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    match cmd {
        Command::Watch(args) => watch::handle(config, &args, global).await,
        Command::Tail(args) => tail::handle(&config, &args, global).await,
        Command::Snapshot(args) => {
            snapshot::handle(&config.api_client()?, args.resource, global).await
        }
        Command::History(args) => history::handle(&config.api_client()?, &args, global).await,
        Command::Export(args) => export::handle(&config.api_client()?, &args, global).await,
        // Config and Completions are handled before dispatch
        Command::Config(_) | Command::Completions(_) => Err(CliError::Validation {
            field: "command".into(),
            reason: "does not need a server".into(),
        }),
    }
}
