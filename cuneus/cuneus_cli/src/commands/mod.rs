//! Built-in commands.
//!
//! These need the composed application, so they are handled by the binary
//! itself. Every other subcommand comes from an extension and is
//! dispatched through the command group.

use std::path::PathBuf;

use clap::{Args, Subcommand};
use cuneus_runtime::Application;
use tracing::debug;

pub mod inspect;
pub mod lifecycle;

/// Arguments accepted by every command.
#[derive(Args, Debug, Default)]
pub struct GlobalArgs {
    /// Path to a settings file
    #[clap(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,
}

/// Commands available in every application.
#[derive(Subcommand, Debug)]
pub enum BaseCommand {
    /// Start every extension and serve until interrupted
    Run,

    /// Start every extension, report the state keys, then shut down
    Check,

    /// List mounted routes
    Routes,

    /// Print the resolved settings as JSON
    Settings,

    /// Dispatch one request in-process and print the response
    Call(inspect::CallArgs),
}

/// Run a built-in command.
pub async fn execute(command: BaseCommand, application: &Application) -> anyhow::Result<()> {
    debug!("Executing built-in command {:?}", command);
    match command {
        BaseCommand::Run => lifecycle::execute_run(application).await,
        BaseCommand::Check => lifecycle::execute_check(application).await,
        BaseCommand::Routes => inspect::execute_routes(application).await,
        BaseCommand::Settings => inspect::execute_settings(application),
        BaseCommand::Call(args) => inspect::execute_call(&args, application).await,
    }
}
