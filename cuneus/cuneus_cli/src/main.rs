//! Cuneus command-line interface.
//!
//! Composes the application from the resolved settings, then merges the
//! built-in commands with every subcommand contributed by extensions.

use std::ffi::OsString;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::{Args, Command, FromArgMatches, Subcommand};
use cuneus_core::Settings;
use cuneus_runtime::{Application, ApplicationBuilder};

mod commands;

use commands::{BaseCommand, GlobalArgs};

/// Root command: global arguments only. Subcommands are attached later.
fn root_command() -> Command {
    GlobalArgs::augment_args(
        Command::new("cuneus")
            .version(env!("CARGO_PKG_VERSION"))
            .about("Cuneus application CLI"),
    )
}

/// `--config` has to be known before the application, and therefore the
/// full command tree, exists.
fn config_path(args: &[OsString]) -> Option<PathBuf> {
    let mut iter = args.iter().skip(1);
    while let Some(arg) = iter.next() {
        let arg = arg.to_string_lossy();
        if arg == "--config" {
            return iter.next().map(PathBuf::from);
        }
        if let Some(path) = arg.strip_prefix("--config=") {
            return Some(PathBuf::from(path));
        }
    }
    None
}

fn compose(args: &[OsString]) -> anyhow::Result<Application> {
    let path = config_path(args);
    let settings = Settings::load(path.as_deref()).context("invalid settings")?;

    ApplicationBuilder::new()
        .settings(settings)
        .cli_root(root_command())
        .build()
        .context("failed to compose the application")
}

async fn run(args: Vec<OsString>) -> anyhow::Result<()> {
    let application = compose(&args)?;
    if let Some(name) = application
        .cli()
        .command_names()
        .into_iter()
        .find(|name| BaseCommand::has_subcommand(name))
    {
        anyhow::bail!("extension command '{}' clashes with a built-in command", name);
    }

    let command = BaseCommand::augment_subcommands(application.cli().build());
    let matches = match command.try_get_matches_from(&args) {
        Ok(matches) => matches,
        // --help and --version
        Err(err) if !err.use_stderr() => {
            err.print()?;
            return Ok(());
        }
        Err(err) => return Err(err.into()),
    };

    let Some((name, _)) = matches.subcommand() else {
        anyhow::bail!("no command given");
    };

    if BaseCommand::has_subcommand(name) {
        let command = BaseCommand::from_arg_matches(&matches)?;
        commands::execute(command, &application).await
    } else {
        application.cli().dispatch(&matches).await?;
        Ok(())
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    match run(std::env::args_os().collect()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => match err.downcast_ref::<clap::Error>() {
            Some(usage) => {
                let _ = usage.print();
                ExitCode::from(u8::try_from(usage.exit_code()).unwrap_or(2))
            }
            None => {
                eprintln!("Error: {:#}", err);
                ExitCode::FAILURE
            }
        },
    }
}
