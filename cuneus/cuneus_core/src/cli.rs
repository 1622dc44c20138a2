//! Command group.
//!
//! A named set of subcommands, each paired with an async action.
//! Extensions append their own subcommands during composition; the binary
//! builds the final `clap::Command` from the group and dispatches the
//! parsed subcommand back to its action.

use std::collections::HashMap;
use std::ffi::OsString;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use clap::{ArgMatches, Command};
use tracing::warn;

use crate::error::CliError;

type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send>>;

/// The action bound to a subcommand.
pub type CommandAction = Arc<dyn Fn(ArgMatches) -> BoxFuture<anyhow::Result<()>> + Send + Sync>;

/// A hierarchical command namespace.
pub struct CliGroup {
    root: Command,
    commands: Vec<Command>,
    actions: HashMap<String, CommandAction>,
}

impl CliGroup {
    /// An empty group whose root command is `name`.
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_root(Command::new(name.into()))
    }

    /// An empty group under an existing root command.
    ///
    /// Global arguments declared on `root` are kept.
    pub fn with_root(root: Command) -> Self {
        Self {
            root,
            commands: Vec::new(),
            actions: HashMap::new(),
        }
    }

    /// Append a subcommand.
    ///
    /// A subcommand with the same name replaces the earlier one.
    pub fn add_command<F, Fut>(&mut self, command: Command, action: F) -> &mut Self
    where
        F: Fn(ArgMatches) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let name = command.get_name().to_string();
        if let Some(position) = self.commands.iter().position(|c| c.get_name() == name) {
            warn!("Command '{}' is registered twice, keeping the later one", name);
            self.commands.remove(position);
        }

        let action: CommandAction =
            Arc::new(move |matches| Box::pin(action(matches)) as BoxFuture<anyhow::Result<()>>);
        self.commands.push(command);
        self.actions.insert(name, action);
        self
    }

    /// Whether a subcommand is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.actions.contains_key(name)
    }

    /// Registered subcommand names, in registration order.
    pub fn command_names(&self) -> Vec<&str> {
        self.commands.iter().map(Command::get_name).collect()
    }

    /// The root command with every subcommand attached.
    pub fn build(&self) -> Command {
        self.root
            .clone()
            .subcommand_required(true)
            .arg_required_else_help(true)
            .subcommands(self.commands.iter().cloned())
    }

    /// Run the action of the parsed subcommand.
    pub async fn dispatch(&self, matches: &ArgMatches) -> Result<(), CliError> {
        let Some((name, sub_matches)) = matches.subcommand() else {
            return Err(CliError::UnknownCommand(String::new()));
        };

        let action = self
            .actions
            .get(name)
            .cloned()
            .ok_or_else(|| CliError::UnknownCommand(name.to_string()))?;

        action(sub_matches.clone())
            .await
            .map_err(|source| CliError::CommandFailed {
                command: name.to_string(),
                source,
            })
    }

    /// Parse `args` (including the binary name) and dispatch.
    pub async fn run_from<I, T>(&self, args: I) -> Result<(), CliError>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        let matches = self.build().try_get_matches_from(args)?;
        self.dispatch(&matches).await
    }
}
