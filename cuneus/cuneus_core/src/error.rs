//! Error types for the Cuneus framework.
//!
//! Each concern owns its own error enum. The root `Error` wraps all of them
//! so callers of the application builder and lifecycle have a single type
//! to match on.
//!
//! Extension hooks return `anyhow::Result` so user code can fail with any
//! error type. When such a failure aborts startup, the orchestrator keeps
//! the original error intact as the source of [`Error::Startup`].

use thiserror::Error;

/// Root error type for Cuneus.
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid composition or settings
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// State namespace errors
    #[error("State error: {0}")]
    State(#[from] StateError),

    /// An extension's startup hook failed
    #[error("Extension '{extension}' failed to start: {source}")]
    Startup {
        /// Name of the extension whose startup failed
        extension: String,

        /// The error raised by the extension, unchanged
        #[source]
        source: anyhow::Error,
    },

    /// Service registry errors
    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),

    /// Request dispatch errors
    #[error("Serving error: {0}")]
    Serving(#[from] ServingError),

    /// Command-line errors
    #[error("CLI error: {0}")]
    Cli(#[from] CliError),

    /// Lifecycle was driven out of order
    #[error("Lifecycle error: {0}")]
    Lifecycle(String),
}

impl Error {
    /// The error raised by a failing extension, if this is a startup failure.
    pub fn startup_source(&self) -> Option<&anyhow::Error> {
        match self {
            Self::Startup { source, .. } => Some(source),
            _ => None,
        }
    }

    /// Whether this error was raised while composing the application,
    /// before any extension had a chance to start.
    pub fn is_config(&self) -> bool {
        matches!(self, Self::Config(_))
    }
}

/// Errors related to settings and application composition.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A construction argument managed by the builder was supplied by the caller
    #[error("cannot set '{0}' when building an application; it is managed by the extension lifecycle")]
    ReservedArgument(String),

    /// A settings value is invalid
    #[error("Invalid settings: {0}")]
    Invalid(String),

    /// Settings file could not be read
    #[error("Failed to load settings: {0}")]
    LoadFailed(String),

    /// Settings file could not be parsed
    #[error("Failed to parse settings: {0}")]
    ParseFailed(String),

    /// An extension input could not be turned into an extension instance
    #[error("Failed to construct extension '{extension}': {reason}")]
    Construction {
        /// Type name of the extension
        extension: String,

        /// Why construction failed
        reason: String,
    },
}

/// A single key that two extensions both tried to contribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyCollision {
    /// The contested key
    pub key: String,

    /// The extension that contributed the key first
    pub owner: String,
}

/// Errors related to the shared state namespace.
#[derive(Debug, Error)]
pub enum StateError {
    /// An extension contributed keys that already exist in the namespace
    #[error("Extension state key collision while merging '{extension}': {}", format_collisions(.collisions))]
    Collision {
        /// The extension whose contribution was rejected
        extension: String,

        /// Every contested key with its current owner
        collisions: Vec<KeyCollision>,
    },
}

impl StateError {
    /// Keys involved in a collision, sorted.
    pub fn keys(&self) -> Vec<&str> {
        match self {
            Self::Collision { collisions, .. } => {
                collisions.iter().map(|c| c.key.as_str()).collect()
            }
        }
    }
}

fn format_collisions(collisions: &[KeyCollision]) -> String {
    collisions
        .iter()
        .map(|c| format!("'{}' (owned by '{}')", c.key, c.owner))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Errors related to the service registry.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// No service of the requested type is registered
    #[error("No service registered for {0}")]
    ServiceNotFound(&'static str),

    /// A registration does not hold the requested type
    #[error("Service registered for {0} has an unexpected type")]
    TypeMismatch(&'static str),

    /// A service factory failed
    #[error("Factory for {service} failed: {source}")]
    FactoryFailed {
        /// The requested service type
        service: &'static str,

        /// Error returned by the factory
        #[source]
        source: anyhow::Error,
    },
}

/// Errors raised by the serving object while routing a request.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ServingError {
    /// No route matches the request path
    #[error("No route for {method} {path}")]
    NotFound {
        /// Request method
        method: String,

        /// Request path
        path: String,
    },

    /// A route exists for the path, but not for the method
    #[error("Method {method} not allowed for {path}")]
    MethodNotAllowed {
        /// Request method
        method: String,

        /// Request path
        path: String,
    },
}

impl ServingError {
    /// HTTP status code for this error.
    pub fn status(&self) -> u16 {
        match self {
            Self::NotFound { .. } => 404,
            Self::MethodNotAllowed { .. } => 405,
        }
    }
}

/// Errors related to the command group.
#[derive(Debug, Error)]
pub enum CliError {
    /// Argument parsing failed (includes `--help` and `--version` requests)
    #[error("{0}")]
    Parse(#[from] clap::Error),

    /// No action is bound to the given subcommand
    #[error("Unknown command: {0}")]
    UnknownCommand(String),

    /// A subcommand action failed
    #[error("Command '{command}' failed: {source}")]
    CommandFailed {
        /// Subcommand name
        command: String,

        /// Error returned by the action
        #[source]
        source: anyhow::Error,
    },
}

/// Result type for Cuneus operations.
pub type Result<T> = std::result::Result<T, Error>;
