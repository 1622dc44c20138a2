//! # Cuneus Core
//!
//! `cuneus_core` provides the building blocks shared by every Cuneus crate:
//! the extension interfaces, the shared state namespace, the service
//! registry, a minimal in-process serving object, the command group,
//! settings and logging.
//!
//! ## Lifecycle Model
//!
//! An application is a fixed, ordered list of extensions. Each extension
//! starts in declared order and stops in exact reverse order. Startup may
//! contribute values to the state namespace; keys must be unique across
//! extensions. The orchestration itself lives in `cuneus_runtime`.
//!
//! ## Crate Structure
//!
//! - **error**: Error types for all Cuneus components
//! - **traits**: The extension interface and its optional capabilities
//! - **types**: The state namespace and its merge ledger
//! - **registry**: Typed services and health probes
//! - **serving**: Requests, routing, middleware and exception handling
//! - **cli**: The command group extensions append subcommands to
//! - **utils**: Settings and logging

pub mod cli;
pub mod error;
pub mod registry;
pub mod serving;
pub mod traits;
pub mod types;
pub mod utils;

pub use cli::CliGroup;
pub use error::{
    CliError, ConfigError, Error, KeyCollision, RegistryError, Result, ServingError, StateError,
};
pub use registry::{FnProbe, HealthProbe, Ping, ServiceRegistry};
pub use serving::{App, MiddlewareDescriptor, Request, Response, Router, ServingOptions};
pub use traits::{
    CliProvider, ExceptionHandlerProvider, ExceptionRegistrar, Extension, ExtensionContext,
    FromContext, MiddlewareProvider,
};
pub use types::{ExtensionState, State, StateLedger};
pub use utils::{LogFormat, LogLevel, Logger, LoggerFactory, Settings};
