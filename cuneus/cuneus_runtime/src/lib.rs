//! # Cuneus Runtime
//!
//! Turns an ordered list of extensions into a running application.
//!
//! Composition happens once, in [`ApplicationBuilder::build`]:
//!
//! 1. Reserved serving options are refused
//! 2. The logger factory is built and installed once
//! 3. Extension inputs are resolved to instances, defaults first, each
//!    seeing the same [`ExtensionContext`]
//! 4. Middleware is collected and the serving object is built
//! 5. Subcommands are collected into the command group
//! 6. Exception handlers are installed on the serving object
//!
//! [`Application::start`] then starts extensions in order and
//! [`Application::shutdown`] stops them in exact reverse order. A startup
//! failure or state key collision stops everything started so far before
//! the error is returned.

pub mod extension;
pub mod lifecycle;
pub mod system;

pub use cuneus_core::traits::{ExtensionContext, FromContext};

pub use extension::{default_extensions, with_defaults, ExtensionInput, InputKind};
pub use lifecycle::{
    register, ActiveExtension, CleanupStack, ExtensionScope, Orchestrator, Phase,
    ShutdownFailure, ShutdownReport,
};
pub use system::{
    build_app, Application, ApplicationBuilder, CapabilityCollector, ShutdownError,
    ShutdownHandle, ShutdownSignal,
};
