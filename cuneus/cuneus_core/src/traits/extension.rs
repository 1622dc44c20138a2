//! Extension trait definitions.
//!
//! An extension is a unit of optional application behavior. Every
//! extension has a lifecycle: `startup` runs once before the application
//! serves anything and may contribute values to the shared state
//! namespace; `shutdown` runs once when the application stops, in reverse
//! startup order.
//!
//! On top of the lifecycle, an extension may expose any combination of
//! three capabilities:
//!
//! - **Middleware**: descriptors wrapped around every request
//! - **CLI**: subcommands appended to the command group
//! - **Exception handlers**: error-to-response mappings installed on the
//!   serving object once it exists
//!
//! Capabilities are separate traits. An extension advertises one by
//! overriding the matching `as_*` accessor on [`Extension`] to return
//! itself, which lets the runtime discover capabilities on trait objects.

use std::any::type_name;
use std::error::Error as StdError;
use std::sync::Arc;

use async_trait::async_trait;

use crate::cli::CliGroup;
use crate::registry::ServiceRegistry;
use crate::serving::{App, ErrorContext, MiddlewareDescriptor, Override, Response};
use crate::types::ExtensionState;
use crate::utils::{Logger, LoggerFactory, Settings};

/// Core trait for extensions.
///
/// Both hooks default to no-ops, so a capability-only extension needs no
/// lifecycle code at all.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
///
/// use async_trait::async_trait;
/// use cuneus_core::serving::App;
/// use cuneus_core::traits::Extension;
/// use cuneus_core::types::ExtensionState;
/// use cuneus_core::registry::ServiceRegistry;
///
/// struct Greeter;
///
/// #[async_trait]
/// impl Extension for Greeter {
///     async fn startup(
///         &self,
///         _registry: &Arc<ServiceRegistry>,
///         _app: &App,
///     ) -> anyhow::Result<ExtensionState> {
///         Ok(ExtensionState::new().with("greeting", "hello"))
///     }
/// }
///
/// assert_eq!(Greeter.name(), "Greeter");
/// ```
#[async_trait]
pub trait Extension: Send + Sync + 'static {
    /// Name used in logs and error messages.
    ///
    /// Defaults to the concrete type name without its module path.
    fn name(&self) -> &str {
        short_type_name(type_name::<Self>())
    }

    /// Start the extension.
    ///
    /// Called at most once per application lifetime, in declared order.
    /// The extension may register services on `registry` and mount routes
    /// on `app`.
    ///
    /// # Arguments
    ///
    /// * `registry` - The service registry shared by all extensions.
    /// * `app` - The serving object. Its middleware chain is already fixed.
    ///
    /// # Returns
    ///
    /// * `Ok(ExtensionState)` - Values to merge into the shared state
    ///   namespace. Keys must not collide with any other extension's keys.
    /// * `Err` to abort application startup. Extensions started earlier are
    ///   shut down; this extension is not.
    async fn startup(
        &self,
        _registry: &Arc<ServiceRegistry>,
        _app: &App,
    ) -> anyhow::Result<ExtensionState> {
        Ok(ExtensionState::new())
    }

    /// Stop the extension.
    ///
    /// Only called if `startup` returned `Ok`. Failures are reported but do
    /// not prevent earlier extensions from shutting down.
    async fn shutdown(&self, _app: &App) -> anyhow::Result<()> {
        Ok(())
    }

    /// The middleware capability, if this extension has it.
    fn as_middleware_provider(&self) -> Option<&dyn MiddlewareProvider> {
        None
    }

    /// The CLI capability, if this extension has it.
    fn as_cli_provider(&self) -> Option<&dyn CliProvider> {
        None
    }

    /// The exception handler capability, if this extension has it.
    fn as_exception_handler_provider(&self) -> Option<&dyn ExceptionHandlerProvider> {
        None
    }
}

/// What every extension is built from: the settings and the logger
/// factory shared by the whole application.
#[derive(Debug, Clone)]
pub struct ExtensionContext {
    settings: Arc<Settings>,
    logging: LoggerFactory,
}

impl ExtensionContext {
    /// Pair `settings` with an existing factory.
    pub fn new(settings: Arc<Settings>, logging: LoggerFactory) -> Self {
        Self { settings, logging }
    }

    /// A context whose factory is configured from `settings`.
    pub fn from_settings(settings: impl Into<Arc<Settings>>) -> Self {
        let settings = settings.into();
        let logging = LoggerFactory::from_settings(&settings);
        Self { settings, logging }
    }

    /// The application settings.
    pub fn settings(&self) -> &Arc<Settings> {
        &self.settings
    }

    /// The shared logger factory.
    pub fn logging(&self) -> &LoggerFactory {
        &self.logging
    }

    /// A logger for `component` from the shared factory.
    pub fn logger(&self, component: impl Into<String>) -> Logger {
        self.logging.logger(component)
    }
}

impl Default for ExtensionContext {
    fn default() -> Self {
        Self::from_settings(Settings::default())
    }
}

/// Construction from the build context.
///
/// Extensions passed to the application builder by type are built through
/// this trait.
pub trait FromContext: Sized {
    /// Build the extension.
    fn from_context(context: &ExtensionContext) -> anyhow::Result<Self>;
}

/// Contributes middleware to the serving object.
///
/// Collected once, before the serving object is built.
pub trait MiddlewareProvider: Send + Sync {
    /// Middleware descriptors, outermost first.
    fn middleware(&self) -> Vec<MiddlewareDescriptor>;
}

/// Contributes subcommands to the command group.
pub trait CliProvider: Send + Sync {
    /// Append subcommands to `group`.
    fn register_cli(&self, group: &mut CliGroup);
}

/// Installs exception handlers on the serving object.
///
/// Called once, after the serving object exists.
pub trait ExceptionHandlerProvider: Send + Sync {
    /// Register handlers through `handlers`.
    fn add_exception_handlers(&self, handlers: &mut ExceptionRegistrar<'_>);
}

/// Registers exception handlers on behalf of one extension and remembers
/// every registration it replaced.
pub struct ExceptionRegistrar<'a> {
    app: &'a App,
    owner: &'a str,
    overrides: Vec<Override>,
}

impl<'a> ExceptionRegistrar<'a> {
    /// A registrar installing handlers on `app`, owned by `owner`.
    pub fn new(app: &'a App, owner: &'a str) -> Self {
        Self {
            app,
            owner,
            overrides: Vec::new(),
        }
    }

    /// The serving object.
    pub fn app(&self) -> &App {
        self.app
    }

    /// The registering extension.
    pub fn owner(&self) -> &str {
        self.owner
    }

    /// Handle errors of type `E`.
    pub fn handle<E, F>(&mut self, handler: F) -> &mut Self
    where
        E: StdError + 'static,
        F: Fn(&ErrorContext, &E) -> Response + Send + Sync + 'static,
    {
        if let Some(replaced) = self.app.add_exception_handler::<E, F>(self.owner, handler) {
            self.overrides.push(replaced);
        }
        self
    }

    /// Handle every error no typed handler claims.
    pub fn catch_all<F>(&mut self, handler: F) -> &mut Self
    where
        F: Fn(&ErrorContext, &anyhow::Error) -> Response + Send + Sync + 'static,
    {
        if let Some(replaced) = self.app.set_catch_all_handler(self.owner, handler) {
            self.overrides.push(replaced);
        }
        self
    }

    /// Registrations of other extensions replaced so far.
    pub fn into_overrides(self) -> Vec<Override> {
        self.overrides
    }
}

/// Strip the module path from a type name, keeping generic arguments.
pub fn short_type_name(full: &str) -> &str {
    let end = full.find('<').unwrap_or(full.len());
    match full[..end].rfind("::") {
        Some(index) => &full[index + 2..],
        None => full,
    }
}
