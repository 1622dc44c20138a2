//! Application composition.

use std::sync::Arc;

use clap::Command;
use cuneus_core::cli::CliGroup;
use cuneus_core::error::Result;
use cuneus_core::registry::ServiceRegistry;
use cuneus_core::serving::{App, ServingOptions};
use cuneus_core::traits::{Extension, ExtensionContext};
use cuneus_core::utils::{LoggerFactory, Settings};

use super::application::Application;
use super::collector::CapabilityCollector;
use super::shutdown::ShutdownSignal;
use crate::extension::{with_defaults, ExtensionInput};
use crate::lifecycle::Orchestrator;

/// Composes extensions into an [`Application`].
///
/// # Examples
///
/// ```
/// use cuneus_runtime::ApplicationBuilder;
///
/// let application = ApplicationBuilder::new()
///     .option("title", "Orders API")
///     .build()
///     .unwrap();
/// assert_eq!(
///     application.extension_names(),
///     vec!["LoggingExtension", "HealthExtension", "ExceptionExtension"]
/// );
/// ```
pub struct ApplicationBuilder {
    settings: Option<Arc<Settings>>,
    inputs: Vec<ExtensionInput>,
    include_defaults: bool,
    options: ServingOptions,
    cli_root: Option<Command>,
}

impl ApplicationBuilder {
    /// A builder with default settings and the default extension set.
    pub fn new() -> Self {
        Self {
            settings: None,
            inputs: Vec::new(),
            include_defaults: true,
            options: ServingOptions::new(),
            cli_root: None,
        }
    }

    /// Settings handed to every extension.
    pub fn settings(mut self, settings: impl Into<Arc<Settings>>) -> Self {
        self.settings = Some(settings.into());
        self
    }

    /// Append an extension.
    pub fn extension(mut self, input: impl Into<ExtensionInput>) -> Self {
        self.inputs.push(input.into());
        self
    }

    /// Append several extensions.
    pub fn extensions(mut self, inputs: impl IntoIterator<Item = ExtensionInput>) -> Self {
        self.inputs.extend(inputs);
        self
    }

    /// Whether to prepend logging, health and exception handling.
    pub fn include_defaults(mut self, include: bool) -> Self {
        self.include_defaults = include;
        self
    }

    /// Set a serving option.
    pub fn option(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.options.set(key, value);
        self
    }

    /// Replace the serving options.
    pub fn options(mut self, options: ServingOptions) -> Self {
        self.options = options;
        self
    }

    /// Root command of the command group, e.g. one carrying global flags.
    pub fn cli_root(mut self, root: Command) -> Self {
        self.cli_root = Some(root);
        self
    }

    /// Compose the application.
    ///
    /// Reserved serving options are refused before any extension is
    /// instantiated. The logger factory is built and installed once, then
    /// handed to every extension and component through the build context.
    /// Nothing is started here.
    pub fn build(self) -> Result<Application> {
        let mut options = self.options;
        options.check_reserved()?;

        let settings = self.settings.unwrap_or_default();
        let factory = LoggerFactory::from_settings(&settings);
        factory.install();
        let logger = factory.logger("lifecycle");
        let context = ExtensionContext::new(settings.clone(), factory.clone());

        let extensions = with_defaults(self.inputs, self.include_defaults)
            .into_iter()
            .map(|input| input.resolve(&context))
            .collect::<std::result::Result<Vec<Arc<dyn Extension>>, _>>()?;

        let collector = CapabilityCollector::new(factory.logger("collector"));

        if options.title.is_none() {
            options.title = Some(settings.app_name.clone());
        }
        if options.version.is_none() {
            options.version = settings.version.clone();
        }
        let app = App::new(options, collector.collect_middleware(&extensions));

        let root = self
            .cli_root
            .unwrap_or_else(|| Command::new(settings.app_name.clone()).about("Application CLI"));
        let mut cli = CliGroup::with_root(root);
        collector.collect_cli(&extensions, &mut cli);

        collector.install_exception_handlers(&extensions, &app);

        let registry = Arc::new(ServiceRegistry::new());
        let names = extensions
            .iter()
            .map(|extension| extension.name().to_string())
            .collect::<Vec<_>>();
        logger.info(format!("Composed application with [{}]", names.join(", ")));

        let orchestrator = Orchestrator::new(extensions, registry.clone(), app.clone(), logger.clone());
        let shutdown = ShutdownSignal::new(factory.logger("shutdown"));
        Ok(Application::new(
            settings,
            registry,
            app,
            cli,
            orchestrator,
            shutdown,
            logger,
        ))
    }
}

impl Default for ApplicationBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Compose `extensions` with the default set under `settings`.
pub fn build_app(
    extensions: impl IntoIterator<Item = ExtensionInput>,
    settings: Settings,
) -> Result<Application> {
    ApplicationBuilder::new()
        .settings(settings)
        .extensions(extensions)
        .build()
}
