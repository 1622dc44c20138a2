//! The composed application.

use std::future::Future;
use std::sync::Arc;

use cuneus_core::cli::CliGroup;
use cuneus_core::error::{CliError, Result};
use cuneus_core::registry::ServiceRegistry;
use cuneus_core::serving::{App, Request, Response};
use cuneus_core::types::State;
use cuneus_core::utils::{Logger, Settings};
use tokio::runtime::Handle;
use tokio::sync::Mutex;

use super::shutdown::ShutdownSignal;
use crate::lifecycle::{Orchestrator, Phase, ShutdownReport};

/// Serving object, command group and extension lifecycle of one
/// application.
pub struct Application {
    settings: Arc<Settings>,
    registry: Arc<ServiceRegistry>,
    app: App,
    cli: CliGroup,
    extension_names: Vec<String>,
    orchestrator: Arc<Mutex<Orchestrator>>,
    shutdown: ShutdownSignal,
    logger: Logger,
}

impl Application {
    pub(crate) fn new(
        settings: Arc<Settings>,
        registry: Arc<ServiceRegistry>,
        app: App,
        cli: CliGroup,
        orchestrator: Orchestrator,
        shutdown: ShutdownSignal,
        logger: Logger,
    ) -> Self {
        let extension_names = orchestrator
            .extension_names()
            .into_iter()
            .map(str::to_string)
            .collect();
        Self {
            settings,
            registry,
            app,
            cli,
            extension_names,
            orchestrator: Arc::new(Mutex::new(orchestrator)),
            shutdown,
            logger,
        }
    }

    /// The settings every extension was built with.
    pub fn settings(&self) -> &Arc<Settings> {
        &self.settings
    }

    /// The service registry. Tests may override registrations before
    /// calling [`Application::start`].
    pub fn registry(&self) -> &Arc<ServiceRegistry> {
        &self.registry
    }

    /// The serving object.
    pub fn app(&self) -> &App {
        &self.app
    }

    /// The command group with every contributed subcommand.
    pub fn cli(&self) -> &CliGroup {
        &self.cli
    }

    /// Extension names in startup order.
    pub fn extension_names(&self) -> Vec<&str> {
        self.extension_names.iter().map(String::as_str).collect()
    }

    /// The signal that ends [`Application::run`].
    pub fn shutdown_signal(&self) -> &ShutdownSignal {
        &self.shutdown
    }

    /// The merged state, once started.
    pub fn state(&self) -> Option<State> {
        self.app.state()
    }

    /// Whether startup completed and shutdown has not begun.
    pub async fn is_running(&self) -> bool {
        self.orchestrator.lock().await.phase() == Phase::Running
    }

    /// Start every extension.
    pub async fn start(&self) -> Result<State> {
        self.logger
            .info(format!("Starting {}", self.settings.app_name));
        self.orchestrator.lock().await.startup().await
    }

    /// Stop every started extension in reverse order.
    pub async fn shutdown(&self) -> ShutdownReport {
        self.logger
            .info(format!("Shutting down {}", self.settings.app_name));
        self.orchestrator.lock().await.shutdown().await
    }

    /// Dispatch a request to the serving object.
    pub async fn handle(&self, request: Request) -> Response {
        self.app.handle(request).await
    }

    /// Start, wait for `signal`, then shut down.
    ///
    /// If the returned future is dropped, or `signal` panics, before the
    /// shutdown begins, the extensions are still stopped on a spawned task.
    pub async fn serve_until<F>(&self, signal: F) -> Result<ShutdownReport>
    where
        F: Future<Output = ()>,
    {
        let guard = UnwindOnDrop::new(self.orchestrator.clone(), self.logger.clone());
        if let Err(err) = self.start().await {
            guard.disarm();
            return Err(err);
        }

        signal.await;
        let report = self.shutdown().await;
        guard.disarm();
        Ok(report)
    }

    /// Start and serve until the shutdown signal is requested or Ctrl-C
    /// is pressed.
    pub async fn run(&self) -> Result<ShutdownReport> {
        let interrupt = self.shutdown.request_on_ctrl_c();
        let result = self.serve_until(self.shutdown.handle().wait()).await;
        interrupt.abort();
        result
    }

    /// Parse `args` with the command group and run the chosen subcommand.
    pub async fn run_cli<I, T>(&self, args: I) -> std::result::Result<(), CliError>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        self.cli.run_from(args).await
    }
}

/// Unwinds the extensions when a serving future is abandoned before its
/// own shutdown.
struct UnwindOnDrop {
    orchestrator: Option<Arc<Mutex<Orchestrator>>>,
    logger: Logger,
}

impl UnwindOnDrop {
    fn new(orchestrator: Arc<Mutex<Orchestrator>>, logger: Logger) -> Self {
        Self {
            orchestrator: Some(orchestrator),
            logger,
        }
    }

    fn disarm(mut self) {
        self.orchestrator = None;
    }
}

impl Drop for UnwindOnDrop {
    fn drop(&mut self) {
        let Some(orchestrator) = self.orchestrator.take() else {
            return;
        };

        match Handle::try_current() {
            Ok(handle) => {
                self.logger
                    .warn("Serving was cancelled, stopping extensions in the background");
                let logger = self.logger.clone();
                handle.spawn(async move {
                    let report = orchestrator.lock().await.shutdown().await;
                    if !report.is_clean() {
                        logger.warn(format!("Cancelled shutdown incomplete: {}", report));
                    }
                });
            }
            Err(_) => self
                .logger
                .error("Serving was cancelled outside a runtime; extensions were not stopped"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extension::ExtensionInput;
    use crate::system::builder::ApplicationBuilder;
    use async_trait::async_trait;
    use cuneus_core::traits::Extension;
    use cuneus_core::types::ExtensionState;
    use std::time::Duration;

    struct Answer;

    #[async_trait]
    impl Extension for Answer {
        async fn startup(
            &self,
            _registry: &Arc<ServiceRegistry>,
            _app: &App,
        ) -> anyhow::Result<ExtensionState> {
            Ok(ExtensionState::new().with("answer", 42u8))
        }
    }

    fn application() -> Application {
        ApplicationBuilder::new()
            .include_defaults(false)
            .extension(ExtensionInput::instance(Answer))
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn test_start_publishes_state() {
        let application = application();
        assert!(application.state().is_none());

        let state = application.start().await.unwrap();
        assert_eq!(state.get::<u8>("answer"), Some(&42));
        assert!(application.is_running().await);
        assert!(application.state().is_some());

        let report = application.shutdown().await;
        assert_eq!(report.stopped, vec!["Answer"]);
        assert!(application.state().is_none());
        assert!(!application.is_running().await);
    }

    #[tokio::test]
    async fn test_run_ends_on_shutdown_request() {
        let application = Arc::new(application());
        let signal = application.shutdown_signal().clone();

        let running = tokio::spawn({
            let application = application.clone();
            async move { application.run().await }
        });
        while !application.is_running().await {
            tokio::task::yield_now().await;
        }
        signal.request().unwrap();

        let report = running.await.unwrap().unwrap();
        assert!(report.is_clean());
        assert_eq!(report.stopped, vec!["Answer"]);
    }

    struct Journaled(Arc<parking_lot::Mutex<Vec<&'static str>>>);

    #[async_trait]
    impl Extension for Journaled {
        async fn startup(
            &self,
            _registry: &Arc<ServiceRegistry>,
            _app: &App,
        ) -> anyhow::Result<ExtensionState> {
            self.0.lock().push("start");
            Ok(ExtensionState::new())
        }

        async fn shutdown(&self, _app: &App) -> anyhow::Result<()> {
            self.0.lock().push("stop");
            Ok(())
        }
    }

    fn journaled() -> (Arc<Application>, Arc<parking_lot::Mutex<Vec<&'static str>>>) {
        let journal = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let application = ApplicationBuilder::new()
            .include_defaults(false)
            .extension(Journaled(journal.clone()))
            .build()
            .unwrap();
        (Arc::new(application), journal)
    }

    async fn wait_for_stop(application: &Application, journal: &parking_lot::Mutex<Vec<&'static str>>) {
        tokio::time::timeout(Duration::from_secs(1), async {
            while !journal.lock().contains(&"stop") {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("extensions should stop");
        assert!(!application.is_running().await);
    }

    #[tokio::test]
    async fn test_cancelled_serving_still_shuts_down() {
        let (application, journal) = journaled();

        let outcome = tokio::time::timeout(
            Duration::from_millis(50),
            application.serve_until(std::future::pending()),
        )
        .await;
        assert!(outcome.is_err());

        wait_for_stop(&application, &journal).await;
        assert_eq!(*journal.lock(), vec!["start", "stop"]);
        assert!(application.state().is_none());
    }

    #[tokio::test]
    async fn test_panicking_signal_still_shuts_down() {
        let (application, journal) = journaled();

        let serving = tokio::spawn({
            let application = application.clone();
            async move {
                application
                    .serve_until(async {
                        tokio::task::yield_now().await;
                        panic!("signal source failed");
                    })
                    .await
            }
        });
        assert!(serving.await.unwrap_err().is_panic());

        wait_for_stop(&application, &journal).await;
        assert_eq!(*journal.lock(), vec!["start", "stop"]);
    }
}
