//! Lifecycle orchestrator.
//!
//! Starts extensions one at a time in declared order, merges their state
//! contributions and keeps a cleanup stack of everything that started.
//! Whatever ends the run (a startup failure, a state collision or a
//! shutdown request), the stack is unwound in exact reverse order.

use std::sync::Arc;

use cuneus_core::error::{Error, Result};
use cuneus_core::registry::ServiceRegistry;
use cuneus_core::serving::App;
use cuneus_core::traits::Extension;
use cuneus_core::types::{State, StateLedger};
use cuneus_core::utils::Logger;
use tracing::{info_span, Instrument};

use super::scope::register;
use super::stack::{CleanupStack, ShutdownReport};

/// Where the orchestrator is in its single run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Nothing started yet
    Idle,
    /// Extensions are starting
    Starting,
    /// Every extension started; the workload may run
    Running,
    /// The cleanup stack has been unwound
    Stopped,
}

/// Drives the startup and shutdown of an ordered extension list.
pub struct Orchestrator {
    extensions: Vec<Arc<dyn Extension>>,
    registry: Arc<ServiceRegistry>,
    app: App,
    stack: CleanupStack,
    phase: Phase,
    logger: Logger,
}

impl Orchestrator {
    /// Create an orchestrator for `extensions`, started in the given order.
    pub fn new(
        extensions: Vec<Arc<dyn Extension>>,
        registry: Arc<ServiceRegistry>,
        app: App,
        logger: Logger,
    ) -> Self {
        Self {
            extensions,
            registry,
            app,
            stack: CleanupStack::new(logger.clone()),
            phase: Phase::Idle,
            logger,
        }
    }

    /// Current phase.
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Names of every managed extension, in startup order.
    pub fn extension_names(&self) -> Vec<&str> {
        self.extensions.iter().map(|extension| extension.name()).collect()
    }

    /// Names of the extensions currently awaiting shutdown, in startup order.
    pub fn started(&self) -> Vec<&str> {
        self.stack.names()
    }

    /// Start every extension and publish the merged state to the serving
    /// object.
    ///
    /// On failure, the extensions started so far are shut down before the
    /// error is returned. A failing extension's own error is kept unchanged
    /// as the source of [`Error::Startup`].
    pub async fn startup(&mut self) -> Result<State> {
        if self.phase != Phase::Idle {
            return Err(Error::Lifecycle(format!(
                "cannot start extensions while {:?}",
                self.phase
            )));
        }

        self.phase = Phase::Starting;
        self.logger
            .info(format!("Starting {} extension(s)", self.extensions.len()));

        let mut ledger = StateLedger::new();
        for extension in self.extensions.clone() {
            let name = extension.name().to_string();
            let scope = register(extension, self.registry.clone(), self.app.clone());
            self.logger.debug(format!("Starting extension {}", name));

            let entered = scope
                .enter()
                .instrument(info_span!("startup", extension = %name))
                .await;
            match entered {
                Ok((contribution, active)) => {
                    self.stack.push(active);
                    if let Err(collision) = ledger.merge(&name, contribution) {
                        self.logger.error(&collision);
                        self.abort().await;
                        return Err(collision.into());
                    }
                    self.logger.debug(format!("Extension {} started", name));
                }
                Err(source) => {
                    self.logger
                        .error(format!("Extension {} failed to start: {:#}", name, source));
                    self.abort().await;
                    return Err(Error::Startup {
                        extension: name,
                        source,
                    });
                }
            }
        }

        let state = ledger.finish();
        self.app.publish_state(state.clone());
        self.phase = Phase::Running;
        self.logger.info(format!(
            "All extensions started with {} state key(s)",
            state.len()
        ));

        Ok(state)
    }

    /// Shut down every started extension, last started first.
    ///
    /// Safe to call in any phase; only the first call after a successful
    /// startup does any work.
    pub async fn shutdown(&mut self) -> ShutdownReport {
        match self.phase {
            Phase::Running | Phase::Starting => {
                self.logger
                    .info(format!("Stopping {} extension(s)", self.stack.len()));
                self.app.clear_state();
                let report = self.stack.unwind().await;
                self.phase = Phase::Stopped;
                self.log_report(&report);
                report
            }
            Phase::Idle => {
                self.phase = Phase::Stopped;
                ShutdownReport::default()
            }
            Phase::Stopped => {
                self.logger.debug("Extensions already stopped");
                ShutdownReport::default()
            }
        }
    }

    async fn abort(&mut self) {
        let report = self.stack.unwind().await;
        self.phase = Phase::Stopped;
        self.log_report(&report);
    }

    fn log_report(&self, report: &ShutdownReport) {
        if report.is_clean() {
            self.logger
                .info(format!("Stopped {} extension(s)", report.stopped.len()));
        } else {
            self.logger.warn(format!("Shutdown incomplete: {}", report));
        }
    }
}
