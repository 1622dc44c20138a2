//! Cleanup stack.
//!
//! Started extensions are pushed in startup order. Unwinding pops them in
//! exact reverse order and releases each one, whatever happened to the
//! previous release.

use std::fmt;

use cuneus_core::utils::Logger;
use tracing::{info_span, Instrument};

use super::scope::ActiveExtension;

/// One extension whose shutdown failed.
#[derive(Debug)]
pub struct ShutdownFailure {
    /// Extension name
    pub extension: String,
    /// The error its shutdown raised, or the panic it hit
    pub error: anyhow::Error,
}

/// Outcome of unwinding the cleanup stack.
#[derive(Debug, Default)]
pub struct ShutdownReport {
    /// Extensions that were released, in release order
    pub stopped: Vec<String>,
    /// Extensions whose release failed, in release order
    pub failures: Vec<ShutdownFailure>,
}

impl ShutdownReport {
    /// Whether every release succeeded.
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

impl fmt::Display for ShutdownReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} extension(s) stopped, {} failed",
            self.stopped.len(),
            self.failures.len()
        )?;
        for failure in &self.failures {
            write!(f, "; {}: {:#}", failure.extension, failure.error)?;
        }
        Ok(())
    }
}

/// Deferred releases of started extensions.
pub struct CleanupStack {
    entries: Vec<ActiveExtension>,
    logger: Logger,
}

impl CleanupStack {
    /// An empty stack reporting through `logger`.
    pub fn new(logger: Logger) -> Self {
        Self {
            entries: Vec::new(),
            logger,
        }
    }

    /// Push a started extension.
    pub fn push(&mut self, active: ActiveExtension) {
        self.entries.push(active);
    }

    /// Names of the pushed extensions, in push order.
    pub fn names(&self) -> Vec<&str> {
        self.entries.iter().map(ActiveExtension::name).collect()
    }

    /// Number of pushed extensions.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing is waiting for release.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Release everything, last pushed first.
    ///
    /// Each release runs in its own task so a panicking shutdown hook is
    /// recorded as a failure like any other. The stack is empty afterwards.
    pub async fn unwind(&mut self) -> ShutdownReport {
        let mut report = ShutdownReport::default();

        while let Some(active) = self.entries.pop() {
            let name = active.name().to_string();
            self.logger.debug(format!("Stopping extension {}", name));

            let release = active
                .release()
                .instrument(info_span!("shutdown", extension = %name));
            let outcome = match tokio::spawn(release).await {
                Ok(result) => result,
                Err(join_error) => Err(anyhow::anyhow!("shutdown task failed: {}", join_error)),
            };

            match outcome {
                Ok(()) => {
                    self.logger.info(format!("Extension {} stopped", name));
                    report.stopped.push(name);
                }
                Err(err) => {
                    self.logger
                        .error(format!("Extension {} failed to stop: {:#}", name, err));
                    report.failures.push(ShutdownFailure {
                        extension: name,
                        error: err,
                    });
                }
            }
        }

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::scope::register;
    use async_trait::async_trait;
    use cuneus_core::registry::ServiceRegistry;
    use cuneus_core::serving::{App, ServingOptions};
    use cuneus_core::traits::Extension;
    use cuneus_core::utils::LoggerFactory;
    use parking_lot::Mutex;
    use std::sync::Arc;

    type Journal = Arc<Mutex<Vec<String>>>;

    enum Mode {
        Clean,
        Fails,
        Panics,
    }

    struct Step {
        name: &'static str,
        mode: Mode,
        journal: Journal,
    }

    #[async_trait]
    impl Extension for Step {
        fn name(&self) -> &str {
            self.name
        }

        async fn shutdown(&self, _app: &App) -> anyhow::Result<()> {
            self.journal.lock().push(self.name.to_string());
            match self.mode {
                Mode::Clean => Ok(()),
                Mode::Fails => Err(anyhow::anyhow!("{} refused to stop", self.name)),
                Mode::Panics => panic!("{} panicked", self.name),
            }
        }
    }

    async fn stack_of(steps: Vec<(&'static str, Mode)>, journal: &Journal) -> CleanupStack {
        let app = App::new(ServingOptions::new(), Vec::new());
        let registry = Arc::new(ServiceRegistry::new());
        let mut stack = CleanupStack::new(LoggerFactory::default().logger("lifecycle"));
        for (name, mode) in steps {
            let step = Step {
                name,
                mode,
                journal: journal.clone(),
            };
            let (_, active) = register(Arc::new(step), registry.clone(), app.clone())
                .enter()
                .await
                .unwrap();
            stack.push(active);
        }
        stack
    }

    #[tokio::test]
    async fn test_unwind_runs_in_reverse() {
        let journal = Journal::default();
        let mut stack = stack_of(
            vec![("a", Mode::Clean), ("b", Mode::Clean), ("c", Mode::Clean)],
            &journal,
        )
        .await;
        assert_eq!(stack.names(), vec!["a", "b", "c"]);

        let report = stack.unwind().await;
        assert!(report.is_clean());
        assert_eq!(report.stopped, vec!["c", "b", "a"]);
        assert_eq!(*journal.lock(), vec!["c", "b", "a"]);
        assert!(stack.is_empty());
    }

    #[tokio::test]
    async fn test_failures_do_not_stop_the_unwind() {
        let journal = Journal::default();
        let mut stack = stack_of(
            vec![("a", Mode::Clean), ("b", Mode::Fails), ("c", Mode::Panics)],
            &journal,
        )
        .await;

        let report = stack.unwind().await;
        assert_eq!(*journal.lock(), vec!["c", "b", "a"]);
        assert_eq!(report.stopped, vec!["a"]);

        let failed: Vec<&str> = report.failures.iter().map(|f| f.extension.as_str()).collect();
        assert_eq!(failed, vec!["c", "b"]);
        assert!(report.failures[1].error.to_string().contains("refused to stop"));
        assert!(report.to_string().starts_with("1 extension(s) stopped, 2 failed"));
    }

    #[tokio::test]
    async fn test_unwinding_an_empty_stack() {
        let report = CleanupStack::new(LoggerFactory::default().logger("lifecycle"))
            .unwind()
            .await;
        assert!(report.is_clean());
        assert!(report.stopped.is_empty());
    }
}
