//! Capability collection.
//!
//! Gathers what extensions contribute outside their lifecycle: middleware
//! before the serving object is built, subcommands into the command
//! group, and exception handlers once the serving object exists. Every
//! pass visits extensions in order.

use std::sync::Arc;

use cuneus_core::cli::CliGroup;
use cuneus_core::serving::{App, MiddlewareDescriptor, Override};
use cuneus_core::traits::{short_type_name, ExceptionRegistrar, Extension};
use cuneus_core::utils::Logger;

/// Walks extensions for their optional capabilities.
pub struct CapabilityCollector {
    logger: Logger,
}

impl CapabilityCollector {
    /// A collector reporting through `logger`.
    pub fn new(logger: Logger) -> Self {
        Self { logger }
    }

    /// Every middleware descriptor, in extension order.
    pub fn collect_middleware(&self, extensions: &[Arc<dyn Extension>]) -> Vec<MiddlewareDescriptor> {
        let mut chain = Vec::new();
        for extension in extensions {
            if let Some(provider) = extension.as_middleware_provider() {
                let contributed = provider.middleware();
                self.logger.debug(format!(
                    "{} contributed {} middleware",
                    extension.name(),
                    contributed.len()
                ));
                chain.extend(contributed);
            }
        }
        chain
    }

    /// Let every CLI provider append its subcommands to `group`.
    pub fn collect_cli(&self, extensions: &[Arc<dyn Extension>], group: &mut CliGroup) {
        for extension in extensions {
            if let Some(provider) = extension.as_cli_provider() {
                self.logger
                    .debug(format!("Registering commands of {}", extension.name()));
                provider.register_cli(group);
            }
        }
    }

    /// Let every exception handler provider register on `app`.
    ///
    /// A later registration for the same error type replaces the earlier
    /// one. Each replacement is logged at warn and returned.
    pub fn install_exception_handlers(
        &self,
        extensions: &[Arc<dyn Extension>],
        app: &App,
    ) -> Vec<Override> {
        let mut overrides = Vec::new();
        for extension in extensions {
            let Some(provider) = extension.as_exception_handler_provider() else {
                continue;
            };

            let mut registrar = ExceptionRegistrar::new(app, extension.name());
            provider.add_exception_handlers(&mut registrar);

            for replaced in registrar.into_overrides() {
                self.logger.warn(format!(
                    "Exception handler for {} registered by {} overrides the one from {}",
                    short_type_name(replaced.type_name),
                    replaced.owner,
                    replaced.previous_owner
                ));
                overrides.push(replaced);
            }
        }
        overrides
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use clap::Command;
    use cuneus_core::serving::{Middleware, Next, Request, Response, ServingOptions};
    use cuneus_core::traits::{CliProvider, ExceptionHandlerProvider, MiddlewareProvider};
    use cuneus_core::utils::LoggerFactory;
    use serde_json::json;

    #[derive(Debug, thiserror::Error)]
    #[error("quota exceeded")]
    struct QuotaExceeded;

    struct Pass;

    #[async_trait]
    impl Middleware for Pass {
        async fn handle(&self, request: Request, next: Next<'_>) -> anyhow::Result<Response> {
            next.run(request).await
        }
    }

    struct Everything {
        name: &'static str,
        status: u16,
    }

    #[async_trait]
    impl Extension for Everything {
        fn name(&self) -> &str {
            self.name
        }

        fn as_middleware_provider(&self) -> Option<&dyn MiddlewareProvider> {
            Some(self)
        }

        fn as_cli_provider(&self) -> Option<&dyn CliProvider> {
            Some(self)
        }

        fn as_exception_handler_provider(&self) -> Option<&dyn ExceptionHandlerProvider> {
            Some(self)
        }
    }

    impl MiddlewareProvider for Everything {
        fn middleware(&self) -> Vec<MiddlewareDescriptor> {
            vec![
                MiddlewareDescriptor::new(format!("{}-outer", self.name), Pass),
                MiddlewareDescriptor::new(format!("{}-inner", self.name), Pass),
            ]
        }
    }

    impl CliProvider for Everything {
        fn register_cli(&self, group: &mut CliGroup) {
            group.add_command(Command::new(self.name), |_| async { Ok::<(), anyhow::Error>(()) });
        }
    }

    impl ExceptionHandlerProvider for Everything {
        fn add_exception_handlers(&self, handlers: &mut ExceptionRegistrar<'_>) {
            let status = self.status;
            handlers.handle::<QuotaExceeded, _>(move |_, _| Response::json(status, json!(null)));
        }
    }

    struct Plain;

    #[async_trait]
    impl Extension for Plain {}

    fn extensions() -> Vec<Arc<dyn Extension>> {
        vec![
            Arc::new(Everything {
                name: "first",
                status: 429,
            }),
            Arc::new(Plain),
            Arc::new(Everything {
                name: "second",
                status: 503,
            }),
        ]
    }

    fn collector() -> CapabilityCollector {
        CapabilityCollector::new(LoggerFactory::default().logger("collector"))
    }

    #[test]
    fn test_middleware_keeps_extension_order() {
        let chain = collector().collect_middleware(&extensions());
        let names: Vec<&str> = chain.iter().map(MiddlewareDescriptor::name).collect();
        assert_eq!(
            names,
            vec!["first-outer", "first-inner", "second-outer", "second-inner"]
        );
    }

    #[test]
    fn test_cli_commands_are_appended() {
        let mut group = CliGroup::new("app");
        collector().collect_cli(&extensions(), &mut group);
        assert_eq!(group.command_names(), vec!["first", "second"]);
    }

    #[tokio::test]
    async fn test_later_exception_handler_wins() {
        let app = App::new(ServingOptions::new(), Vec::new());
        let overrides = collector().install_exception_handlers(&extensions(), &app);

        assert_eq!(overrides.len(), 1);
        assert_eq!(overrides[0].previous_owner, "first");
        assert_eq!(overrides[0].owner, "second");

        app.include_router(cuneus_core::serving::Router::new().get("/quota", |_| async {
            Err::<Response, _>(anyhow::Error::new(QuotaExceeded))
        }));
        assert_eq!(app.handle(Request::get("/quota")).await.status, 503);
    }
}
