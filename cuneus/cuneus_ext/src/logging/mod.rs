//! Logging extension.
//!
//! Reports how the shared logger factory is configured and contributes the
//! request correlation middleware. The subscriber itself is installed once
//! by the application builder.

pub mod context;
pub mod middleware;

use std::sync::Arc;

use async_trait::async_trait;
use cuneus_core::registry::ServiceRegistry;
use cuneus_core::serving::{App, MiddlewareDescriptor};
use cuneus_core::traits::{Extension, ExtensionContext, FromContext, MiddlewareProvider};
use cuneus_core::types::ExtensionState;
use cuneus_core::{Logger, LoggerFactory};

pub use context::{current_request_id, RequestContext};
pub use middleware::{generate_request_id, RequestIdMiddleware, REQUEST_ID_LENGTH};

/// Structured logging and request correlation.
pub struct LoggingExtension {
    factory: LoggerFactory,
    header_name: String,
    logger: Logger,
}

impl LoggingExtension {
    /// Take the shared factory and the correlation header from `context`.
    pub fn new(context: &ExtensionContext) -> Self {
        Self {
            factory: context.logging().clone(),
            header_name: context.settings().request_id_header.clone(),
            logger: context.logger("logging"),
        }
    }

    /// The shared factory.
    pub fn factory(&self) -> &LoggerFactory {
        &self.factory
    }

    /// The correlation header.
    pub fn header_name(&self) -> &str {
        &self.header_name
    }
}

impl Default for LoggingExtension {
    fn default() -> Self {
        Self::new(&ExtensionContext::default())
    }
}

impl FromContext for LoggingExtension {
    fn from_context(context: &ExtensionContext) -> anyhow::Result<Self> {
        Ok(Self::new(context))
    }
}

#[async_trait]
impl Extension for LoggingExtension {
    async fn startup(
        &self,
        _registry: &Arc<ServiceRegistry>,
        _app: &App,
    ) -> anyhow::Result<ExtensionState> {
        self.logger.debug(format!(
            "Logging at {} ({:?}), correlating requests on {}",
            self.factory.level(),
            self.factory.format(),
            self.header_name
        ));
        Ok(ExtensionState::new())
    }

    fn as_middleware_provider(&self) -> Option<&dyn MiddlewareProvider> {
        Some(self)
    }
}

impl MiddlewareProvider for LoggingExtension {
    fn middleware(&self) -> Vec<MiddlewareDescriptor> {
        vec![MiddlewareDescriptor::new(
            "request_id",
            RequestIdMiddleware::new(self.header_name.clone(), self.factory.logger("request")),
        )]
    }
}
