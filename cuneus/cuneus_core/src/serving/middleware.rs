//! Middleware chain.
//!
//! The chain is fixed when the serving object is built. The first
//! descriptor wraps every later one, so it sees the request first and the
//! response last.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use super::request::{Request, Response};
use super::router::Handler;

/// Request middleware.
#[async_trait]
pub trait Middleware: Send + Sync + 'static {
    /// Process a request, usually by calling `next.run(request)`.
    async fn handle(&self, request: Request, next: Next<'_>) -> anyhow::Result<Response>;
}

/// A named middleware, as contributed by an extension.
#[derive(Clone)]
pub struct MiddlewareDescriptor {
    name: String,
    middleware: Arc<dyn Middleware>,
}

impl MiddlewareDescriptor {
    /// Wrap a middleware under a display name.
    pub fn new<M: Middleware>(name: impl Into<String>, middleware: M) -> Self {
        Self {
            name: name.into(),
            middleware: Arc::new(middleware),
        }
    }

    /// Display name.
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Debug for MiddlewareDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MiddlewareDescriptor")
            .field("name", &self.name)
            .finish()
    }
}

/// The remainder of the chain after the current middleware.
pub struct Next<'a> {
    chain: &'a [MiddlewareDescriptor],
    endpoint: &'a dyn Handler,
}

impl<'a> Next<'a> {
    pub(crate) fn new(chain: &'a [MiddlewareDescriptor], endpoint: &'a dyn Handler) -> Self {
        Self { chain, endpoint }
    }

    /// Pass the request on to the next middleware, or to the router once
    /// the chain is exhausted.
    pub async fn run(self, request: Request) -> anyhow::Result<Response> {
        match self.chain.split_first() {
            Some((current, rest)) => {
                current
                    .middleware
                    .handle(request, Next::new(rest, self.endpoint))
                    .await
            }
            None => self.endpoint.call(request).await,
        }
    }
}
