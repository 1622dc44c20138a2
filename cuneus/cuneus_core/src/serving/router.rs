//! Routes and handlers.

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;

use super::request::{Method, Request, Response};
use crate::error::ServingError;

/// Something that turns a request into a response.
#[async_trait]
pub trait Handler: Send + Sync + 'static {
    /// Handle one request.
    async fn call(&self, request: Request) -> anyhow::Result<Response>;
}

/// Adapter turning an async closure into a [`Handler`].
pub struct HandlerFn<F>(pub F);

#[async_trait]
impl<F, Fut> Handler for HandlerFn<F>
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<Response>> + Send + 'static,
{
    async fn call(&self, request: Request) -> anyhow::Result<Response> {
        (self.0)(request).await
    }
}

/// A method, path and handler.
#[derive(Clone)]
pub struct Route {
    method: Method,
    path: String,
    handler: Arc<dyn Handler>,
}

impl Route {
    /// Route method.
    pub fn method(&self) -> Method {
        self.method
    }

    /// Route path.
    pub fn path(&self) -> &str {
        &self.path
    }
}

/// Summary of a mounted route, as listed by the `routes` command.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct RouteInfo {
    /// Route method
    pub method: Method,
    /// Route path
    pub path: String,
}

/// An ordered set of routes under an optional prefix.
///
/// Paths match exactly. When two routes share a method and path the first
/// one mounted wins.
#[derive(Clone, Default)]
pub struct Router {
    prefix: String,
    routes: Vec<Route>,
}

impl Router {
    /// An empty router without prefix.
    pub fn new() -> Self {
        Self::default()
    }

    /// An empty router whose routes live under `prefix`.
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: normalize(&prefix.into()),
            routes: Vec::new(),
        }
    }

    /// Mount a handler.
    pub fn route<H: Handler>(mut self, method: Method, path: &str, handler: H) -> Self {
        self.add(method, path, Arc::new(handler));
        self
    }

    /// Mount an async closure for GET.
    pub fn get<F, Fut>(self, path: &str, handler: F) -> Self
    where
        F: Fn(Request) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<Response>> + Send + 'static,
    {
        self.route(Method::Get, path, HandlerFn(handler))
    }

    /// Mount an async closure for POST.
    pub fn post<F, Fut>(self, path: &str, handler: F) -> Self
    where
        F: Fn(Request) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<Response>> + Send + 'static,
    {
        self.route(Method::Post, path, HandlerFn(handler))
    }

    /// Mount every route of `other` under `prefix`.
    pub fn nest(mut self, prefix: &str, other: Router) -> Self {
        let prefix = normalize(prefix);
        for route in other.routes {
            let path = join(&prefix, &route.path);
            self.add(route.method, &path, route.handler);
        }
        self
    }

    /// Append every route of `other`, keeping its paths.
    pub fn merge(&mut self, other: Router) {
        for route in other.routes {
            self.add(route.method, &route.path, route.handler);
        }
    }

    /// Find the handler for a request.
    pub fn lookup(&self, method: Method, path: &str) -> Result<Arc<dyn Handler>, ServingError> {
        let mut path_known = false;
        for route in &self.routes {
            if route.path != path {
                continue;
            }
            if route.method == method {
                return Ok(route.handler.clone());
            }
            path_known = true;
        }

        if path_known {
            Err(ServingError::MethodNotAllowed {
                method: method.to_string(),
                path: path.to_string(),
            })
        } else {
            Err(ServingError::NotFound {
                method: method.to_string(),
                path: path.to_string(),
            })
        }
    }

    /// Mounted routes, in mount order.
    pub fn routes(&self) -> impl Iterator<Item = &Route> {
        self.routes.iter()
    }

    /// Number of routes.
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    /// Whether no route is mounted.
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    fn add(&mut self, method: Method, path: &str, handler: Arc<dyn Handler>) {
        self.routes.push(Route {
            method,
            path: join(&self.prefix, path),
            handler,
        });
    }
}

fn normalize(prefix: &str) -> String {
    let trimmed = prefix.trim_end_matches('/');
    if trimmed.is_empty() || trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{}", trimmed)
    }
}

fn join(prefix: &str, path: &str) -> String {
    match (prefix.is_empty(), path.is_empty() || path == "/") {
        (true, true) => "/".to_string(),
        (true, false) => normalize(path),
        (false, true) => prefix.to_string(),
        (false, false) => format!("{}{}", prefix, normalize(path)),
    }
}
