//! The serving object.
//!
//! An [`App`] owns the router, the exception handler table and the
//! middleware chain. Middleware is fixed at construction; routes and
//! exception handlers may be added afterwards, including while extensions
//! are starting. The merged state namespace is published once startup has
//! completed and withdrawn at shutdown.

use std::error::Error as StdError;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::json;
use tracing::{debug, error};

use super::exception::{ErrorContext, ExceptionHandlers, Override};
use super::middleware::{MiddlewareDescriptor, Next};
use super::options::ServingOptions;
use super::request::{Request, Response};
use super::router::{Handler, RouteInfo, Router};
use crate::error::ServingError;
use crate::types::State;

struct AppInner {
    options: ServingOptions,
    middleware: Vec<MiddlewareDescriptor>,
    router: RwLock<Router>,
    exception_handlers: RwLock<ExceptionHandlers>,
    state: RwLock<Option<State>>,
}

/// In-process request dispatcher. Clones share the same application.
#[derive(Clone)]
pub struct App {
    inner: Arc<AppInner>,
}

impl App {
    /// Build the serving object with its final middleware chain.
    pub fn new(options: ServingOptions, middleware: Vec<MiddlewareDescriptor>) -> Self {
        debug!(
            "Building serving object with {} middleware",
            middleware.len()
        );
        Self {
            inner: Arc::new(AppInner {
                options,
                middleware,
                router: RwLock::new(Router::new()),
                exception_handlers: RwLock::new(ExceptionHandlers::new()),
                state: RwLock::new(None),
            }),
        }
    }

    /// Construction options.
    pub fn options(&self) -> &ServingOptions {
        &self.inner.options
    }

    /// The middleware chain, outermost first.
    pub fn middleware(&self) -> &[MiddlewareDescriptor] {
        &self.inner.middleware
    }

    /// Mount every route of `router`.
    pub fn include_router(&self, router: Router) {
        self.inner.router.write().merge(router);
    }

    /// Mounted routes, in mount order.
    pub fn routes(&self) -> Vec<RouteInfo> {
        self.inner
            .router
            .read()
            .routes()
            .map(|route| RouteInfo {
                method: route.method(),
                path: route.path().to_string(),
            })
            .collect()
    }

    /// Register a handler for errors of type `E` on behalf of `owner`.
    ///
    /// Returns the replaced registration, if any.
    pub fn add_exception_handler<E, F>(&self, owner: &str, handler: F) -> Option<Override>
    where
        E: StdError + 'static,
        F: Fn(&ErrorContext, &E) -> Response + Send + Sync + 'static,
    {
        self.inner
            .exception_handlers
            .write()
            .insert::<E, F>(owner, handler)
    }

    /// Install the handler for errors no typed handler claims.
    pub fn set_catch_all_handler<F>(&self, owner: &str, handler: F) -> Option<Override>
    where
        F: Fn(&ErrorContext, &anyhow::Error) -> Response + Send + Sync + 'static,
    {
        self.inner
            .exception_handlers
            .write()
            .set_catch_all(owner, handler)
    }

    /// Whether a typed handler exists for `E`.
    pub fn has_exception_handler<E: StdError + 'static>(&self) -> bool {
        self.inner.exception_handlers.read().handles::<E>()
    }

    /// Whether a catch-all handler is installed.
    pub fn has_catch_all_handler(&self) -> bool {
        self.inner.exception_handlers.read().has_catch_all()
    }

    /// Publish the merged state namespace to request handlers.
    pub fn publish_state(&self, state: State) {
        *self.inner.state.write() = Some(state);
    }

    /// Withdraw the state namespace.
    pub fn clear_state(&self) {
        self.inner.state.write().take();
    }

    /// The published state namespace.
    pub fn state(&self) -> Option<State> {
        self.inner.state.read().clone()
    }

    /// Dispatch a request through the middleware chain and the router.
    ///
    /// Never fails: every error becomes a response.
    pub async fn handle(&self, mut request: Request) -> Response {
        request.set_app_state(self.state());
        let context = ErrorContext::from(&request);

        let endpoint = Dispatch { app: self.clone() };
        match Next::new(&self.inner.middleware, &endpoint)
            .run(request)
            .await
        {
            Ok(response) => response,
            Err(err) => self.render_error(&context, &err),
        }
    }

    /// Turn an error into a response.
    ///
    /// Typed handlers are tried first, then the built-in routing responses,
    /// then the catch-all handler, then a bare 500.
    pub fn render_error(&self, context: &ErrorContext, err: &anyhow::Error) -> Response {
        let handlers = self.inner.exception_handlers.read();

        if let Some(response) = handlers.resolve_typed(context, err) {
            return response;
        }

        if let Some(serving) = err.downcast_ref::<ServingError>() {
            return routing_response(serving);
        }

        if let Some(response) = handlers.resolve_catch_all(context, err) {
            return response;
        }

        error!(
            method = %context.method,
            path = %context.path,
            "Unhandled error: {:#}",
            err
        );
        Response::json(
            500,
            json!({
                "error": {
                    "status": 500,
                    "code": "internal_error",
                    "message": "Internal Server Error",
                }
            }),
        )
    }
}

fn routing_response(err: &ServingError) -> Response {
    let (code, message) = match err {
        ServingError::NotFound { .. } => ("not_found", "Not Found"),
        ServingError::MethodNotAllowed { .. } => ("method_not_allowed", "Method Not Allowed"),
    };
    Response::json(
        err.status(),
        json!({
            "error": {
                "status": err.status(),
                "code": code,
                "message": message,
            }
        }),
    )
}

/// Innermost link of the chain: routes the request and renders handler errors.
struct Dispatch {
    app: App,
}

#[async_trait]
impl Handler for Dispatch {
    async fn call(&self, request: Request) -> anyhow::Result<Response> {
        let context = ErrorContext::from(&request);
        let handler = self
            .app
            .inner
            .router
            .read()
            .lookup(request.method, &request.path);

        let result = match handler {
            Ok(handler) => handler.call(request).await,
            Err(err) => Err(err.into()),
        };

        Ok(result.unwrap_or_else(|err| self.app.render_error(&context, &err)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::serving::middleware::Middleware;
    use crate::serving::request::Method;
    use crate::types::{ExtensionState, StateLedger};
    use thiserror::Error;

    #[derive(Debug, Error)]
    #[error("teapot")]
    struct Teapot;

    fn app() -> App {
        let app = App::new(ServingOptions::new().title("test"), Vec::new());
        app.include_router(
            Router::new()
                .get("/hello", |_| async { Ok::<_, anyhow::Error>(Response::ok(json!("hello"))) })
                .get("/teapot", |_| async { Err::<Response, _>(anyhow::Error::new(Teapot)) })
                .get("/boom", |_| async { Err::<Response, _>(anyhow::anyhow!("boom")) })
                .get("/state", |request: Request| async move {
                    let value = request
                        .app_state()
                        .and_then(|state| state.get::<i32>("answer").copied());
                    Ok::<_, anyhow::Error>(Response::ok(json!(value)))
                }),
        );
        app
    }

    #[tokio::test]
    async fn test_routes_are_dispatched() {
        let response = app().handle(Request::get("/hello")).await;
        assert_eq!(response.status, 200);
        assert_eq!(response.body, json!("hello"));
    }

    #[tokio::test]
    async fn test_routing_misses() {
        let app = app();
        assert_eq!(app.handle(Request::get("/nope")).await.status, 404);

        let response = app.handle(Request::new(Method::Delete, "/hello")).await;
        assert_eq!(response.status, 405);
        assert_eq!(response.body["error"]["code"], "method_not_allowed");
    }

    #[tokio::test]
    async fn test_unhandled_error_is_generic_500() {
        let response = app().handle(Request::get("/boom")).await;
        assert_eq!(response.status, 500);
        assert_eq!(response.body["error"]["code"], "internal_error");
    }

    #[tokio::test]
    async fn test_typed_and_catch_all_handlers() {
        let app = app();
        app.add_exception_handler::<Teapot, _>("tests", |_, _| Response::json(418, json!("short and stout")));
        app.set_catch_all_handler("tests", |_, err| Response::json(500, json!(err.to_string())));

        assert_eq!(app.handle(Request::get("/teapot")).await.status, 418);
        assert_eq!(app.handle(Request::get("/boom")).await.body, json!("boom"));
        // Routing misses are not swallowed by the catch-all.
        assert_eq!(app.handle(Request::get("/nope")).await.status, 404);
    }

    #[tokio::test]
    async fn test_state_is_visible_once_published() {
        let app = app();
        assert_eq!(app.handle(Request::get("/state")).await.body, json!(null));

        let mut ledger = StateLedger::new();
        ledger
            .merge("answers", ExtensionState::new().with("answer", 42i32))
            .unwrap();
        app.publish_state(ledger.finish());
        assert_eq!(app.handle(Request::get("/state")).await.body, json!(42));

        app.clear_state();
        assert!(app.state().is_none());
    }

    struct Tag;

    #[async_trait]
    impl Middleware for Tag {
        async fn handle(&self, request: Request, next: Next<'_>) -> anyhow::Result<Response> {
            let response = next.run(request).await?;
            Ok(response.with_header("x-tag", "seen"))
        }
    }

    #[tokio::test]
    async fn test_middleware_sees_error_responses() {
        let app = App::new(
            ServingOptions::new(),
            vec![MiddlewareDescriptor::new("tag", Tag)],
        );
        app.include_router(Router::new().get("/boom", |_| async { Err::<Response, _>(anyhow::anyhow!("boom")) }));

        let response = app.handle(Request::get("/boom")).await;
        assert_eq!(response.status, 500);
        assert_eq!(response.headers.get("x-tag"), Some("seen"));
        assert_eq!(app.middleware()[0].name(), "tag");
        assert_eq!(app.routes().len(), 1);
    }
}
