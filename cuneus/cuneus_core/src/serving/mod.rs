//! Minimal in-process serving object.
//!
//! Enough HTTP shape to mount routes, run a middleware chain and map
//! errors to responses. Embedding servers translate their own request type
//! into a [`Request`] and call [`App::handle`].

mod app;
mod exception;
mod middleware;
mod options;
mod request;
mod router;

pub use app::App;
pub use exception::{ErrorContext, ExceptionHandlers, Override};
pub use middleware::{Middleware, MiddlewareDescriptor, Next};
pub use options::{ServingOptions, RESERVED_OPTIONS};
pub use request::{Headers, Method, Request, Response};
pub use router::{Handler, HandlerFn, Route, RouteInfo, Router};
