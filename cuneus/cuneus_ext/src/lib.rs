//! # Cuneus Extensions
//!
//! The default extension set, in the order it is prepended to every
//! application:
//!
//! 1. [`LoggingExtension`]: installs the subscriber and correlates requests
//! 2. [`HealthExtension`]: health, liveness and readiness routes
//! 3. [`ExceptionExtension`]: structured error responses
//!
//! Each can be replaced by passing an extension of the same type to the
//! application builder.

pub mod exceptions;
pub mod health;
pub mod logging;

pub use exceptions::{
    error_responses, AppException, ErrorDetails, ErrorKind, ErrorResponse, ExceptionExtension,
};
pub use health::{check_health, HealthExtension, HealthResponse, HealthStatus, ServiceHealth};
pub use logging::{
    current_request_id, generate_request_id, LoggingExtension, RequestContext,
    RequestIdMiddleware,
};
