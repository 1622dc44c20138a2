//! Exception handling extension and the application error catalogue.
//!
//! Handlers return [`AppException`] (directly or anywhere in an `anyhow`
//! chain) to produce a structured error response. Every other error is
//! answered with a generic 500 whose details are only exposed in debug
//! mode.

use std::collections::BTreeMap;
use std::fmt;

use async_trait::async_trait;
use cuneus_core::serving::{ErrorContext, Response};
use cuneus_core::traits::{
    ExceptionHandlerProvider, ExceptionRegistrar, Extension, ExtensionContext, FromContext,
};
use cuneus_core::Logger;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::logging::current_request_id;

/// Category of an application error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ErrorKind {
    /// 400
    BadRequest,
    /// 401
    Unauthorized,
    /// 403
    Forbidden,
    /// 404
    NotFound,
    /// 409
    Conflict,
    /// 429
    RateLimited,
    /// 503
    ServiceUnavailable,
    /// 503, database failure
    DatabaseError,
    /// 503, cache failure
    CacheError,
    /// 502
    ExternalServiceError,
    /// 500
    Internal,
}

impl ErrorKind {
    /// Every kind, in catalogue order.
    pub const ALL: [ErrorKind; 11] = [
        Self::BadRequest,
        Self::Unauthorized,
        Self::Forbidden,
        Self::NotFound,
        Self::Conflict,
        Self::RateLimited,
        Self::ServiceUnavailable,
        Self::DatabaseError,
        Self::CacheError,
        Self::ExternalServiceError,
        Self::Internal,
    ];

    /// Default status code.
    pub fn status(&self) -> u16 {
        match self {
            Self::BadRequest => 400,
            Self::Unauthorized => 401,
            Self::Forbidden => 403,
            Self::NotFound => 404,
            Self::Conflict => 409,
            Self::RateLimited => 429,
            Self::ServiceUnavailable | Self::DatabaseError | Self::CacheError => 503,
            Self::ExternalServiceError => 502,
            Self::Internal => 500,
        }
    }

    /// Default machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::BadRequest => "bad_request",
            Self::Unauthorized => "unauthorized",
            Self::Forbidden => "forbidden",
            Self::NotFound => "not_found",
            Self::Conflict => "conflict",
            Self::RateLimited => "rate_limited",
            Self::ServiceUnavailable => "service_unavailable",
            Self::DatabaseError => "database_error",
            Self::CacheError => "cache_error",
            Self::ExternalServiceError => "external_service_error",
            Self::Internal => "internal_error",
        }
    }

    /// Default human-readable message.
    pub fn default_message(&self) -> &'static str {
        match self {
            Self::BadRequest => "Invalid request",
            Self::Unauthorized => "Authentication required",
            Self::Forbidden => "Access denied",
            Self::NotFound => "Resource not found",
            Self::Conflict => "Resource conflict",
            Self::RateLimited => "Too many requests",
            Self::ServiceUnavailable => "Service temporarily unavailable",
            Self::DatabaseError => "Database operation failed",
            Self::CacheError => "Cache operation failed",
            Self::ExternalServiceError => "External service request failed",
            Self::Internal => "An unexpected error occurred",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// An application error that maps to a structured response.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{message}")]
pub struct AppException {
    kind: ErrorKind,
    message: String,
    error_code: String,
    status: u16,
    details: Option<serde_json::Value>,
    retry_after: Option<u64>,
}

impl AppException {
    /// An error of `kind` with its default code, status and message.
    pub fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            message: kind.default_message().to_string(),
            error_code: kind.code().to_string(),
            status: kind.status(),
            details: None,
            retry_after: None,
        }
    }

    /// 400 with a message.
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::BadRequest).with_message(message)
    }

    /// 401 with a message.
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unauthorized).with_message(message)
    }

    /// 403 with a message.
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Forbidden).with_message(message)
    }

    /// 404 with a message.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound).with_message(message)
    }

    /// 409 with a message.
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Conflict).with_message(message)
    }

    /// 429, optionally telling the client when to retry.
    pub fn rate_limited(retry_after: Option<u64>) -> Self {
        Self {
            retry_after,
            ..Self::new(ErrorKind::RateLimited)
        }
    }

    /// 503 with a message.
    pub fn service_unavailable(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ServiceUnavailable).with_message(message)
    }

    /// Replace the message.
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    /// Replace the error code.
    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.error_code = code.into();
        self
    }

    /// Replace the status code.
    pub fn with_status(mut self, status: u16) -> Self {
        self.status = status;
        self
    }

    /// Attach details.
    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    /// Error category.
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Human-readable message.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Machine-readable code.
    pub fn error_code(&self) -> &str {
        &self.error_code
    }

    /// Status code.
    pub fn status(&self) -> u16 {
        self.status
    }

    /// Attached details.
    pub fn details(&self) -> Option<&serde_json::Value> {
        self.details.as_ref()
    }

    /// Seconds after which the client may retry.
    pub fn retry_after(&self) -> Option<u64> {
        self.retry_after
    }

    /// The response body for this error.
    pub fn to_error_response(&self, request_id: Option<String>) -> ErrorResponse {
        ErrorResponse {
            error: ErrorDetails {
                status: Some(self.status),
                code: self.error_code.clone(),
                message: self.message.clone(),
                request_id,
                details: self.details.clone(),
            },
        }
    }

    /// The full response, including the `Retry-After` header.
    pub fn to_response(&self, request_id: Option<String>) -> Response {
        let response = Response::from_serialize(self.status, &self.to_error_response(request_id));
        match self.retry_after {
            Some(seconds) if seconds > 0 => response.with_header("Retry-After", seconds.to_string()),
            _ => response,
        }
    }
}

impl From<ErrorKind> for AppException {
    fn from(kind: ErrorKind) -> Self {
        Self::new(kind)
    }
}

/// The `error` object of an error response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorDetails {
    /// Status code
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    /// Machine-readable code
    pub code: String,
    /// Human-readable message
    pub message: String,
    /// Correlation id of the failed request
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    /// Extra information
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

/// Body of every error response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// The error
    pub error: ErrorDetails,
}

/// Status code to description table, for API documentation.
///
/// Kinds sharing a status code keep the description of the last one.
pub fn error_responses<I>(kinds: I) -> BTreeMap<u16, String>
where
    I: IntoIterator<Item = ErrorKind>,
{
    kinds
        .into_iter()
        .map(|kind| (kind.status(), kind.default_message().to_string()))
        .collect()
}

/// Leading identifier of an error's debug output, e.g. `ParseIntError`.
fn error_type_name(err: &anyhow::Error) -> String {
    let debug = format!("{:?}", err.root_cause());
    let name: String = debug
        .chars()
        .take_while(|c| c.is_alphanumeric() || *c == '_' || *c == ':')
        .collect();
    if name.is_empty() {
        "Error".to_string()
    } else {
        name
    }
}

/// Installs the [`AppException`] handler and the catch-all handler.
pub struct ExceptionExtension {
    debug: bool,
    log_server_errors: bool,
    logger: Logger,
}

impl ExceptionExtension {
    /// Create the extension from `context`.
    pub fn new(context: &ExtensionContext) -> Self {
        let settings = context.settings();
        Self {
            debug: settings.debug,
            log_server_errors: settings.log_server_errors,
            logger: context.logger("exceptions"),
        }
    }
}

impl Default for ExceptionExtension {
    fn default() -> Self {
        Self::new(&ExtensionContext::default())
    }
}

impl FromContext for ExceptionExtension {
    fn from_context(context: &ExtensionContext) -> anyhow::Result<Self> {
        Ok(Self::new(context))
    }
}

#[async_trait]
impl Extension for ExceptionExtension {
    fn as_exception_handler_provider(&self) -> Option<&dyn ExceptionHandlerProvider> {
        Some(self)
    }
}

impl ExceptionHandlerProvider for ExceptionExtension {
    fn add_exception_handlers(&self, handlers: &mut ExceptionRegistrar<'_>) {
        let logger = self.logger.clone();
        let log_server_errors = self.log_server_errors;
        handlers.handle::<AppException, _>(move |context: &ErrorContext, err: &AppException| {
            if err.status() >= 500 && log_server_errors {
                logger.error(format!(
                    "Server error on {} {}: {} ({})",
                    context.method,
                    context.path,
                    err.message(),
                    err.error_code()
                ));
            } else {
                logger.warn(format!(
                    "Client error on {} {}: {} ({})",
                    context.method,
                    context.path,
                    err.message(),
                    err.error_code()
                ));
            }

            err.to_response(context.request_id.clone().or_else(current_request_id))
        });

        let logger = self.logger.clone();
        let debug = self.debug;
        handlers.catch_all(move |context: &ErrorContext, err: &anyhow::Error| {
            logger.error(format!(
                "Unexpected error on {} {}: {:#}",
                context.method, context.path, err
            ));

            let details = debug.then(|| {
                serde_json::json!({
                    "exception": error_type_name(err),
                    "message": err.to_string(),
                })
            });
            let body = ErrorResponse {
                error: ErrorDetails {
                    status: None,
                    code: ErrorKind::Internal.code().to_string(),
                    message: ErrorKind::Internal.default_message().to_string(),
                    request_id: context.request_id.clone().or_else(current_request_id),
                    details,
                },
            };
            Response::from_serialize(500, &body)
        });
    }
}
