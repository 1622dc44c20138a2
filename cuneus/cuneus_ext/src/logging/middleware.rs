//! Request correlation middleware.

use std::time::Instant;

use async_trait::async_trait;
use cuneus_core::serving::{Middleware, Next, Request, Response};
use cuneus_core::Logger;
use tracing::{error, info, info_span, Instrument};
use uuid::Uuid;

use super::context::RequestContext;

/// Length of generated request ids.
pub const REQUEST_ID_LENGTH: usize = 8;

/// Tags every request with a correlation id and logs its outcome.
///
/// The id is taken from the configured header when the client sent one,
/// and generated otherwise. It is stored on the request, bound to the
/// task-local [`RequestContext`] and echoed in the response header.
pub struct RequestIdMiddleware {
    header_name: String,
    logger: Logger,
}

impl RequestIdMiddleware {
    /// Create the middleware for `header_name`.
    pub fn new(header_name: impl Into<String>, logger: Logger) -> Self {
        Self {
            header_name: header_name.into(),
            logger,
        }
    }

    /// The correlation header.
    pub fn header_name(&self) -> &str {
        &self.header_name
    }
}

/// A fresh request id: the first characters of a random UUID.
pub fn generate_request_id() -> String {
    let mut id = Uuid::new_v4().simple().to_string();
    id.truncate(REQUEST_ID_LENGTH);
    id
}

#[async_trait]
impl Middleware for RequestIdMiddleware {
    async fn handle(&self, mut request: Request, next: Next<'_>) -> anyhow::Result<Response> {
        let request_id = request
            .headers
            .get(&self.header_name)
            .filter(|value| !value.is_empty())
            .map(str::to_string)
            .unwrap_or_else(generate_request_id);

        request.request_id = Some(request_id.clone());
        let method = request.method;
        let path = request.path.clone();

        let span = info_span!(
            "request",
            request_id = %request_id,
            method = %method,
            path = %path,
        );
        let context = RequestContext::new(request_id.clone(), method.as_str(), path.clone());

        let started = Instant::now();
        let result = context
            .scope(next.run(request))
            .instrument(span.clone())
            .await;
        let duration_ms = (started.elapsed().as_secs_f64() * 100_000.0).round() / 100.0;

        let _entered = span.enter();
        match result {
            Ok(response) => {
                info!(
                    component = self.logger.component(),
                    status_code = response.status,
                    duration_ms,
                    "{} {} {}",
                    method,
                    path,
                    response.status
                );
                Ok(response.with_header(&self.header_name, request_id))
            }
            Err(err) => {
                error!(
                    component = self.logger.component(),
                    duration_ms,
                    "{} {} failed: {:#}",
                    method,
                    path,
                    err
                );
                Err(err)
            }
        }
    }
}
