//! Request context propagation
//!
//! The request-id middleware runs the rest of the request inside a
//! task-local [`RequestContext`], so any code on the request's task can
//! recover the correlation id without having the request at hand.

use std::future::Future;

tokio::task_local! {
    static CURRENT: RequestContext;
}

/// Per-request correlation data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestContext {
    /// Correlation id
    pub request_id: String,

    /// Request method
    pub method: String,

    /// Request path
    pub path: String,
}

impl RequestContext {
    /// Create a context
    pub fn new(
        request_id: impl Into<String>,
        method: impl Into<String>,
        path: impl Into<String>,
    ) -> Self {
        Self {
            request_id: request_id.into(),
            method: method.into(),
            path: path.into(),
        }
    }

    /// Run `future` with this context as the current one
    pub async fn scope<F: Future>(self, future: F) -> F::Output {
        CURRENT.scope(self, future).await
    }
}

/// The correlation id of the request running on this task, if any.
pub fn current_request_id() -> Option<String> {
    CURRENT.try_with(|context| context.request_id.clone()).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_context_is_visible_inside_scope_only() {
        assert!(current_request_id().is_none());

        let context = RequestContext::new("abc12345", "GET", "/items");
        let seen = context
            .clone()
            .scope(async { current_request_id() })
            .await;

        assert_eq!(seen.as_deref(), Some("abc12345"));
        assert!(current_request_id().is_none());
    }

    #[tokio::test]
    async fn test_nested_scopes_restore_outer_context() {
        let outer = RequestContext::new("outer", "GET", "/");
        let ids = outer
            .scope(async {
                let inner = RequestContext::new("inner", "GET", "/nested")
                    .scope(async { current_request_id() })
                    .await;
                (inner, current_request_id())
            })
            .await;

        assert_eq!(ids, (Some("inner".to_string()), Some("outer".to_string())));
    }
}
