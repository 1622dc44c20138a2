//! Exception handler table.
//!
//! Handlers are keyed by error type. When a request fails, the error's
//! source chain is walked from the outermost error inwards, and the first
//! cause with a registered handler decides the response. Errors with no
//! typed handler go to the catch-all handler, if one is installed.
//!
//! Registering a second handler for the same type replaces the first. The
//! table reports the previous owner so the caller can log the override.

use std::any::{type_name, TypeId};
use std::collections::HashMap;
use std::error::Error as StdError;
use std::sync::Arc;

use super::request::{Method, Request, Response};

/// What an exception handler knows about the failed request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorContext {
    /// Request method
    pub method: Method,
    /// Request path
    pub path: String,
    /// Correlation id, if the request carried one
    pub request_id: Option<String>,
}

impl From<&Request> for ErrorContext {
    fn from(request: &Request) -> Self {
        Self {
            method: request.method,
            path: request.path.clone(),
            request_id: request.request_id.clone(),
        }
    }
}

type TypedHandler =
    Arc<dyn Fn(&ErrorContext, &(dyn StdError + 'static)) -> Option<Response> + Send + Sync>;
type CatchAllHandler = Arc<dyn Fn(&ErrorContext, &anyhow::Error) -> Response + Send + Sync>;

struct Entry {
    type_name: &'static str,
    owner: String,
    handler: TypedHandler,
}

/// A replaced registration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Override {
    /// Error type, or `"*"` for the catch-all
    pub type_name: &'static str,
    /// Extension that registered the replaced handler
    pub previous_owner: String,
    /// Extension that registered the new handler
    pub owner: String,
}

/// Error handlers keyed by error type, plus an optional catch-all.
#[derive(Default)]
pub struct ExceptionHandlers {
    entries: HashMap<TypeId, Entry>,
    order: Vec<TypeId>,
    catch_all: Option<(String, CatchAllHandler)>,
}

impl ExceptionHandlers {
    /// An empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for errors of type `E`.
    pub fn insert<E, F>(&mut self, owner: &str, handler: F) -> Option<Override>
    where
        E: StdError + 'static,
        F: Fn(&ErrorContext, &E) -> Response + Send + Sync + 'static,
    {
        let id = TypeId::of::<E>();
        let erased: TypedHandler = Arc::new(
            move |context: &ErrorContext, error: &(dyn StdError + 'static)| {
                error.downcast_ref::<E>().map(|error| handler(context, error))
            },
        );

        let entry = Entry {
            type_name: type_name::<E>(),
            owner: owner.to_string(),
            handler: erased,
        };

        match self.entries.insert(id, entry) {
            Some(previous) => Some(Override {
                type_name: previous.type_name,
                previous_owner: previous.owner,
                owner: owner.to_string(),
            }),
            None => {
                self.order.push(id);
                None
            }
        }
    }

    /// Install the handler for errors no typed handler claims.
    pub fn set_catch_all<F>(&mut self, owner: &str, handler: F) -> Option<Override>
    where
        F: Fn(&ErrorContext, &anyhow::Error) -> Response + Send + Sync + 'static,
    {
        self.catch_all
            .replace((owner.to_string(), Arc::new(handler)))
            .map(|(previous_owner, _)| Override {
                type_name: "*",
                previous_owner,
                owner: owner.to_string(),
            })
    }

    /// Response from the first typed handler matching a cause of `error`.
    pub fn resolve_typed(&self, context: &ErrorContext, error: &anyhow::Error) -> Option<Response> {
        error.chain().find_map(|cause| {
            self.order.iter().find_map(|id| {
                self.entries
                    .get(id)
                    .and_then(|entry| (entry.handler)(context, cause))
            })
        })
    }

    /// Response from the catch-all handler, if one is installed.
    pub fn resolve_catch_all(&self, context: &ErrorContext, error: &anyhow::Error) -> Option<Response> {
        self.catch_all
            .as_ref()
            .map(|(_, handler)| handler(context, error))
    }

    /// Whether a typed handler exists for `E`.
    pub fn handles<E: StdError + 'static>(&self) -> bool {
        self.entries.contains_key(&TypeId::of::<E>())
    }

    /// The extension that owns the handler for `E`.
    pub fn owner_of<E: StdError + 'static>(&self) -> Option<&str> {
        self.entries
            .get(&TypeId::of::<E>())
            .map(|entry| entry.owner.as_str())
    }

    /// Whether a catch-all handler is installed.
    pub fn has_catch_all(&self) -> bool {
        self.catch_all.is_some()
    }

    /// Number of typed handlers.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the table has neither typed handlers nor a catch-all.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty() && self.catch_all.is_none()
    }
}
