//! Request and response values exchanged with the serving object.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::types::State;

/// HTTP method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Method {
    /// GET
    Get,
    /// POST
    Post,
    /// PUT
    Put,
    /// PATCH
    Patch,
    /// DELETE
    Delete,
    /// HEAD
    Head,
    /// OPTIONS
    Options,
}

impl Method {
    /// Upper-case method name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
            Self::Head => "HEAD",
            Self::Options => "OPTIONS",
        }
    }
}

impl FromStr for Method {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(Self::Get),
            "POST" => Ok(Self::Post),
            "PUT" => Ok(Self::Put),
            "PATCH" => Ok(Self::Patch),
            "DELETE" => Ok(Self::Delete),
            "HEAD" => Ok(Self::Head),
            "OPTIONS" => Ok(Self::Options),
            other => Err(format!("unsupported method '{}'", other)),
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Case-insensitive header map. Names are stored lower-cased.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers(BTreeMap<String, String>);

impl Headers {
    /// An empty header map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a header.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(&name.to_ascii_lowercase()).map(String::as_str)
    }

    /// Set a header, replacing any previous value.
    pub fn insert(&mut self, name: impl AsRef<str>, value: impl Into<String>) {
        self.0
            .insert(name.as_ref().to_ascii_lowercase(), value.into());
    }

    /// Whether a header is present.
    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(&name.to_ascii_lowercase())
    }

    /// Iterate over `(name, value)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Number of headers.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether there are no headers.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// An incoming request.
#[derive(Debug, Clone)]
pub struct Request {
    /// Request method
    pub method: Method,

    /// Request path, without query string
    pub path: String,

    /// Request headers
    pub headers: Headers,

    /// JSON body (`Null` when absent)
    pub body: serde_json::Value,

    /// Correlation id, set by the request-id middleware
    pub request_id: Option<String>,

    app_state: Option<State>,
}

impl Request {
    /// Create a request with no headers and no body.
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            headers: Headers::new(),
            body: serde_json::Value::Null,
            request_id: None,
            app_state: None,
        }
    }

    /// A GET request.
    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::Get, path)
    }

    /// A POST request with a JSON body.
    pub fn post(path: impl Into<String>, body: serde_json::Value) -> Self {
        Self::new(Method::Post, path).with_body(body)
    }

    /// Add a header.
    pub fn with_header(mut self, name: impl AsRef<str>, value: impl Into<String>) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Replace the body.
    pub fn with_body(mut self, body: serde_json::Value) -> Self {
        self.body = body;
        self
    }

    /// The application state namespace, once startup has completed.
    pub fn app_state(&self) -> Option<&State> {
        self.app_state.as_ref()
    }

    pub(crate) fn set_app_state(&mut self, state: Option<State>) {
        self.app_state = state;
    }
}

/// An outgoing response.
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    /// Status code
    pub status: u16,

    /// Response headers
    pub headers: Headers,

    /// JSON body
    pub body: serde_json::Value,
}

impl Response {
    /// A JSON response with the given status.
    pub fn json(status: u16, body: serde_json::Value) -> Self {
        Self {
            status,
            headers: Headers::new(),
            body,
        }
    }

    /// A 200 response.
    pub fn ok(body: serde_json::Value) -> Self {
        Self::json(200, body)
    }

    /// Serialize a value into a JSON response.
    ///
    /// Serialization failures become a bare 500.
    pub fn from_serialize<T: Serialize>(status: u16, value: &T) -> Self {
        match serde_json::to_value(value) {
            Ok(body) => Self::json(status, body),
            Err(_) => Self::json(500, serde_json::Value::Null),
        }
    }

    /// Add a header.
    pub fn with_header(mut self, name: impl AsRef<str>, value: impl Into<String>) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Whether the status is 2xx.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_headers_are_case_insensitive() {
        let mut headers = Headers::new();
        headers.insert("X-Request-ID", "abc");

        assert_eq!(headers.get("x-request-id"), Some("abc"));
        assert_eq!(headers.get("X-REQUEST-ID"), Some("abc"));
        assert!(headers.contains("X-Request-Id"));
        assert_eq!(headers.len(), 1);
    }

    #[test]
    fn test_method_parsing() {
        assert_eq!("get".parse::<Method>(), Ok(Method::Get));
        assert_eq!(Method::Delete.to_string(), "DELETE");
        assert!("BREW".parse::<Method>().is_err());
    }

    #[test]
    fn test_request_builders() {
        let request = Request::post("/items", serde_json::json!({"name": "wedge"}))
            .with_header("Content-Type", "application/json");

        assert_eq!(request.method, Method::Post);
        assert_eq!(request.body["name"], "wedge");
        assert_eq!(request.headers.get("content-type"), Some("application/json"));
        assert!(request.app_state().is_none());
    }

    #[test]
    fn test_response_builders() {
        let response = Response::ok(serde_json::json!({"status": "ok"})).with_header("Retry-After", "5");
        assert!(response.is_success());
        assert_eq!(response.headers.get("retry-after"), Some("5"));
        assert!(!Response::json(503, serde_json::Value::Null).is_success());
    }
}
