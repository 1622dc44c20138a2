//! Construction options for the serving object.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::error::ConfigError;

/// Keys the application builder manages itself.
pub const RESERVED_OPTIONS: [&str; 2] = ["lifespan", "middleware"];

/// Options passed through to the serving object.
///
/// Known keys populate typed fields; anything else is kept verbatim in
/// `extra`. The keys in [`RESERVED_OPTIONS`] are accepted here but refused
/// by [`ServingOptions::check_reserved`].
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ServingOptions {
    /// API title
    pub title: Option<String>,

    /// API description
    pub description: Option<String>,

    /// API version
    pub version: Option<String>,

    /// Pass-through keys
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl ServingOptions {
    /// Empty options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set an option by name.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.set(key, value);
        self
    }

    /// Set an option by name.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) {
        let key = key.into();
        let value = value.into();
        match (key.as_str(), value) {
            ("title", serde_json::Value::String(title)) => self.title = Some(title),
            ("description", serde_json::Value::String(text)) => self.description = Some(text),
            ("version", serde_json::Value::String(version)) => self.version = Some(version),
            (_, value) => {
                self.extra.insert(key, value);
            }
        }
    }

    /// Set the title.
    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Look up a pass-through key.
    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.extra.get(key)
    }

    /// Refuse options that would replace the managed lifecycle or middleware.
    pub fn check_reserved(&self) -> Result<(), ConfigError> {
        match RESERVED_OPTIONS
            .iter()
            .find(|key| self.extra.contains_key(**key))
        {
            Some(key) => Err(ConfigError::ReservedArgument(key.to_string())),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_keys_populate_fields() {
        let options = ServingOptions::new()
            .with("title", "Shop API")
            .with("version", "2.0")
            .with("docs_url", serde_json::Value::Null);

        assert_eq!(options.title.as_deref(), Some("Shop API"));
        assert_eq!(options.version.as_deref(), Some("2.0"));
        assert_eq!(options.get("docs_url"), Some(&serde_json::Value::Null));
        options.check_reserved().unwrap();
    }

    #[test]
    fn test_reserved_keys_are_refused() {
        let err = ServingOptions::new()
            .with("lifespan", true)
            .check_reserved()
            .unwrap_err();
        assert!(matches!(err, ConfigError::ReservedArgument(ref key) if key == "lifespan"));

        let err = ServingOptions::new()
            .with("middleware", serde_json::json!([]))
            .check_reserved()
            .unwrap_err();
        assert!(err.to_string().contains("'middleware'"));
    }
}
