//! Application settings.
//!
//! Settings are resolved once, before composition, and are read-only
//! afterwards. Sources are layered with increasing priority:
//!
//! 1. Built-in defaults
//! 2. A TOML file, either flat or nested under `[tool.cuneus]`
//! 3. Environment variables named `CUNEUS_<FIELD>`
//!
//! Keys that do not correspond to a known field are kept in `extra`, so
//! extensions can carry their own configuration in the same file.

use std::collections::BTreeMap;
use std::path::Path;
use std::str::FromStr;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::logging::LogLevel;
use crate::error::ConfigError;

/// Name of the tool table inside a project manifest.
pub const DEFAULT_TOOL_NAME: &str = "cuneus";

/// Prefix for environment overrides.
pub const ENV_PREFIX: &str = "CUNEUS_";

/// Application settings shared by every extension.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// Application name
    #[serde(default = "default_app_name")]
    pub app_name: String,

    /// Application version reported by health checks
    #[serde(default)]
    pub version: Option<String>,

    /// Debug mode; exposes error details in responses
    #[serde(default)]
    pub debug: bool,

    /// Log level name (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Emit JSON log lines instead of human-readable output
    #[serde(default)]
    pub log_json: bool,

    /// Log server-side (5xx) application errors
    #[serde(default = "default_true")]
    pub log_server_errors: bool,

    /// Header carrying the request correlation id
    #[serde(default = "default_request_id_header")]
    pub request_id_header: String,

    /// Whether the health extension mounts its routes
    #[serde(default = "default_true")]
    pub health_enabled: bool,

    /// Path prefix of the health routes
    #[serde(default = "default_health_prefix")]
    pub health_prefix: String,

    /// Additional, application-defined settings
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

fn default_app_name() -> String {
    "app".to_string()
}

fn default_log_level() -> String {
    "INFO".to_string()
}

fn default_true() -> bool {
    true
}

fn default_request_id_header() -> String {
    "X-Request-ID".to_string()
}

fn default_health_prefix() -> String {
    "/healthz".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            app_name: default_app_name(),
            version: None,
            debug: false,
            log_level: default_log_level(),
            log_json: false,
            log_server_errors: true,
            request_id_header: default_request_id_header(),
            health_enabled: true,
            health_prefix: default_health_prefix(),
            extra: BTreeMap::new(),
        }
    }
}

impl Settings {
    /// Load settings from an optional file, then apply environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut settings = match path {
            Some(path) => Self::from_file(path)?,
            None => {
                info!("No settings file specified, using defaults");
                Self::default()
            }
        };

        settings.apply_env(std::env::vars())?;
        settings.validate()?;

        Ok(settings)
    }

    /// Read settings from a TOML file.
    ///
    /// A missing file yields the defaults.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            warn!("Settings file not found: {}", path.display());
            return Ok(Self::default());
        }

        info!("Loading settings from {}", path.display());
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::LoadFailed(format!("{}: {}", path.display(), e)))?;

        Self::from_toml_str(&content)
    }

    /// Parse settings from TOML text.
    ///
    /// If the document has a `[tool.cuneus]` table, only that table is used.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let document: toml::Table =
            toml::from_str(content).map_err(|e| ConfigError::ParseFailed(e.to_string()))?;

        let table = match document
            .get("tool")
            .and_then(|tool| tool.get(DEFAULT_TOOL_NAME))
        {
            Some(toml::Value::Table(table)) => table.clone(),
            Some(_) => {
                return Err(ConfigError::ParseFailed(format!(
                    "[tool.{}] must be a table",
                    DEFAULT_TOOL_NAME
                )))
            }
            None => document,
        };

        toml::Value::Table(table)
            .try_into()
            .map_err(|e: toml::de::Error| ConfigError::ParseFailed(e.to_string()))
    }

    /// Apply `CUNEUS_*` overrides from the given variables.
    ///
    /// Unknown names land in `extra`, lowercased, as strings.
    pub fn apply_env<I>(&mut self, vars: I) -> Result<(), ConfigError>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        for (name, value) in vars {
            let Some(field) = name.strip_prefix(ENV_PREFIX) else {
                continue;
            };
            let field = field.to_ascii_lowercase();

            match field.as_str() {
                "app_name" => self.app_name = value,
                "version" => self.version = Some(value),
                "debug" => self.debug = parse_bool(&name, &value)?,
                "log_level" => self.log_level = value,
                "log_json" => self.log_json = parse_bool(&name, &value)?,
                "log_server_errors" => self.log_server_errors = parse_bool(&name, &value)?,
                "request_id_header" => self.request_id_header = value,
                "health_enabled" => self.health_enabled = parse_bool(&name, &value)?,
                "health_prefix" => self.health_prefix = value,
                _ => {
                    self.extra.insert(field, serde_json::Value::String(value));
                }
            }
        }

        Ok(())
    }

    /// Validate the settings.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.app_name.trim().is_empty() {
            return Err(ConfigError::Invalid("app_name cannot be empty".to_string()));
        }

        if LogLevel::from_str(&self.log_level).is_err() {
            return Err(ConfigError::Invalid(format!(
                "unknown log level '{}'",
                self.log_level
            )));
        }

        if !self.health_prefix.starts_with('/') {
            return Err(ConfigError::Invalid(format!(
                "health_prefix must start with '/', got '{}'",
                self.health_prefix
            )));
        }

        if self.request_id_header.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "request_id_header cannot be empty".to_string(),
            ));
        }

        Ok(())
    }

    /// The parsed log level.
    pub fn log_level(&self) -> LogLevel {
        LogLevel::from_str(&self.log_level).unwrap_or(LogLevel::Info)
    }

    /// Deserialize an application-defined value from `extra`.
    pub fn extra<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.extra
            .get(key)
            .and_then(|value| serde_json::from_value(value.clone()).ok())
    }
}

fn parse_bool(name: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::Invalid(format!(
            "{} must be a boolean, got '{}'",
            name, value
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();

        assert_eq!(settings.app_name, "app");
        assert_eq!(settings.request_id_header, "X-Request-ID");
        assert_eq!(settings.health_prefix, "/healthz");
        assert!(settings.health_enabled);
        assert!(!settings.debug);
        assert_eq!(settings.log_level(), LogLevel::Info);
        settings.validate().unwrap();
    }

    #[test]
    fn test_load_tool_table_from_manifest() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
[project]
name = "shop"

[tool.cuneus]
app_name = "shop"
version = "1.2.3"
debug = true
health_prefix = "/health"
database_url = "postgres://localhost/shop"
"#
        )
        .unwrap();

        let settings = Settings::from_file(file.path()).unwrap();

        assert_eq!(settings.app_name, "shop");
        assert_eq!(settings.version.as_deref(), Some("1.2.3"));
        assert!(settings.debug);
        assert_eq!(settings.health_prefix, "/health");
        assert_eq!(
            settings.extra::<String>("database_url").as_deref(),
            Some("postgres://localhost/shop")
        );
        assert!(!settings.extra.contains_key("project"));
    }

    #[test]
    fn test_load_flat_file() {
        let settings = Settings::from_toml_str("app_name = \"flat\"\nlog_json = true\n").unwrap();

        assert_eq!(settings.app_name, "flat");
        assert!(settings.log_json);
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings::from_file(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn test_unparsable_file_is_rejected() {
        let err = Settings::from_toml_str("app_name = ").unwrap_err();
        assert!(matches!(err, ConfigError::ParseFailed(_)));
    }

    #[test]
    fn test_env_overrides_file_values() {
        let mut settings = Settings::from_toml_str("app_name = \"from-file\"").unwrap();

        settings
            .apply_env(vec![
                ("CUNEUS_APP_NAME".to_string(), "from-env".to_string()),
                ("CUNEUS_DEBUG".to_string(), "true".to_string()),
                ("CUNEUS_CACHE_URL".to_string(), "redis://cache".to_string()),
                ("UNRELATED".to_string(), "ignored".to_string()),
            ])
            .unwrap();

        assert_eq!(settings.app_name, "from-env");
        assert!(settings.debug);
        assert_eq!(
            settings.extra::<String>("cache_url").as_deref(),
            Some("redis://cache")
        );
        assert!(!settings.extra.contains_key("unrelated"));
    }

    #[test]
    fn test_env_bool_must_parse() {
        let mut settings = Settings::default();
        let err = settings
            .apply_env(vec![("CUNEUS_DEBUG".to_string(), "maybe".to_string())])
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let settings = Settings {
            health_prefix: "healthz".to_string(),
            ..Settings::default()
        };
        assert!(settings.validate().is_err());

        let settings = Settings {
            log_level: "loud".to_string(),
            ..Settings::default()
        };
        assert!(settings.validate().is_err());

        let settings = Settings {
            app_name: " ".to_string(),
            ..Settings::default()
        };
        assert!(settings.validate().is_err());
    }
}
