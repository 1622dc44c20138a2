//! Logging utilities.
//!
//! The process-wide subscriber is configured through a [`LoggerFactory`]
//! that is built once from the settings and passed to every component
//! that logs. Components never configure logging themselves; they ask the
//! factory for a [`Logger`] tagged with their own name.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, trace, warn};
use tracing_subscriber::EnvFilter;

use super::settings::Settings;

/// Log level.
///
/// Ordered by increasing severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum LogLevel {
    /// Verbose debug information.
    Trace,

    /// Debug information.
    Debug,

    /// Informational messages.
    Info,

    /// Warning messages.
    Warning,

    /// Error messages.
    Error,
}

impl LogLevel {
    /// Get the name of this log level.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Trace => "TRACE",
            Self::Debug => "DEBUG",
            Self::Info => "INFO",
            Self::Warning => "WARNING",
            Self::Error => "ERROR",
        }
    }

    /// The directive understood by `tracing_subscriber::EnvFilter`.
    pub fn as_directive(&self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warning => "warn",
            Self::Error => "error",
        }
    }
}

impl FromStr for LogLevel {
    type Err = ();

    /// Case-insensitive.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "trace" => Ok(Self::Trace),
            "debug" => Ok(Self::Debug),
            "info" => Ok(Self::Info),
            "warning" | "warn" => Ok(Self::Warning),
            "error" | "err" => Ok(Self::Error),
            _ => Err(()),
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Output format of the subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable lines
    Pretty,

    /// One JSON object per line
    Json,
}

/// Set once the first factory has installed the global subscriber.
static INSTALLED: OnceCell<(LogLevel, LogFormat)> = OnceCell::new();

/// Builds and installs the process-wide subscriber and hands out loggers.
#[derive(Debug, Clone)]
pub struct LoggerFactory {
    level: LogLevel,
    format: LogFormat,
}

impl LoggerFactory {
    /// Create a factory with an explicit level and format.
    pub fn new(level: LogLevel, format: LogFormat) -> Self {
        Self { level, format }
    }

    /// Create a factory from the application settings.
    pub fn from_settings(settings: &Settings) -> Self {
        let format = if settings.log_json {
            LogFormat::Json
        } else {
            LogFormat::Pretty
        };
        Self::new(settings.log_level(), format)
    }

    /// The configured level.
    pub fn level(&self) -> LogLevel {
        self.level
    }

    /// The configured format.
    pub fn format(&self) -> LogFormat {
        self.format
    }

    /// Install the global subscriber.
    ///
    /// Only the first call in a process installs anything; later calls
    /// return `false`. `RUST_LOG`, when set, takes precedence over the
    /// configured level.
    pub fn install(&self) -> bool {
        let mut installed_now = false;

        INSTALLED.get_or_init(|| {
            let filter = EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(self.level.as_directive()));

            let result = match self.format {
                LogFormat::Json => tracing_subscriber::fmt()
                    .json()
                    .with_env_filter(filter)
                    .with_current_span(true)
                    .try_init(),
                LogFormat::Pretty => tracing_subscriber::fmt()
                    .with_env_filter(filter)
                    .with_target(false)
                    .try_init(),
            };

            // Another subscriber (e.g. a test harness) may already own the slot.
            installed_now = result.is_ok();
            (self.level, self.format)
        });

        if !installed_now {
            debug!("Logging already configured, keeping the existing subscriber");
        }

        installed_now
    }

    /// A logger that tags every event with `component`.
    pub fn logger(&self, component: impl Into<String>) -> Logger {
        Logger {
            component: Arc::from(component.into()),
        }
    }
}

impl Default for LoggerFactory {
    fn default() -> Self {
        Self::new(LogLevel::Info, LogFormat::Pretty)
    }
}

/// A cheap, clonable logger bound to one component.
#[derive(Debug, Clone)]
pub struct Logger {
    component: Arc<str>,
}

impl Logger {
    /// Name of the component this logger reports for.
    pub fn component(&self) -> &str {
        &self.component
    }

    /// Log at the given level.
    pub fn log(&self, level: LogLevel, message: impl fmt::Display) {
        let component = &*self.component;
        match level {
            LogLevel::Trace => trace!(component, "{}", message),
            LogLevel::Debug => debug!(component, "{}", message),
            LogLevel::Info => info!(component, "{}", message),
            LogLevel::Warning => warn!(component, "{}", message),
            LogLevel::Error => error!(component, "{}", message),
        }
    }

    /// Log at debug level.
    pub fn debug(&self, message: impl fmt::Display) {
        self.log(LogLevel::Debug, message);
    }

    /// Log at info level.
    pub fn info(&self, message: impl fmt::Display) {
        self.log(LogLevel::Info, message);
    }

    /// Log at warn level.
    pub fn warn(&self, message: impl fmt::Display) {
        self.log(LogLevel::Warning, message);
    }

    /// Log at error level.
    pub fn error(&self, message: impl fmt::Display) {
        self.log(LogLevel::Error, message);
    }
}
