//! Utility modules shared across the framework.
//!
//! - `logging`: log levels, the logger factory and component loggers
//! - `settings`: layered application settings

pub mod logging;
pub mod settings;

pub use logging::{LogFormat, LogLevel, Logger, LoggerFactory};
pub use settings::Settings;
