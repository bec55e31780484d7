//! Structured logging setup.
//!
//! Thin wrapper over the tracing-subscriber ecosystem: an `EnvFilter` for
//! level control and a fmt layer that is human-readable by default and
//! JSON when asked.

use thiserror::Error;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// Environment variable controlling the log filter (e.g. `info`,
/// `keryx=debug`).
pub const LOG_FILTER_ENV: &str = "KERYX_LOG";

/// Environment variable switching output to JSON when set to `1`.
pub const LOG_JSON_ENV: &str = "KERYX_LOG_JSON";

/// Logging configuration.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Filter directive, e.g. `info` or `keryx=debug,keryx_server=debug`.
    pub filter: String,

    /// Whether to emit JSON instead of human-readable lines.
    pub json_format: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
            json_format: false,
        }
    }
}

impl LogConfig {
    /// Configuration from the environment, with defaults for anything
    /// unset.
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(filter) = std::env::var(LOG_FILTER_ENV) {
            config.filter = filter;
        }
        if std::env::var(LOG_JSON_ENV).is_ok_and(|v| v == "1") {
            config.json_format = true;
        }
        config
    }
}

/// Errors from logging initialisation.
#[derive(Debug, Error)]
pub enum LoggingError {
    /// The filter directive did not parse.
    #[error("invalid log filter: {0}")]
    Filter(String),

    /// A global subscriber was already installed.
    #[error("failed to install log subscriber: {0}")]
    Init(String),
}

/// Installs the global log subscriber.
pub fn init(config: &LogConfig) -> Result<(), LoggingError> {
    let filter =
        EnvFilter::try_new(&config.filter).map_err(|e| LoggingError::Filter(e.to_string()))?;

    if config.json_format {
        let layer = tracing_subscriber::fmt::layer().json().with_filter(filter);
        tracing_subscriber::registry()
            .with(layer)
            .try_init()
            .map_err(|e| LoggingError::Init(e.to_string()))?;
    } else {
        let layer = tracing_subscriber::fmt::layer().with_filter(filter);
        tracing_subscriber::registry()
            .with(layer)
            .try_init()
            .map_err(|e| LoggingError::Init(e.to_string()))?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_human_readable_info() {
        let config = LogConfig::default();
        assert_eq!(config.filter, "info");
        assert!(!config.json_format);
    }

    #[test]
    fn bad_filter_is_reported() {
        let config = LogConfig {
            filter: "not==a==filter".to_string(),
            json_format: false,
        };

        assert!(matches!(init(&config), Err(LoggingError::Filter(_))));
    }
}
