//! Observability: structured logging initialization.
//!
//! The library itself only emits `tracing` events; host processes call
//! [`init_logging`] once to install a subscriber. Installation is
//! idempotent: later calls are no-ops, so embedding runtimes that already
//! configured their own subscriber are left alone.

use std::sync::OnceLock;
use tracing_subscriber::EnvFilter;

/// Output format for log events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-readable single-line text.
    #[default]
    Text,
    /// One JSON object per event.
    Json,
}

/// Logging configuration.
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Output format.
    pub format: LogFormat,
    /// Filter directive, e.g. `info` or `agentfs=debug`.
    /// `AGENTFS_LOG` in the environment overrides it.
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::Text,
            filter: "info".to_string(),
        }
    }
}

static LOGGING_INIT: OnceLock<()> = OnceLock::new();

/// Installs the global tracing subscriber.
///
/// Idempotent: only the first call installs anything. The filter comes from
/// the `AGENTFS_LOG` environment variable when set, falling back to the
/// configured directive.
pub fn init_logging(config: &LoggingConfig) {
    LOGGING_INIT.get_or_init(|| {
        let filter = EnvFilter::try_from_env("AGENTFS_LOG")
            .or_else(|_| EnvFilter::try_new(&config.filter))
            .unwrap_or_else(|_| EnvFilter::new("info"));

        let builder = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true);

        // try_init tolerates a subscriber installed by the host process
        let _ = match config.format {
            LogFormat::Text => builder.try_init(),
            LogFormat::Json => builder.json().try_init(),
        };
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_logging_is_idempotent() {
        let config = LoggingConfig::default();
        init_logging(&config);
        init_logging(&config);
    }

    #[test]
    fn test_default_filter() {
        let config = LoggingConfig::default();
        assert_eq!(config.filter, "info");
        assert_eq!(config.format, LogFormat::Text);
    }
}
