//! Structured logging setup.
//!
//! Events go to stderr so that command output on stdout stays machine readable.

use tracing::Level;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::{SubscriberInitExt, TryInitError},
    EnvFilter, Layer,
};

/// Crates whose events are enabled when `RUST_LOG` is not set.
const LOG_TARGETS: &[&str] = &[
    "ar_core",
    "ar_notifiers",
    "ar_api",
    "ar_cli",
    "alert_relay",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
    pub level: Level,
    pub format: LogFormat,
    /// Log span open/close events and source locations.
    pub verbose: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self::new(Level::INFO)
    }
}

impl LoggingConfig {
    pub fn new(level: Level) -> Self {
        Self {
            level,
            format: LogFormat::Text,
            verbose: false,
        }
    }

    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    /// Switches to DEBUG with spans and source locations.
    pub fn verbose(mut self) -> Self {
        self.level = self.level.max(Level::DEBUG);
        self.verbose = true;
        self
    }

    /// Default `EnvFilter` directives for this configuration.
    pub fn filter_directives(&self) -> String {
        LOG_TARGETS
            .iter()
            .map(|target| format!("{}={}", target, self.level))
            .collect::<Vec<_>>()
            .join(",")
    }
}

/// Installs the global subscriber.
///
/// `RUST_LOG` takes precedence over the configured level when it is set.
/// Fails if a subscriber is already installed.
pub fn init_logging(config: LoggingConfig) -> Result<(), TryInitError> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.filter_directives()));

    let span_events = if config.verbose {
        FmtSpan::NEW | FmtSpan::CLOSE
    } else {
        FmtSpan::NONE
    };

    let fmt_layer = match config.format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_span_events(span_events)
            .with_file(config.verbose)
            .with_line_number(config.verbose)
            .boxed(),
        LogFormat::Text => fmt::layer()
            .with_writer(std::io::stderr)
            .with_span_events(span_events)
            .with_file(config.verbose)
            .with_line_number(config.verbose)
            .boxed(),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verbose_raises_level() {
        let config = LoggingConfig::new(Level::WARN).verbose();
        assert_eq!(config.level, Level::DEBUG);
        assert!(config.verbose);

        // Already more detailed than DEBUG.
        let config = LoggingConfig::new(Level::TRACE).verbose();
        assert_eq!(config.level, Level::TRACE);
    }

    #[test]
    fn test_filter_directives_cover_all_crates() {
        let directives = LoggingConfig::new(Level::WARN).filter_directives();

        assert!(directives.contains("ar_core=WARN"));
        assert!(directives.contains("ar_api=WARN"));
        assert_eq!(directives.split(',').count(), LOG_TARGETS.len());
    }

    #[test]
    fn test_second_init_fails() {
        let config = LoggingConfig::default().with_format(LogFormat::Json);
        let _ = init_logging(config.clone());
        assert!(init_logging(config).is_err());
    }
}
