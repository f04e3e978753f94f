//! Configuration loading for the Alert Relay CLI.

use anyhow::{Context, Result};
use ar_observability::{LogFormat, LoggingConfig};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// HTTP server settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Receiver test settings.
    #[serde(default)]
    pub receivers_test: ReceiversTestConfig,

    /// Where the Alertmanager configuration comes from and is persisted.
    #[serde(default)]
    pub alertmanager: AlertmanagerSettings,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingSettings,
}

impl AppConfig {
    /// Loads configuration from a file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Self = serde_yaml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Saves configuration to a file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let contents = serde_yaml::to_string(self)?;
        std::fs::write(path, contents)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;
        Ok(())
    }
}

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    9093
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Receiver test settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReceiversTestConfig {
    /// Per-integration deadline in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    ar_core::DEFAULT_TEST_TIMEOUT.as_secs()
}

impl Default for ReceiversTestConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl ReceiversTestConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Alertmanager configuration source and persistence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertmanagerSettings {
    /// YAML or JSON Alertmanager configuration loaded at startup.
    #[serde(default)]
    pub config_path: Option<PathBuf>,

    /// File used to persist reloaded configurations across restarts.
    #[serde(default)]
    pub state_file: Option<PathBuf>,

    /// Organization the persisted configuration belongs to.
    #[serde(default = "default_org_id")]
    pub org_id: i64,
}

fn default_org_id() -> i64 {
    1
}

impl Default for AlertmanagerSettings {
    fn default() -> Self {
        Self {
            config_path: None,
            state_file: None,
            org_id: default_org_id(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON lines instead of human-readable output.
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

impl LoggingSettings {
    /// Parsed level, falling back to INFO for unrecognized values.
    pub fn tracing_level(&self) -> tracing::Level {
        self.level.parse().unwrap_or(tracing::Level::INFO)
    }
}

impl From<&LoggingSettings> for LoggingConfig {
    fn from(settings: &LoggingSettings) -> Self {
        let format = if settings.json {
            LogFormat::Json
        } else {
            LogFormat::Text
        };
        LoggingConfig::new(settings.tracing_level()).with_format(format)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.server.port, 9093);
        assert_eq!(config.receivers_test.timeout(), Duration::from_secs(15));
        assert_eq!(config.alertmanager.org_id, 1);
        assert!(config.alertmanager.config_path.is_none());
        assert_eq!(config.logging.tracing_level(), tracing::Level::INFO);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let file = NamedTempFile::new().unwrap();
        std::fs::write(
            file.path(),
            "server:\n  port: 9999\nreceivers_test:\n  timeout_secs: 3\n",
        )
        .unwrap();

        let config = AppConfig::load(file.path()).unwrap();
        assert_eq!(config.server.port, 9999);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.receivers_test.timeout_secs, 3);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_save_and_load() {
        let file = NamedTempFile::new().unwrap();
        let mut config = AppConfig::default();
        config.alertmanager.config_path = Some(PathBuf::from("/etc/alertmanager.yml"));
        config.logging.json = true;

        config.save(file.path()).unwrap();
        let loaded = AppConfig::load(file.path()).unwrap();

        assert_eq!(
            loaded.alertmanager.config_path,
            Some(PathBuf::from("/etc/alertmanager.yml"))
        );
        assert!(loaded.logging.json);
    }

    #[test]
    fn test_missing_file() {
        let err = AppConfig::load(Path::new("/nonexistent/alert-relay.yaml")).unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }

    #[test]
    fn test_logging_settings_into_config() {
        let settings = LoggingSettings {
            level: "debug".to_string(),
            json: true,
        };
        let config = LoggingConfig::from(&settings);
        assert_eq!(config.level, tracing::Level::DEBUG);
        assert_eq!(config.format, LogFormat::Json);
        assert!(!config.verbose);
    }

    #[test]
    fn test_unknown_log_level_falls_back() {
        let settings = LoggingSettings {
            level: "loud".to_string(),
            json: false,
        };
        assert_eq!(settings.tracing_level(), tracing::Level::INFO);
    }
}
