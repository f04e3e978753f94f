//! Read-only status of the active configuration.

use crate::config::AlertmanagerConfiguration;
use crate::store::ConfigStore;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Build and version information reported alongside the status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionInfo {
    pub name: String,
    pub version: String,
}

impl Default for VersionInfo {
    fn default() -> Self {
        Self {
            name: "alert-relay".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// Projection of the active configuration at a single point in time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusSnapshot {
    /// The active configuration with secrets redacted.
    pub config: AlertmanagerConfiguration,
    pub config_hash: String,
    pub revision: u64,
    pub loaded_at: DateTime<Utc>,
    pub uptime_seconds: u64,
    pub version_info: VersionInfo,
}

/// Builds [`StatusSnapshot`]s from a [`ConfigStore`].
#[derive(Debug, Clone)]
pub struct StatusReporter {
    store: Arc<ConfigStore>,
    started_at: Instant,
    version_info: VersionInfo,
}

impl StatusReporter {
    pub fn new(store: Arc<ConfigStore>) -> Self {
        Self {
            store,
            started_at: Instant::now(),
            version_info: VersionInfo::default(),
        }
    }

    /// Time since this reporter was created.
    pub fn uptime(&self) -> Duration {
        self.started_at.elapsed()
    }

    pub fn version_info(&self) -> &VersionInfo {
        &self.version_info
    }

    /// Returns the current status. Only takes a shared read of the store.
    pub async fn get_status(&self) -> StatusSnapshot {
        let active = self.store.active().await;
        StatusSnapshot {
            config: active.config.redacted(),
            config_hash: active.revision.hash.clone(),
            revision: active.revision.version,
            loaded_at: active.revision.loaded_at,
            uptime_seconds: self.uptime().as_secs(),
            version_info: self.version_info.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::receiver::{Receiver, ReceiverConfig, REDACTED};

    fn store() -> Arc<ConfigStore> {
        let receiver = Receiver::new("ops").with_config(
            ReceiverConfig::new("slack", "slack")
                .with_uid("slack-uid")
                .with_secure_setting("url", "https://hooks.slack.com/services/secret"),
        );
        Arc::new(ConfigStore::new(AlertmanagerConfiguration::new(receiver)).unwrap())
    }

    #[tokio::test]
    async fn test_status_reflects_active_revision() {
        let store = store();
        let reporter = StatusReporter::new(store.clone());

        let status = reporter.get_status().await;
        let revision = store.revision().await;

        assert_eq!(status.config_hash, revision.hash);
        assert_eq!(status.revision, 1);
        assert_eq!(status.version_info.name, "alert-relay");
        assert_eq!(&status.version_info, reporter.version_info());
    }

    #[tokio::test(start_paused = true)]
    async fn test_uptime_counts_from_creation() {
        let reporter = StatusReporter::new(store());
        tokio::time::advance(Duration::from_secs(90)).await;

        assert!(reporter.uptime() >= Duration::from_secs(90));
        assert!(reporter.get_status().await.uptime_seconds >= 90);
    }

    #[tokio::test]
    async fn test_status_redacts_secrets() {
        let reporter = StatusReporter::new(store());
        let status = reporter.get_status().await;

        let config = status.config.receiver("ops").unwrap().config("slack-uid").unwrap();
        assert_eq!(config.secure_settings["url"], REDACTED);
    }

    #[tokio::test]
    async fn test_status_is_idempotent_without_reload() {
        let reporter = StatusReporter::new(store());
        let a = reporter.get_status().await;
        let b = reporter.get_status().await;
        assert_eq!(a.config, b.config);
        assert_eq!(a.config_hash, b.config_hash);
        assert_eq!(a.loaded_at, b.loaded_at);
    }

    #[tokio::test]
    async fn test_status_after_reload() {
        let store = store();
        let reporter = StatusReporter::new(store.clone());

        let mut next = (*store.snapshot().await).clone();
        next.route.group_by.push("cluster".to_string());
        store.reload(next).await.unwrap();

        let status = reporter.get_status().await;
        assert_eq!(status.revision, 2);
        assert!(status.config.route.group_by.contains(&"cluster".to_string()));
    }
}
