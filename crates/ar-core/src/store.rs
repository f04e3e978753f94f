//! Concurrency-safe holder of the active Alertmanager configuration.
//!
//! Readers take a cheap `Arc` snapshot under a shared lock and are never shown
//! a partially applied reload. A reload validates and hashes the new
//! configuration before taking the exclusive lock, which is then held only for
//! the pointer swap.
//!
//! Reloads are serialized by a separate mutex so that revision numbers and
//! persisted state follow the order in which reloads were applied.

use crate::config::{AlertmanagerConfiguration, ConfigError};
use crate::kvstore::{KvStoreError, NamespacedKvStore};
use ar_observability::record_config_reload;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, instrument, warn};

/// Key/value namespace used to persist the configuration.
pub const KV_NAMESPACE: &str = "alertmanager";
/// Key under [`KV_NAMESPACE`] holding the last applied configuration.
pub const KV_CONFIG_KEY: &str = "config";

/// Errors that can occur when replacing the active configuration.
#[derive(Error, Debug, Clone)]
pub enum ReloadError {
    /// The configuration could not be parsed.
    #[error("failed to parse configuration: {0}")]
    Parse(String),

    /// The configuration parsed but failed validation.
    #[error("invalid configuration: {0}")]
    Invalid(#[from] ConfigError),

    /// The persisted configuration could not be read.
    #[error("failed to read persisted configuration: {0}")]
    Storage(#[from] KvStoreError),
}

/// Identity of an applied configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigRevision {
    /// Monotonic counter, starting at 1 for the initial configuration.
    pub version: u64,
    /// SHA-256 of the configuration, hex encoded.
    pub hash: String,
    pub loaded_at: DateTime<Utc>,
}

/// A configuration together with its revision, swapped as one unit.
#[derive(Debug)]
pub struct ActiveConfig {
    pub config: Arc<AlertmanagerConfiguration>,
    pub revision: ConfigRevision,
}

/// Result of a successful reload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReloadOutcome {
    pub revision: ConfigRevision,
    /// False when the new configuration was identical to the active one.
    pub changed: bool,
    /// Set when the swap succeeded but persisting the configuration did not.
    pub persist_warning: Option<String>,
}

pub struct ConfigStore {
    active: RwLock<Arc<ActiveConfig>>,
    reload_lock: Mutex<()>,
    kv: Option<NamespacedKvStore>,
}

impl ConfigStore {
    /// Creates a store holding `initial`, which must pass validation.
    ///
    /// Configs without a uid are given one.
    pub fn new(mut initial: AlertmanagerConfiguration) -> Result<Self, ReloadError> {
        initial.assign_missing_uids(None);
        initial.validate()?;
        let revision = ConfigRevision {
            version: 1,
            hash: initial.hash()?,
            loaded_at: Utc::now(),
        };

        Ok(Self {
            active: RwLock::new(Arc::new(ActiveConfig {
                config: Arc::new(initial),
                revision,
            })),
            reload_lock: Mutex::new(()),
            kv: None,
        })
    }

    /// Persists every applied configuration to `kv`.
    pub fn with_kv(mut self, kv: NamespacedKvStore) -> Self {
        self.kv = Some(kv);
        self
    }

    /// The active configuration and its revision.
    pub async fn active(&self) -> Arc<ActiveConfig> {
        self.active.read().await.clone()
    }

    /// The active configuration.
    pub async fn snapshot(&self) -> Arc<AlertmanagerConfiguration> {
        self.active.read().await.config.clone()
    }

    pub async fn revision(&self) -> ConfigRevision {
        self.active.read().await.revision.clone()
    }

    /// Parses a JSON document and applies it with [`ConfigStore::reload`].
    pub async fn reload_json(&self, input: &str) -> Result<ReloadOutcome, ReloadError> {
        let config = AlertmanagerConfiguration::from_json(input).map_err(|e| {
            record_config_reload("invalid");
            ReloadError::Parse(e.to_string())
        })?;
        self.reload(config).await
    }

    /// Replaces the active configuration.
    ///
    /// On error the active configuration is unchanged. Reloading a
    /// configuration identical to the active one succeeds with `changed: false`.
    /// Configs without a uid keep the uid of the active config with the same
    /// receiver and name, or get a new one.
    #[instrument(skip_all)]
    pub async fn reload(
        &self,
        mut config: AlertmanagerConfiguration,
    ) -> Result<ReloadOutcome, ReloadError> {
        let _reload = self.reload_lock.lock().await;

        let current = self.active().await;
        config.assign_missing_uids(Some(&current.config));

        let prepared = config.validate().and_then(|_| config.hash());
        let hash = match prepared {
            Ok(hash) => hash,
            Err(e) => {
                warn!(error = %e, "Rejected configuration reload");
                record_config_reload("invalid");
                return Err(ReloadError::Invalid(e));
            }
        };

        if current.revision.hash == hash {
            debug!(hash = %hash, "Configuration unchanged, skipping reload");
            record_config_reload("unchanged");
            return Ok(ReloadOutcome {
                revision: current.revision.clone(),
                changed: false,
                persist_warning: None,
            });
        }

        let serialized = match &self.kv {
            Some(_) => Some(config.to_json()),
            None => None,
        };

        let revision = ConfigRevision {
            version: current.revision.version + 1,
            hash,
            loaded_at: Utc::now(),
        };
        let next = Arc::new(ActiveConfig {
            config: Arc::new(config),
            revision: revision.clone(),
        });

        {
            let mut active = self.active.write().await;
            *active = next;
        }

        info!(
            version = revision.version,
            hash = %revision.hash,
            "Applied new Alertmanager configuration"
        );
        record_config_reload("success");

        let persist_warning = match (&self.kv, serialized) {
            (Some(kv), Some(Ok(json))) => match kv.set(KV_CONFIG_KEY, &json).await {
                Ok(()) => None,
                Err(e) => Some(e.to_string()),
            },
            (_, Some(Err(e))) => Some(e.to_string()),
            _ => None,
        };
        if let Some(warning) = &persist_warning {
            warn!(error = %warning, "Failed to persist configuration");
        }

        Ok(ReloadOutcome {
            revision,
            changed: true,
            persist_warning,
        })
    }

    /// Applies the persisted configuration, if any.
    ///
    /// Returns `Ok(None)` when no key/value store is attached or nothing was persisted.
    #[instrument(skip_all)]
    pub async fn restore(&self) -> Result<Option<ReloadOutcome>, ReloadError> {
        let Some(kv) = &self.kv else {
            return Ok(None);
        };

        let Some(json) = kv.get(KV_CONFIG_KEY).await? else {
            debug!("No persisted configuration found");
            return Ok(None);
        };

        let outcome = self.reload_json(&json).await?;
        info!(
            version = outcome.revision.version,
            "Restored persisted Alertmanager configuration"
        );
        Ok(Some(outcome))
    }
}

impl std::fmt::Debug for ConfigStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigStore")
            .field("kv", &self.kv)
            .finish_non_exhaustive()
    }
}
