//! Integration adapter contract and registry.
//!
//! An integration knows how to validate and deliver to one notification
//! channel type (`webhook`, `slack`, ...). The [`IntegrationRegistry`] maps
//! integration type names to adapters and is built once at startup.

use crate::notification::TestNotification;
use crate::receiver::ReceiverConfig;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;

/// Errors reported by an integration.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NotifyError {
    /// The config's settings are unusable.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The integration gave up waiting for the remote side.
    #[error("Timed out: {0}")]
    Timeout(String),

    /// The remote side answered with a non-success status.
    #[error("Rejected with status {status}: {body}")]
    Rejected { status: u16, body: String },

    /// The request could not be delivered.
    #[error("Failed to send notification: {0}")]
    SendFailed(String),

    #[error("{0}")]
    Other(String),
}

/// A notification channel adapter.
#[async_trait]
pub trait Integration: Send + Sync + 'static {
    /// The integration type name this adapter handles.
    fn integration_type(&self) -> &str;

    /// Checks that `config` carries everything needed to deliver.
    ///
    /// Called before every `send`; a failure means no delivery is attempted.
    fn validate(&self, config: &ReceiverConfig) -> Result<(), NotifyError>;

    /// Delivers `notification` using `config`.
    ///
    /// `deadline` is the point at which the caller stops waiting. Adapters
    /// should pass it on to their transport so that sockets are released.
    async fn send(
        &self,
        config: &ReceiverConfig,
        notification: &TestNotification,
        deadline: Instant,
    ) -> Result<(), NotifyError>;
}

/// Immutable lookup table from integration type name to adapter.
#[derive(Clone, Default)]
pub struct IntegrationRegistry {
    integrations: HashMap<String, Arc<dyn Integration>>,
}

impl IntegrationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an adapter, replacing any adapter previously registered for its type.
    pub fn with(mut self, integration: impl Integration) -> Self {
        self.register(Arc::new(integration));
        self
    }

    pub fn register(&mut self, integration: Arc<dyn Integration>) {
        self.integrations
            .insert(integration.integration_type().to_string(), integration);
    }

    pub fn get(&self, integration_type: &str) -> Option<Arc<dyn Integration>> {
        self.integrations.get(integration_type).cloned()
    }

    /// Registered type names, sorted.
    pub fn types(&self) -> Vec<String> {
        let mut types: Vec<String> = self.integrations.keys().cloned().collect();
        types.sort();
        types
    }

    pub fn len(&self) -> usize {
        self.integrations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.integrations.is_empty()
    }
}

impl std::fmt::Debug for IntegrationRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IntegrationRegistry")
            .field("types", &self.types())
            .finish()
    }
}

/// A scriptable integration for tests and dry runs.
///
/// Counts sends, and can be made to sleep, fail, panic or demand settings.
#[derive(Debug)]
pub struct MockIntegration {
    integration_type: String,
    delay: Option<Duration>,
    failure: Option<NotifyError>,
    panics: bool,
    required_settings: Vec<String>,
    send_count: Arc<AtomicUsize>,
}

impl MockIntegration {
    pub fn new(integration_type: impl Into<String>) -> Self {
        Self {
            integration_type: integration_type.into(),
            delay: None,
            failure: None,
            panics: false,
            required_settings: Vec::new(),
            send_count: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Sleeps for `delay` before completing a send.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Makes every send fail with `error`.
    pub fn failing(mut self, error: NotifyError) -> Self {
        self.failure = Some(error);
        self
    }

    /// Makes every send panic.
    pub fn panicking(mut self) -> Self {
        self.panics = true;
        self
    }

    /// Makes validation fail unless `key` is set.
    pub fn requiring_setting(mut self, key: impl Into<String>) -> Self {
        self.required_settings.push(key.into());
        self
    }

    /// Shared counter of attempted sends.
    pub fn send_counter(&self) -> Arc<AtomicUsize> {
        self.send_count.clone()
    }
}

#[async_trait]
impl Integration for MockIntegration {
    fn integration_type(&self) -> &str {
        &self.integration_type
    }

    fn validate(&self, config: &ReceiverConfig) -> Result<(), NotifyError> {
        for key in &self.required_settings {
            if config.setting_str(key).is_none() {
                return Err(NotifyError::InvalidConfig(format!(
                    "could not find {} in settings",
                    key
                )));
            }
        }
        Ok(())
    }

    async fn send(
        &self,
        _config: &ReceiverConfig,
        _notification: &TestNotification,
        _deadline: Instant,
    ) -> Result<(), NotifyError> {
        self.send_count.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.panics {
            panic!("mock integration '{}' panicked", self.integration_type);
        }
        match &self.failure {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }
}
