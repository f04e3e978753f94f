//! # ar-core
//!
//! Receiver management and delivery testing for Alert Relay.
//!
//! This crate holds the active Alertmanager configuration, tests receivers by
//! fanning a synthetic alert out to their integrations, and reports the status
//! of the active configuration.

pub mod config;
pub mod integration;
pub mod kvstore;
pub mod notification;
pub mod receiver;
pub mod receiver_test;
pub mod status;
pub mod store;

pub use config::{load_configuration, AlertmanagerConfiguration, ConfigError, Route};
pub use integration::{Integration, IntegrationRegistry, MockIntegration, NotifyError};
pub use kvstore::{FileKvStore, InMemoryKvStore, KvStore, KvStoreError, NamespacedKvStore};
pub use notification::{TestAlert, TestNotification};
pub use receiver::{Receiver, ReceiverConfig, REDACTED};
pub use receiver_test::{
    AggregateStatus, ConfigTestStatus, OrchestrationError, ReceiverTestError, ReceiverTester,
    TestReceiverConfigResult, TestReceiverResult, TestReceiversRequest, TestReceiversResult,
    DEFAULT_TEST_TIMEOUT,
};
pub use status::{StatusReporter, StatusSnapshot, VersionInfo};
pub use store::{
    ConfigRevision, ConfigStore, ReloadError, ReloadOutcome, KV_CONFIG_KEY, KV_NAMESPACE,
};
