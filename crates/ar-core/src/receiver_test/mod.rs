//! Receiver test orchestration.
//!
//! A test run sends one synthetic alert through every config of every selected
//! receiver. Each config is tested in its own task with its own deadline, so a
//! slow or broken integration never holds up its siblings. Results are written
//! to a slot per `(receiver, config)` and regrouped in input order.

mod error;

pub use error::{AggregateStatus, OrchestrationError, ReceiverTestError};

use crate::integration::IntegrationRegistry;
use crate::notification::{TestAlert, TestNotification};
use crate::receiver::{Receiver, ReceiverConfig};
use crate::store::ConfigStore;
use ar_observability::{record_receiver_config_result, record_receiver_test};
use chrono::{DateTime, Utc};
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

/// Per-config timeout used when none is configured.
pub const DEFAULT_TEST_TIMEOUT: Duration = Duration::from_secs(15);

/// A request to test receivers.
///
/// An empty `receivers` list tests every receiver of the active configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TestReceiversRequest {
    /// Labels and annotations merged over the default test alert.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alert: Option<TestAlert>,
    #[serde(default)]
    pub receivers: Vec<Receiver>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfigTestStatus {
    Ok,
    Failed,
}

/// Outcome of testing a single config.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestReceiverConfigResult {
    pub name: String,
    pub uid: String,
    pub status: ConfigTestStatus,
    /// Present if and only if `status` is `failed`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ReceiverTestError>,
}

impl TestReceiverConfigResult {
    pub fn new(config: &ReceiverConfig, outcome: Result<(), ReceiverTestError>) -> Self {
        let (status, error) = match outcome {
            Ok(()) => (ConfigTestStatus::Ok, None),
            Err(e) => (ConfigTestStatus::Failed, Some(e)),
        };
        Self {
            name: config.name.clone(),
            uid: config.uid.clone(),
            status,
            error,
        }
    }
}

/// Outcomes for one receiver, in the order its configs were given.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestReceiverResult {
    pub name: String,
    pub configs: Vec<TestReceiverConfigResult>,
}

/// Full result of a test run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestReceiversResult {
    /// The alert that was sent.
    pub alert: TestAlert,
    pub receivers: Vec<TestReceiverResult>,
    pub notified_at: DateTime<Utc>,
}

impl TestReceiversResult {
    /// All config errors, in result order.
    pub fn errors(&self) -> impl Iterator<Item = &ReceiverTestError> {
        self.receivers
            .iter()
            .flat_map(|r| r.configs.iter())
            .filter_map(|c| c.error.as_ref())
    }

    pub fn status(&self) -> AggregateStatus {
        AggregateStatus::aggregate(self.errors())
    }

    pub fn status_code(&self) -> u16 {
        self.status().status_code()
    }
}

/// Fans receiver tests out to integrations and collects the results.
#[derive(Debug, Clone)]
pub struct ReceiverTester {
    registry: Arc<IntegrationRegistry>,
    store: Arc<ConfigStore>,
    timeout: Duration,
}

impl ReceiverTester {
    pub fn new(registry: Arc<IntegrationRegistry>, store: Arc<ConfigStore>) -> Self {
        Self {
            registry,
            store,
            timeout: DEFAULT_TEST_TIMEOUT,
        }
    }

    /// Sets the per-config timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Tests every config of the requested receivers concurrently.
    ///
    /// Per-config failures are reported in the result. Cancelling `cancel`
    /// aborts unfinished tests, which are reported as timeouts; results that
    /// had already completed are kept.
    #[instrument(skip_all, fields(receivers = request.receivers.len()))]
    pub async fn test_receivers(
        &self,
        request: TestReceiversRequest,
        cancel: CancellationToken,
    ) -> Result<TestReceiversResult, OrchestrationError> {
        let handle =
            Handle::try_current().map_err(|e| OrchestrationError::NoRuntime(e.to_string()))?;
        let started = Instant::now();

        let receivers = if request.receivers.is_empty() {
            debug!("No receivers in request, testing the active configuration");
            self.store.snapshot().await.receivers.clone()
        } else {
            request.receivers
        };

        let alert = TestAlert::with_overrides(request.alert.as_ref());
        let notified_at = Utc::now();

        let mut slots: Vec<Vec<Option<TestReceiverConfigResult>>> = receivers
            .iter()
            .map(|r| vec![None; r.configs.len()])
            .collect();

        let mut tasks = JoinSet::new();
        for (ri, receiver) in receivers.iter().enumerate() {
            let notification = Arc::new(TestNotification::new(&receiver.name, &alert, notified_at));
            for (ci, config) in receiver.configs.iter().enumerate() {
                let registry = self.registry.clone();
                let notification = notification.clone();
                let config = config.clone();
                let timeout = self.timeout;

                tasks.spawn_on(
                    async move {
                        let outcome = AssertUnwindSafe(test_config(
                            &registry,
                            &config,
                            &notification,
                            timeout,
                        ))
                        .catch_unwind()
                        .await
                        .unwrap_or_else(|panic| {
                            Err(ReceiverTestError::Unknown(panic_message(panic.as_ref())))
                        });

                        record_receiver_config_result(
                            &config.integration_type,
                            outcome.as_ref().err().map_or("ok", ReceiverTestError::kind),
                        );
                        (ri, ci, TestReceiverConfigResult::new(&config, outcome))
                    },
                    &handle,
                );
            }
        }

        let cancelled = loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break true,
                joined = tasks.join_next() => match joined {
                    Some(Ok((ri, ci, result))) => slots[ri][ci] = Some(result),
                    Some(Err(e)) => warn!(error = %e, "Receiver test task did not complete"),
                    None => break false,
                },
            }
        };

        if cancelled {
            warn!(pending = tasks.len(), "Receiver test cancelled");
            tasks.abort_all();
            while let Some(joined) = tasks.join_next().await {
                if let Ok((ri, ci, result)) = joined {
                    slots[ri][ci] = Some(result);
                }
            }
        }

        let receivers: Vec<TestReceiverResult> = receivers
            .into_iter()
            .zip(slots)
            .filter(|(receiver, _)| !receiver.configs.is_empty())
            .map(|(Receiver { name, configs }, slots)| TestReceiverResult {
                name,
                configs: configs
                    .iter()
                    .zip(slots)
                    .map(|(config, slot)| {
                        slot.unwrap_or_else(|| {
                            let err = if cancelled {
                                ReceiverTestError::Timeout("receiver test cancelled".to_string())
                            } else {
                                ReceiverTestError::Unknown("receiver test did not complete".to_string())
                            };
                            TestReceiverConfigResult::new(config, Err(err))
                        })
                    })
                    .collect(),
            })
            .collect();

        let result = TestReceiversResult {
            alert,
            receivers,
            notified_at,
        };

        let status = result.status();
        record_receiver_test(status.status_code(), started.elapsed());
        info!(
            status = status.status_code(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Receiver test finished"
        );

        Ok(result)
    }
}

async fn test_config(
    registry: &IntegrationRegistry,
    config: &ReceiverConfig,
    notification: &TestNotification,
    timeout: Duration,
) -> Result<(), ReceiverTestError> {
    let integration = registry.get(&config.integration_type).ok_or_else(|| {
        ReceiverTestError::InvalidConfiguration(format!(
            "unknown integration type '{}'",
            config.integration_type
        ))
    })?;

    integration.validate(config)?;

    let deadline = Instant::now() + timeout;
    match tokio::time::timeout_at(deadline, integration.send(config, notification, deadline)).await
    {
        Ok(sent) => sent.map_err(ReceiverTestError::from),
        Err(_) => Err(ReceiverTestError::Timeout(format!(
            "the receiver timed out after {}s",
            timeout.as_secs_f64()
        ))),
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    let detail = panic
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string());
    format!("integration panicked: {}", detail)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AlertmanagerConfiguration;
    use crate::integration::{MockIntegration, NotifyError};
    use std::sync::atomic::Ordering;

    fn registry() -> Arc<IntegrationRegistry> {
        Arc::new(
            IntegrationRegistry::new()
                .with(MockIntegration::new("webhook").requiring_setting("url"))
                .with(MockIntegration::new("slow").with_delay(Duration::from_secs(60)))
                .with(MockIntegration::new("fast").with_delay(Duration::from_millis(10)))
                .with(MockIntegration::new("medium").with_delay(Duration::from_secs(2)))
                .with(MockIntegration::new("broken").failing(NotifyError::SendFailed(
                    "connection refused".to_string(),
                )))
                .with(MockIntegration::new("panics").panicking()),
        )
    }

    fn store() -> Arc<ConfigStore> {
        Arc::new(ConfigStore::new(AlertmanagerConfiguration::default()).unwrap())
    }

    fn tester() -> ReceiverTester {
        ReceiverTester::new(registry(), store())
    }

    fn config(uid: &str, integration_type: &str) -> ReceiverConfig {
        ReceiverConfig::new(uid, integration_type)
            .with_uid(uid)
            .with_setting("url", "http://localhost:9999/hook")
    }

    fn request(receivers: Vec<Receiver>) -> TestReceiversRequest {
        TestReceiversRequest {
            alert: None,
            receivers,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalid_configuration_takes_precedence_over_timeout() {
        let invalid = ReceiverConfig::new("uid1", "webhook").with_uid("uid1");
        let req = request(vec![
            Receiver::new("test1").with_config(invalid),
            Receiver::new("test2").with_config(config("uid2", "slow")),
        ]);

        let result = tester()
            .test_receivers(req, CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(result.status_code(), 400);
        assert_eq!(result.receivers.len(), 2);

        let test1 = &result.receivers[0].configs[0];
        assert_eq!(test1.uid, "uid1");
        assert_eq!(test1.status, ConfigTestStatus::Failed);
        assert!(matches!(
            test1.error,
            Some(ReceiverTestError::InvalidConfiguration(_))
        ));

        let test2 = &result.receivers[1].configs[0];
        assert_eq!(test2.uid, "uid2");
        assert!(matches!(test2.error, Some(ReceiverTestError::Timeout(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_without_invalid_config_is_408() {
        let req = request(vec![Receiver::new("ops")
            .with_config(config("ok", "fast"))
            .with_config(config("slow", "slow"))
            .with_config(config("broken", "broken"))]);

        let result = tester()
            .test_receivers(req, CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(result.status_code(), 408);
        let configs = &result.receivers[0].configs;
        assert_eq!(configs[0].status, ConfigTestStatus::Ok);
        assert!(configs[0].error.is_none());
        assert!(matches!(
            configs[2].error,
            Some(ReceiverTestError::DeliveryFailure(_))
        ));
    }

    #[tokio::test]
    async fn test_all_ok_is_200() {
        let req = request(vec![
            Receiver::new("a").with_config(config("a1", "webhook")),
            Receiver::new("b")
                .with_config(config("b1", "webhook"))
                .with_config(config("b2", "fast")),
        ]);

        let result = tester()
            .test_receivers(req, CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(result.status(), AggregateStatus::Ok);
        assert_eq!(result.status_code(), 200);
        assert!(result.errors().next().is_none());
    }

    #[tokio::test]
    async fn test_delivery_failure_is_500() {
        let req = request(vec![Receiver::new("ops").with_config(config("b", "broken"))]);
        let result = tester()
            .test_receivers(req, CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(result.status_code(), 500);
    }

    #[tokio::test(start_paused = true)]
    async fn test_results_keep_input_order() {
        // c3 finishes first, c1 last.
        let req = request(vec![Receiver::new("ops")
            .with_config(config("c1", "medium"))
            .with_config(config("c2", "medium"))
            .with_config(config("c3", "fast"))]);

        let result = tester()
            .test_receivers(req, CancellationToken::new())
            .await
            .unwrap();

        let uids: Vec<&str> = result.receivers[0]
            .configs
            .iter()
            .map(|c| c.uid.as_str())
            .collect();
        assert_eq!(uids, vec!["c1", "c2", "c3"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_results_keep_input_order_across_receivers() {
        // The last receiver's only config finishes before the first receiver's.
        let req = request(vec![
            Receiver::new("A")
                .with_config(config("c1", "medium"))
                .with_config(config("c2", "medium")),
            Receiver::new("B").with_config(config("c3", "fast")),
        ]);

        let result = tester()
            .test_receivers(req, CancellationToken::new())
            .await
            .unwrap();

        let layout: Vec<(&str, Vec<&str>)> = result
            .receivers
            .iter()
            .map(|r| {
                (
                    r.name.as_str(),
                    r.configs.iter().map(|c| c.uid.as_str()).collect(),
                )
            })
            .collect();
        assert_eq!(layout, vec![("A", vec!["c1", "c2"]), ("B", vec!["c3"])]);
        assert_eq!(result.status_code(), 200);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_does_not_block_siblings() {
        let tester = tester().with_timeout(Duration::from_secs(5));
        let req = request(vec![Receiver::new("ops")
            .with_config(config("slow", "slow"))
            .with_config(config("medium", "medium"))]);

        let started = Instant::now();
        let result = tester
            .test_receivers(req, CancellationToken::new())
            .await
            .unwrap();

        // The run takes as long as the timeout, not as long as the slow integration.
        assert_eq!(started.elapsed(), Duration::from_secs(5));
        let configs = &result.receivers[0].configs;
        assert!(matches!(configs[0].error, Some(ReceiverTestError::Timeout(_))));
        assert_eq!(configs[1].status, ConfigTestStatus::Ok);
    }

    #[tokio::test]
    async fn test_unknown_integration_type_is_invalid() {
        let req = request(vec![Receiver::new("ops").with_config(config("x", "carrier-pigeon"))]);
        let result = tester()
            .test_receivers(req, CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(result.status_code(), 400);
        let error = result.receivers[0].configs[0].error.as_ref().unwrap();
        assert!(error.message().contains("carrier-pigeon"));
    }

    #[tokio::test]
    async fn test_invalid_config_is_not_sent() {
        let mock = MockIntegration::new("webhook").requiring_setting("url");
        let sends = mock.send_counter();
        let tester = ReceiverTester::new(Arc::new(IntegrationRegistry::new().with(mock)), store());

        let req = request(vec![
            Receiver::new("ops").with_config(ReceiverConfig::new("no-url", "webhook"))
        ]);
        let result = tester
            .test_receivers(req, CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(result.status_code(), 400);
        assert_eq!(sends.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_panicking_integration_is_unknown() {
        let req = request(vec![Receiver::new("ops")
            .with_config(config("p", "panics"))
            .with_config(config("ok", "webhook"))]);

        let result = tester()
            .test_receivers(req, CancellationToken::new())
            .await
            .unwrap();

        let configs = &result.receivers[0].configs;
        assert!(matches!(configs[0].error, Some(ReceiverTestError::Unknown(_))));
        assert_eq!(configs[1].status, ConfigTestStatus::Ok);
        assert_eq!(result.status_code(), 500);
    }

    #[tokio::test]
    async fn test_empty_request_uses_active_configuration() {
        // The default configuration has a single receiver with no configs.
        let result = tester()
            .test_receivers(TestReceiversRequest::default(), CancellationToken::new())
            .await
            .unwrap();

        assert!(result.receivers.is_empty());
        assert_eq!(result.status_code(), 200);
    }

    #[tokio::test]
    async fn test_empty_request_tests_stored_receivers() {
        let store = store();
        let mut config = AlertmanagerConfiguration::default();
        config
            .receivers
            .push(Receiver::new("ops").with_config(config_with_uid("hook")));
        store.reload(config).await.unwrap();

        let tester = ReceiverTester::new(registry(), store);
        let result = tester
            .test_receivers(TestReceiversRequest::default(), CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(result.receivers.len(), 1);
        assert_eq!(result.receivers[0].name, "ops");
        assert_eq!(result.receivers[0].configs[0].uid, "hook");
    }

    fn config_with_uid(uid: &str) -> ReceiverConfig {
        config(uid, "webhook")
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_reports_timeouts_and_keeps_completed() {
        let req = request(vec![Receiver::new("ops")
            .with_config(config("done", "fast"))
            .with_config(config("pending", "slow"))]);

        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            trigger.cancel();
        });

        let started = Instant::now();
        let result = tester().test_receivers(req, cancel).await.unwrap();

        assert_eq!(started.elapsed(), Duration::from_secs(1));
        let configs = &result.receivers[0].configs;
        assert_eq!(configs[0].status, ConfigTestStatus::Ok);
        assert_eq!(
            configs[1].error,
            Some(ReceiverTestError::Timeout("receiver test cancelled".to_string()))
        );
        assert_eq!(result.status_code(), 408);
    }

    #[tokio::test]
    async fn test_alert_overrides_are_applied() {
        let mut overrides = TestAlert {
            labels: Default::default(),
            annotations: Default::default(),
        };
        overrides
            .labels
            .insert("severity".to_string(), "critical".to_string());

        let req = TestReceiversRequest {
            alert: Some(overrides),
            receivers: vec![Receiver::new("ops").with_config(config("a", "webhook"))],
        };
        let result = tester()
            .test_receivers(req, CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(result.alert.labels["severity"], "critical");
        assert_eq!(result.alert.labels["alertname"], "TestAlert");
    }

    #[test]
    fn test_result_serialization() {
        let ok = TestReceiverConfigResult::new(&config("a", "webhook"), Ok(()));
        let json = serde_json::to_value(&ok).unwrap();
        assert_eq!(json["status"], "ok");
        assert!(json.get("error").is_none());

        let failed = TestReceiverConfigResult::new(
            &config("b", "webhook"),
            Err(ReceiverTestError::Timeout("slow".to_string())),
        );
        let json = serde_json::to_value(&failed).unwrap();
        assert_eq!(json["status"], "failed");
        assert_eq!(json["error"]["kind"], "timeout");
    }
}
