//! Application state shared across handlers.

use ar_core::{ConfigStore, IntegrationRegistry, ReceiverTester, StatusReporter};
use ar_observability::PrometheusHandle;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Holder of the active Alertmanager configuration.
    pub store: Arc<ConfigStore>,
    /// Receiver test orchestrator.
    pub tester: Arc<ReceiverTester>,
    pub status: Arc<StatusReporter>,
    /// Prometheus metrics handle for rendering metrics.
    pub prometheus_handle: Option<Arc<PrometheusHandle>>,
    /// Cancelled when the server shuts down; in-flight receiver tests derive from it.
    pub shutdown: CancellationToken,
}

impl AppState {
    /// Creates a new application state.
    pub fn new(
        store: Arc<ConfigStore>,
        registry: Arc<IntegrationRegistry>,
        test_timeout: Duration,
    ) -> Self {
        info!(
            integrations = ?registry.types(),
            timeout_secs = test_timeout.as_secs_f64(),
            "Receiver tester initialized"
        );

        let tester = ReceiverTester::new(registry, store.clone()).with_timeout(test_timeout);

        Self {
            tester: Arc::new(tester),
            status: Arc::new(StatusReporter::new(store.clone())),
            store,
            prometheus_handle: None,
            shutdown: CancellationToken::new(),
        }
    }

    /// Sets the Prometheus handle.
    pub fn with_prometheus_handle(mut self, handle: PrometheusHandle) -> Self {
        self.prometheus_handle = Some(Arc::new(handle));
        self
    }

    /// Sets the shutdown token.
    pub fn with_shutdown_token(mut self, token: CancellationToken) -> Self {
        self.shutdown = token;
        self
    }
}
