//! Metrics for receiver testing and configuration reloads.
//!
//! Recording goes through the `metrics` facade, so these functions are no-ops
//! until a recorder is installed (see [`install_prometheus_recorder`]).

use metrics::{counter, describe_counter, describe_histogram, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};
use std::time::Duration;

pub use metrics_exporter_prometheus::PrometheusHandle;

/// Content type of the Prometheus text exposition format.
pub const PROMETHEUS_CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

const RECEIVER_TESTS_TOTAL: &str = "ar_receiver_tests_total";
const RECEIVER_TEST_DURATION: &str = "ar_receiver_test_duration_seconds";
const CONFIG_RESULTS_TOTAL: &str = "ar_receiver_test_config_results_total";
const CONFIG_RELOADS_TOTAL: &str = "ar_config_reloads_total";

/// Registers metric descriptions.
pub fn register_metrics() {
    describe_counter!(
        RECEIVER_TESTS_TOTAL,
        "Total number of receiver test requests, by aggregate status"
    );
    describe_histogram!(
        RECEIVER_TEST_DURATION,
        "Wall-clock duration of receiver test requests"
    );
    describe_counter!(
        CONFIG_RESULTS_TOTAL,
        "Total number of tested receiver configs, by integration and outcome"
    );
    describe_counter!(
        CONFIG_RELOADS_TOTAL,
        "Total number of configuration reloads, by result"
    );
}

/// Installs the global Prometheus recorder and registers metric descriptions.
pub fn install_prometheus_recorder() -> Result<PrometheusHandle, BuildError> {
    let handle = PrometheusBuilder::new().install_recorder()?;
    register_metrics();
    Ok(handle)
}

/// Records a completed receiver test request.
pub fn record_receiver_test(status_code: u16, elapsed: Duration) {
    counter!(RECEIVER_TESTS_TOTAL, "status" => status_code.to_string()).increment(1);
    histogram!(RECEIVER_TEST_DURATION).record(elapsed.as_secs_f64());
}

/// Records the outcome of testing a single receiver config.
pub fn record_receiver_config_result(integration: &str, outcome: &str) {
    counter!(
        CONFIG_RESULTS_TOTAL,
        "integration" => integration.to_string(),
        "outcome" => outcome.to_string()
    )
    .increment(1);
}

/// Records a configuration reload attempt.
pub fn record_config_reload(result: &str) {
    counter!(CONFIG_RELOADS_TOTAL, "result" => result.to_string()).increment(1);
}
