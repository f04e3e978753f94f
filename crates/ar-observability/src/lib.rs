//! # ar-observability
//!
//! Logging and metrics infrastructure for Alert Relay.
//!
//! This crate provides structured logging with tracing and the metric
//! recorders used by receiver testing and configuration reloads.

pub mod logging;
pub mod metrics;

pub use logging::{init_logging, LogFormat, LoggingConfig};
pub use metrics::{
    install_prometheus_recorder, record_config_reload, record_receiver_config_result,
    record_receiver_test, register_metrics, PrometheusHandle, PROMETHEUS_CONTENT_TYPE,
};
