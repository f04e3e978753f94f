//! Test-receivers command - runs receiver tests without a server.

use anyhow::{bail, Context, Result};
use ar_core::{
    AlertmanagerConfiguration, ConfigStore, ConfigTestStatus, IntegrationRegistry,
    ReceiverTester, TestAlert, TestReceiversRequest, TestReceiversResult,
};
use colored::Colorize;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Options for a local receiver test run.
#[derive(Debug, Clone, Default)]
pub struct TestReceiversOptions {
    /// Receivers to test by name. Empty means every configured receiver.
    pub receivers: Vec<String>,
    /// Label overrides for the test alert.
    pub labels: BTreeMap<String, String>,
    /// Annotation overrides for the test alert.
    pub annotations: BTreeMap<String, String>,
    pub timeout: Duration,
}

/// Builds the test request for `options` against `config`.
pub fn build_request(
    config: &AlertmanagerConfiguration,
    options: &TestReceiversOptions,
) -> Result<TestReceiversRequest> {
    let mut receivers = Vec::with_capacity(options.receivers.len());
    for name in &options.receivers {
        match config.receiver(name) {
            Some(receiver) => receivers.push(receiver.clone()),
            None => bail!("Receiver '{}' is not configured", name),
        }
    }

    let alert = if options.labels.is_empty() && options.annotations.is_empty() {
        None
    } else {
        Some(TestAlert {
            labels: options.labels.clone(),
            annotations: options.annotations.clone(),
        })
    };

    Ok(TestReceiversRequest { alert, receivers })
}

/// Tests receivers from `config` through `registry` and returns the result.
///
/// Ctrl+C cancels the run; configs still in flight are reported as timed out.
pub async fn run_receiver_test(
    config: AlertmanagerConfiguration,
    registry: IntegrationRegistry,
    options: TestReceiversOptions,
) -> Result<TestReceiversResult> {
    let request = build_request(&config, &options)?;
    let store = Arc::new(ConfigStore::new(config).context("Configuration is invalid")?);
    let tester = ReceiverTester::new(Arc::new(registry), store).with_timeout(options.timeout);

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_interrupt.cancel();
        }
    });

    let result = tester.test_receivers(request, cancel).await;
    interrupt.abort();

    result.context("Failed to run receiver tests")
}

/// Prints a test result as a table.
pub fn print_result(result: &TestReceiversResult) {
    println!(
        "{} {} at {}",
        "Alert:".bold(),
        result.alert.alert_name(),
        result.notified_at.to_rfc3339()
    );
    println!();

    if result.receivers.is_empty() {
        println!("{}", "No receiver configs to test.".yellow());
    }

    for receiver in &result.receivers {
        println!("{}", receiver.name.bold());
        for config in &receiver.configs {
            let status = match config.status {
                ConfigTestStatus::Ok => "ok".green(),
                ConfigTestStatus::Failed => "failed".red(),
            };
            print!("  {:<24} {:<16} {}", config.name, config.uid, status);
            if let Some(error) = &config.error {
                print!("  {}", error.to_string().dimmed());
            }
            println!();
        }
    }

    println!();
    let status = result.status();
    let summary = format!("Status: {:?} ({})", status, result.status_code());
    if result.status_code() == 200 {
        println!("{}", summary.green().bold());
    } else {
        println!("{}", summary.red().bold());
    }
}
