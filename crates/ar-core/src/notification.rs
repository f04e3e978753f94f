//! Test alert and rendered test notification.
//!
//! A receiver test sends one synthetic firing alert through every selected
//! integration. The alert is rendered once per receiver into a
//! [`TestNotification`] that integrations turn into their own payload format.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Write;

pub const DEFAULT_ALERT_NAME: &str = "TestAlert";
pub const DEFAULT_INSTANCE: &str = "Alert Relay";
pub const DEFAULT_SUMMARY: &str = "Notification test";

/// Labels and annotations of the synthetic test alert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestAlert {
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    #[serde(default)]
    pub annotations: BTreeMap<String, String>,
}

impl Default for TestAlert {
    fn default() -> Self {
        let labels = BTreeMap::from([
            ("alertname".to_string(), DEFAULT_ALERT_NAME.to_string()),
            ("instance".to_string(), DEFAULT_INSTANCE.to_string()),
        ]);
        let annotations = BTreeMap::from([("summary".to_string(), DEFAULT_SUMMARY.to_string())]);
        Self {
            labels,
            annotations,
        }
    }
}

impl TestAlert {
    /// Returns the default alert with `overrides` merged over it.
    ///
    /// Override keys replace default keys; defaults not overridden are kept.
    pub fn with_overrides(overrides: Option<&TestAlert>) -> Self {
        let mut alert = Self::default();
        if let Some(overrides) = overrides {
            alert.labels.extend(overrides.labels.clone());
            alert.annotations.extend(overrides.annotations.clone());
        }
        alert
    }

    pub fn alert_name(&self) -> &str {
        self.labels
            .get("alertname")
            .map(String::as_str)
            .unwrap_or(DEFAULT_ALERT_NAME)
    }
}

/// A rendered test notification, shared read-only by all integrations of a receiver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestNotification {
    pub receiver: String,
    pub alert: TestAlert,
    /// Short title, e.g. `[FIRING:1] TestAlert (Alert Relay)`.
    pub title: String,
    /// Plain-text body listing labels and annotations.
    pub message: String,
    pub starts_at: DateTime<Utc>,
}

impl TestNotification {
    pub fn new(receiver: impl Into<String>, alert: &TestAlert, starts_at: DateTime<Utc>) -> Self {
        let mut title = format!("[FIRING:1] {}", alert.alert_name());
        if let Some(instance) = alert.labels.get("instance") {
            let _ = write!(title, " ({})", instance);
        }

        let mut message = String::from("**Firing**\n\nLabels:\n");
        for (k, v) in &alert.labels {
            let _ = writeln!(message, " - {} = {}", k, v);
        }
        if !alert.annotations.is_empty() {
            message.push_str("Annotations:\n");
            for (k, v) in &alert.annotations {
                let _ = writeln!(message, " - {} = {}", k, v);
            }
        }

        Self {
            receiver: receiver.into(),
            alert: alert.clone(),
            title,
            message,
            starts_at,
        }
    }

    /// Labels of the rendered alert.
    pub fn labels(&self) -> &BTreeMap<String, String> {
        &self.alert.labels
    }
}
