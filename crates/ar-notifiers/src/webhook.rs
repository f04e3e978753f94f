//! Generic webhook integration.
//!
//! Posts an Alertmanager-style JSON message to an arbitrary HTTP endpoint.
//!
//! Settings:
//! - `url` (required)
//! - `httpMethod`: `POST` (default) or `PUT`
//! - `username` / `password`: HTTP basic auth, usually kept in secure settings
//! - `authorization_scheme` / `authorization_credentials`: a raw `Authorization` header

use crate::http::{required_url, HttpSender, JsonRequest};
use ar_core::{Integration, NotifyError, ReceiverConfig, TestNotification};
use async_trait::async_trait;
use reqwest::Method;
use serde::Serialize;
use std::collections::BTreeMap;
use tokio::time::Instant;
use tracing::{debug, instrument};

pub const WEBHOOK_TYPE: &str = "webhook";

/// Sends test notifications to a generic HTTP endpoint.
#[derive(Debug, Clone, Default)]
pub struct WebhookIntegration {
    sender: HttpSender,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct WebhookMessage<'a> {
    receiver: &'a str,
    status: &'static str,
    alerts: Vec<WebhookAlert<'a>>,
    group_labels: BTreeMap<&'a str, &'a str>,
    common_labels: &'a BTreeMap<String, String>,
    common_annotations: &'a BTreeMap<String, String>,
    title: &'a str,
    message: &'a str,
    version: &'static str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct WebhookAlert<'a> {
    status: &'static str,
    labels: &'a BTreeMap<String, String>,
    annotations: &'a BTreeMap<String, String>,
    starts_at: String,
}

impl WebhookIntegration {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sender(sender: HttpSender) -> Self {
        Self { sender }
    }

    fn method(config: &ReceiverConfig) -> Result<Method, NotifyError> {
        match config.setting_str("httpMethod").map(str::to_ascii_uppercase) {
            None => Ok(Method::POST),
            Some(m) if m == "POST" => Ok(Method::POST),
            Some(m) if m == "PUT" => Ok(Method::PUT),
            Some(other) => Err(NotifyError::InvalidConfig(format!(
                "unsupported httpMethod '{}', expected POST or PUT",
                other
            ))),
        }
    }

    fn message<'a>(notification: &'a TestNotification) -> WebhookMessage<'a> {
        let alert = &notification.alert;
        WebhookMessage {
            receiver: &notification.receiver,
            status: "firing",
            alerts: vec![WebhookAlert {
                status: "firing",
                labels: &alert.labels,
                annotations: &alert.annotations,
                starts_at: notification.starts_at.to_rfc3339(),
            }],
            group_labels: BTreeMap::from([("alertname", alert.alert_name())]),
            common_labels: &alert.labels,
            common_annotations: &alert.annotations,
            title: &notification.title,
            message: &notification.message,
            version: "1",
        }
    }
}

#[async_trait]
impl Integration for WebhookIntegration {
    fn integration_type(&self) -> &str {
        WEBHOOK_TYPE
    }

    fn validate(&self, config: &ReceiverConfig) -> Result<(), NotifyError> {
        required_url(config, "url")?;
        Self::method(config)?;
        if config.setting_str("password").is_some() && config.setting_str("username").is_none() {
            return Err(NotifyError::InvalidConfig(
                "password is set but username is missing".to_string(),
            ));
        }
        if config.setting_str("authorization_credentials").is_some()
            && config.setting_str("username").is_some()
        {
            return Err(NotifyError::InvalidConfig(
                "both HTTP basic auth and authorization header are set".to_string(),
            ));
        }
        Ok(())
    }

    #[instrument(skip_all, fields(receiver = %notification.receiver, config = %config.name))]
    async fn send(
        &self,
        config: &ReceiverConfig,
        notification: &TestNotification,
        deadline: Instant,
    ) -> Result<(), NotifyError> {
        let url = required_url(config, "url")?;
        let message = Self::message(notification);

        let mut request = JsonRequest::post(&url, &message).with_method(Self::method(config)?);
        if let Some(username) = config.setting_str("username") {
            request = request.with_basic_auth(
                username.to_string(),
                config.setting_str("password").map(str::to_string),
            );
        }
        if let Some(credentials) = config.setting_str("authorization_credentials") {
            let scheme = config
                .setting_str("authorization_scheme")
                .unwrap_or("Bearer");
            request =
                request.with_header("Authorization", &format!("{} {}", scheme, credentials))?;
        }

        debug!(url = %url, "Sending test notification to webhook");
        self.sender.send_json(request, deadline).await?;
        Ok(())
    }
}
