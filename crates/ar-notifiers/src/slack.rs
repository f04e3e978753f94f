//! Slack integration.
//!
//! Delivers either through an incoming webhook (`url`) or through the Web API
//! (`token` plus `recipient`), in which case Slack reports failures in the
//! response body rather than the status code.

use crate::http::{parse_http_url, required_url, HttpSender, JsonRequest};
use ar_core::{Integration, NotifyError, ReceiverConfig, TestNotification};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tracing::{debug, instrument};

pub const SLACK_TYPE: &str = "slack";

/// Web API endpoint used with a bot token.
pub const SLACK_API_ENDPOINT: &str = "https://slack.com/api/chat.postMessage";

const FIRING_COLOR: &str = "#D63232";

#[derive(Debug, Clone, Default)]
pub struct SlackIntegration {
    sender: HttpSender,
}

#[derive(Debug, Serialize)]
struct SlackMessage<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    channel: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    username: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    icon_emoji: Option<&'a str>,
    text: String,
    attachments: Vec<SlackAttachment<'a>>,
}

#[derive(Debug, Serialize)]
struct SlackAttachment<'a> {
    color: &'static str,
    title: &'a str,
    text: &'a str,
    footer: &'static str,
    ts: i64,
}

#[derive(Debug, Deserialize)]
struct SlackApiResponse {
    ok: bool,
    #[serde(default)]
    error: Option<String>,
}

enum Delivery {
    Webhook,
    Api { token: String },
}

impl SlackIntegration {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sender(sender: HttpSender) -> Self {
        Self { sender }
    }

    fn delivery(config: &ReceiverConfig) -> Result<Delivery, NotifyError> {
        match config.setting_str("token") {
            Some(token) => {
                if config.setting_str("recipient").is_none() {
                    return Err(NotifyError::InvalidConfig(
                        "recipient must be specified when using the Slack chat API".to_string(),
                    ));
                }
                Ok(Delivery::Api {
                    token: token.to_string(),
                })
            }
            None if config.setting_str("url").is_some() => Ok(Delivery::Webhook),
            None => Err(NotifyError::InvalidConfig(
                "token or url must be specified".to_string(),
            )),
        }
    }

    fn message<'a>(config: &'a ReceiverConfig, notification: &'a TestNotification) -> SlackMessage<'a> {
        let mention = config
            .setting_str("mentionChannel")
            .map(|c| format!("<!{}> ", c))
            .unwrap_or_default();

        SlackMessage {
            channel: config.setting_str("recipient"),
            username: config.setting_str("username"),
            icon_emoji: config.setting_str("icon_emoji"),
            text: format!("{}{}", mention, notification.title),
            attachments: vec![SlackAttachment {
                color: FIRING_COLOR,
                title: &notification.title,
                text: &notification.message,
                footer: "Alert Relay",
                ts: notification.starts_at.timestamp(),
            }],
        }
    }
}

#[async_trait]
impl Integration for SlackIntegration {
    fn integration_type(&self) -> &str {
        SLACK_TYPE
    }

    fn validate(&self, config: &ReceiverConfig) -> Result<(), NotifyError> {
        match Self::delivery(config)? {
            Delivery::Webhook => {
                required_url(config, "url")?;
            }
            Delivery::Api { .. } => {
                if let Some(endpoint) = config.setting_str("endpointUrl") {
                    parse_http_url(endpoint, "endpointUrl")?;
                }
            }
        }

        match config.setting_str("mentionChannel") {
            None | Some("here") | Some("channel") => Ok(()),
            Some(other) => Err(NotifyError::InvalidConfig(format!(
                "invalid mentionChannel '{}', expected 'here' or 'channel'",
                other
            ))),
        }
    }

    #[instrument(skip_all, fields(receiver = %notification.receiver, config = %config.name))]
    async fn send(
        &self,
        config: &ReceiverConfig,
        notification: &TestNotification,
        deadline: Instant,
    ) -> Result<(), NotifyError> {
        let message = Self::message(config, notification);

        match Self::delivery(config)? {
            Delivery::Webhook => {
                let url = required_url(config, "url")?;
                debug!("Sending test notification to Slack webhook");
                self.sender
                    .send_json(JsonRequest::post(&url, &message), deadline)
                    .await?;
            }
            Delivery::Api { token } => {
                let endpoint = config.setting_str("endpointUrl").unwrap_or(SLACK_API_ENDPOINT);
                let url = parse_http_url(endpoint, "endpointUrl")?;
                debug!("Sending test notification through Slack chat API");
                let body = self
                    .sender
                    .send_json(JsonRequest::post(&url, &message).with_bearer_token(token), deadline)
                    .await?;

                let response: SlackApiResponse = serde_json::from_str(&body)
                    .map_err(|e| NotifyError::Other(format!("unexpected Slack response: {}", e)))?;
                if !response.ok {
                    return Err(NotifyError::SendFailed(format!(
                        "Slack API error: {}",
                        response.error.unwrap_or_else(|| "unknown".to_string())
                    )));
                }
            }
        }
        Ok(())
    }
}
