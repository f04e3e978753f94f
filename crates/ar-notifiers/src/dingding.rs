//! DingDing (DingTalk) robot integration.
//!
//! Settings: `url` (required), `msgType` (`link` by default, `actionCard` or
//! `text`), `msgAt` (`@all` or comma-separated mobile numbers, text messages only)
//! and `messageUrl` (link target shown in the message).

use crate::http::{required_url, HttpSender, JsonRequest};
use ar_core::{Integration, NotifyError, ReceiverConfig, TestNotification};
use async_trait::async_trait;
use reqwest::Url;
use serde_json::{json, Value};
use tokio::time::Instant;
use tracing::{debug, instrument};

pub const DINGDING_TYPE: &str = "dingding";

const DEFAULT_MSG_TYPE: &str = "link";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MessageType {
    Link,
    ActionCard,
    Text,
}

impl MessageType {
    fn from_settings(config: &ReceiverConfig) -> Result<Self, NotifyError> {
        match config.setting_str("msgType").unwrap_or(DEFAULT_MSG_TYPE) {
            "link" => Ok(MessageType::Link),
            "actionCard" => Ok(MessageType::ActionCard),
            "text" => Ok(MessageType::Text),
            other => Err(NotifyError::InvalidConfig(format!(
                "unsupported msgType '{}', expected link, actionCard or text",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct DingDingIntegration {
    sender: HttpSender,
}

impl DingDingIntegration {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sender(sender: HttpSender) -> Self {
        Self { sender }
    }

    /// Wraps the message URL so DingDing opens it outside the client.
    fn client_link(message_url: &str) -> String {
        Url::parse_with_params(
            "dingtalk://dingtalkclient/page/link",
            &[("pc_slide", "false"), ("url", message_url)],
        )
        .map(|u| u.to_string())
        .unwrap_or_default()
    }

    fn at(msg_at: Option<&str>) -> Value {
        match msg_at.map(str::trim) {
            Some("@all") => json!({ "isAtAll": true }),
            Some(list) if list.contains(',') => {
                let mobiles: Vec<&str> = list
                    .split(',')
                    .map(str::trim)
                    .filter(|m| !m.is_empty())
                    .collect();
                json!({ "atMobiles": mobiles })
            }
            Some(mobile) if mobile.len() == 11 && mobile.chars().all(|c| c.is_ascii_digit()) => {
                json!({ "atMobiles": [mobile] })
            }
            _ => json!({ "isAtAll": false }),
        }
    }

    fn body(
        config: &ReceiverConfig,
        notification: &TestNotification,
    ) -> Result<Value, NotifyError> {
        let link = Self::client_link(config.setting_str("messageUrl").unwrap_or_default());
        let title = &notification.title;
        let message = &notification.message;

        let body = match MessageType::from_settings(config)? {
            MessageType::ActionCard => json!({
                "msgtype": "actionCard",
                "actionCard": {
                    "text": message,
                    "title": title,
                    "singleTitle": "More",
                    "singleURL": link,
                },
            }),
            MessageType::Text => json!({
                "msgtype": "text",
                "text": { "content": format!("alert:{}", message) },
                "at": Self::at(config.setting_str("msgAt")),
            }),
            MessageType::Link => json!({
                "msgtype": "link",
                "link": {
                    "text": message,
                    "title": title,
                    "messageUrl": link,
                },
            }),
        };
        Ok(body)
    }
}

#[async_trait]
impl Integration for DingDingIntegration {
    fn integration_type(&self) -> &str {
        DINGDING_TYPE
    }

    fn validate(&self, config: &ReceiverConfig) -> Result<(), NotifyError> {
        required_url(config, "url")?;
        MessageType::from_settings(config)?;
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
        let body = Self::body(config, notification)?;

        debug!("Sending test notification to DingDing");
        let response = self
            .sender
            .send_json(JsonRequest::post(&url, &body), deadline)
            .await?;

        // The robot API answers 200 with a non-zero errcode on failure.
        if let Ok(reply) = serde_json::from_str::<Value>(&response) {
            if let Some(code) = reply.get("errcode").and_then(Value::as_i64) {
                if code != 0 {
                    let msg = reply.get("errmsg").and_then(Value::as_str).unwrap_or("");
                    return Err(NotifyError::SendFailed(format!(
                        "DingDing error {}: {}",
                        code, msg
                    )));
                }
            }
        }
        Ok(())
    }
}
