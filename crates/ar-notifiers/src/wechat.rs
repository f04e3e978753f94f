//! WeChat Work (企业微信) application message integration.
//!
//! Settings: `corpid`, `agentid`, `secret` and `touser` (all required;
//! `touser` is a `|`-separated member list or `@all`). `endpointUrl` overrides
//! the API base. Delivery fetches an access token, then sends a text message.

use crate::http::{parse_http_url, HttpSender, JsonRequest};
use ar_core::{Integration, NotifyError, ReceiverConfig, TestNotification};
use async_trait::async_trait;
use reqwest::Url;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::time::Instant;
use tracing::{debug, instrument};

pub const WECHAT_TYPE: &str = "wechat";

/// API base used when `endpointUrl` is not set.
pub const WECHAT_API_ENDPOINT: &str = "https://qyapi.weixin.qq.com/cgi-bin";

/// Checked in this order, so the first missing one is reported.
const REQUIRED_SETTINGS: [&str; 4] = ["agentid", "corpid", "secret", "touser"];

/// Common envelope of WeChat API replies.
#[derive(Debug, Deserialize)]
struct Reply {
    #[serde(default)]
    errcode: i64,
    #[serde(default)]
    errmsg: String,
    #[serde(default)]
    access_token: Option<String>,
}

impl Reply {
    fn parse(body: &str, step: &str) -> Result<Self, NotifyError> {
        let reply: Reply = serde_json::from_str(body).map_err(|e| {
            NotifyError::SendFailed(format!("WeChat {} reply is not JSON: {}", step, e))
        })?;
        if reply.errcode != 0 {
            return Err(NotifyError::SendFailed(format!(
                "WeChat {} error {}: {}",
                step, reply.errcode, reply.errmsg
            )));
        }
        Ok(reply)
    }
}

#[derive(Debug, Clone, Default)]
pub struct WeChatIntegration {
    sender: HttpSender,
}

impl WeChatIntegration {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sender(sender: HttpSender) -> Self {
        Self { sender }
    }

    fn setting<'a>(config: &'a ReceiverConfig, key: &str) -> Result<&'a str, NotifyError> {
        config
            .setting_str(key)
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| {
                NotifyError::InvalidConfig(format!("could not find {} in settings", key))
            })
    }

    fn api_url(
        config: &ReceiverConfig,
        path: &str,
        params: &[(&str, &str)],
    ) -> Result<Url, NotifyError> {
        let base = config
            .setting_str("endpointUrl")
            .unwrap_or(WECHAT_API_ENDPOINT);
        let base = parse_http_url(base, "endpointUrl")?;
        let raw = format!("{}/{}", base.as_str().trim_end_matches('/'), path);
        Url::parse_with_params(&raw, params)
            .map_err(|e| NotifyError::InvalidConfig(format!("invalid endpointUrl: {}", e)))
    }

    fn body(
        config: &ReceiverConfig,
        notification: &TestNotification,
    ) -> Result<Value, NotifyError> {
        Ok(json!({
            "touser": Self::setting(config, "touser")?,
            "msgtype": "text",
            "agentid": Self::setting(config, "agentid")?,
            "text": {
                "content": format!("{}\n{}", notification.title, notification.message),
            },
        }))
    }

    async fn access_token(
        &self,
        config: &ReceiverConfig,
        deadline: Instant,
    ) -> Result<String, NotifyError> {
        let url = Self::api_url(
            config,
            "gettoken",
            &[
                ("corpid", Self::setting(config, "corpid")?),
                ("corpsecret", Self::setting(config, "secret")?),
            ],
        )?;

        let reply = Reply::parse(&self.sender.get(&url, deadline).await?, "token")?;
        reply
            .access_token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| {
                NotifyError::SendFailed("WeChat token reply has no access_token".to_string())
            })
    }
}

#[async_trait]
impl Integration for WeChatIntegration {
    fn integration_type(&self) -> &str {
        WECHAT_TYPE
    }

    fn validate(&self, config: &ReceiverConfig) -> Result<(), NotifyError> {
        for key in REQUIRED_SETTINGS {
            Self::setting(config, key)?;
        }
        if let Some(endpoint) = config.setting_str("endpointUrl") {
            parse_http_url(endpoint, "endpointUrl")?;
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
        let body = Self::body(config, notification)?;
        let token = self.access_token(config, deadline).await?;

        debug!("Sending test notification to WeChat");
        let url = Self::api_url(config, "message/send", &[("access_token", token.as_str())])?;
        let response = self
            .sender
            .send_json(JsonRequest::post(&url, &body), deadline)
            .await?;
        Reply::parse(&response, "send")?;
        Ok(())
    }
}
