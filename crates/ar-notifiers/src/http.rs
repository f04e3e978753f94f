//! Shared HTTP delivery for integrations.

use ar_core::{NotifyError, ReceiverConfig};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Method, RequestBuilder, Url};
use std::time::Duration;
use serde::Serialize;
use tokio::time::Instant;
use tracing::debug;

/// Longest response body kept in a [`NotifyError::Rejected`].
const MAX_ERROR_BODY: usize = 512;

/// A JSON request to deliver.
#[derive(Debug)]
pub struct JsonRequest<'a, T: Serialize> {
    pub method: Method,
    pub url: &'a Url,
    pub body: &'a T,
    pub headers: HeaderMap,
    pub basic_auth: Option<(String, Option<String>)>,
    pub bearer_token: Option<String>,
}

impl<'a, T: Serialize> JsonRequest<'a, T> {
    pub fn post(url: &'a Url, body: &'a T) -> Self {
        Self {
            method: Method::POST,
            url,
            body,
            headers: HeaderMap::new(),
            basic_auth: None,
            bearer_token: None,
        }
    }

    pub fn with_method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Result<Self, NotifyError> {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| NotifyError::InvalidConfig(format!("invalid header name: {}", e)))?;
        let value = HeaderValue::from_str(value)
            .map_err(|e| NotifyError::InvalidConfig(format!("invalid header value: {}", e)))?;
        self.headers.insert(name, value);
        Ok(self)
    }

    pub fn with_basic_auth(mut self, username: String, password: Option<String>) -> Self {
        self.basic_auth = Some((username, password));
        self
    }

    pub fn with_bearer_token(mut self, token: String) -> Self {
        self.bearer_token = Some(token);
        self
    }
}

/// Sends JSON requests under a deadline and classifies failures.
#[derive(Debug, Clone, Default)]
pub struct HttpSender {
    client: reqwest::Client,
}

impl HttpSender {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sends `request`, returning the response body on a 2xx status.
    pub async fn send_json<T: Serialize>(
        &self,
        request: JsonRequest<'_, T>,
        deadline: Instant,
    ) -> Result<String, NotifyError> {
        let remaining = remaining_until(deadline)?;

        let mut builder = self
            .client
            .request(request.method, request.url.clone())
            .timeout(remaining)
            .headers(request.headers)
            .json(request.body);
        if let Some((username, password)) = request.basic_auth {
            builder = builder.basic_auth(username, password);
        }
        if let Some(token) = request.bearer_token {
            builder = builder.bearer_auth(token);
        }

        execute(builder).await
    }

    /// Issues a GET to `url`, returning the response body on a 2xx status.
    pub async fn get(&self, url: &Url, deadline: Instant) -> Result<String, NotifyError> {
        let remaining = remaining_until(deadline)?;
        execute(self.client.get(url.clone()).timeout(remaining)).await
    }
}

fn remaining_until(deadline: Instant) -> Result<Duration, NotifyError> {
    let remaining = deadline.saturating_duration_since(Instant::now());
    if remaining.is_zero() {
        return Err(NotifyError::Timeout(
            "deadline passed before sending".to_string(),
        ));
    }
    Ok(remaining)
}

async fn execute(builder: RequestBuilder) -> Result<String, NotifyError> {
    let response = builder.send().await.map_err(classify_error)?;
    let status = response.status();
    let body = response.text().await.map_err(classify_error)?;
    debug!(status = status.as_u16(), "Integration endpoint responded");

    if status.is_success() {
        Ok(body)
    } else {
        Err(NotifyError::Rejected {
            status: status.as_u16(),
            body: truncate(body),
        })
    }
}

fn classify_error(err: reqwest::Error) -> NotifyError {
    if err.is_timeout() {
        NotifyError::Timeout(err.to_string())
    } else if err.is_builder() {
        NotifyError::InvalidConfig(err.to_string())
    } else {
        NotifyError::SendFailed(err.to_string())
    }
}

fn truncate(mut body: String) -> String {
    if body.len() > MAX_ERROR_BODY {
        let mut end = MAX_ERROR_BODY;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        body.truncate(end);
    }
    body
}

/// Reads a required http(s) URL setting.
pub fn required_url(config: &ReceiverConfig, key: &str) -> Result<Url, NotifyError> {
    let raw = config
        .setting_str(key)
        .ok_or_else(|| NotifyError::InvalidConfig(format!("could not find {} in settings", key)))?;
    parse_http_url(raw, key)
}

/// Parses an http(s) URL, naming `key` in the error.
pub fn parse_http_url(raw: &str, key: &str) -> Result<Url, NotifyError> {
    let url = Url::parse(raw)
        .map_err(|e| NotifyError::InvalidConfig(format!("invalid {} '{}': {}", key, raw, e)))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(NotifyError::InvalidConfig(format!(
            "invalid {}: unsupported scheme '{}'",
            key, other
        ))),
    }
}
