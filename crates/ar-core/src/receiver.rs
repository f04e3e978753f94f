//! Receiver and receiver config data structures.
//!
//! A receiver is a named routing destination made up of one or more
//! integration configs. Every config must deliver successfully for the
//! receiver to be considered healthy.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Placeholder written over secret values before a config leaves the process.
pub const REDACTED: &str = "[REDACTED]";

/// One named configuration of one notification integration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReceiverConfig {
    /// Stable identifier, unique within the owning receiver.
    #[serde(default)]
    pub uid: String,
    /// Human-readable name, unique within the owning receiver.
    pub name: String,
    /// Integration type name (e.g. `webhook`, `slack`, `dingding`).
    #[serde(rename = "type")]
    pub integration_type: String,
    /// Skip sending a message when the alert resolves.
    #[serde(default)]
    pub disable_resolve_message: bool,
    /// Integration-specific settings, validated by the integration.
    #[serde(default)]
    pub settings: BTreeMap<String, serde_json::Value>,
    /// Secret settings (tokens, passwords). Looked up before `settings`.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub secure_settings: BTreeMap<String, String>,
}

impl ReceiverConfig {
    /// Creates a new config with a generated uid and no settings.
    pub fn new(name: impl Into<String>, integration_type: impl Into<String>) -> Self {
        Self {
            uid: Uuid::new_v4().to_string(),
            name: name.into(),
            integration_type: integration_type.into(),
            disable_resolve_message: false,
            settings: BTreeMap::new(),
            secure_settings: BTreeMap::new(),
        }
    }

    /// Sets the uid.
    pub fn with_uid(mut self, uid: impl Into<String>) -> Self {
        self.uid = uid.into();
        self
    }

    /// Adds a setting.
    pub fn with_setting(
        mut self,
        key: impl Into<String>,
        value: impl Into<serde_json::Value>,
    ) -> Self {
        self.settings.insert(key.into(), value.into());
        self
    }

    /// Adds a secret setting.
    pub fn with_secure_setting(
        mut self,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        self.secure_settings.insert(key.into(), value.into());
        self
    }

    /// Returns a string setting, preferring the secure value when both exist.
    ///
    /// Empty strings are treated as absent.
    pub fn setting_str(&self, key: &str) -> Option<&str> {
        self.secure_settings
            .get(key)
            .map(String::as_str)
            .or_else(|| self.settings.get(key).and_then(|v| v.as_str()))
            .filter(|v| !v.is_empty())
    }

    /// Returns a boolean setting, or `default` if absent or not a boolean.
    pub fn setting_bool(&self, key: &str, default: bool) -> bool {
        self.settings
            .get(key)
            .and_then(|v| v.as_bool())
            .unwrap_or(default)
    }

    /// Returns a copy with all secure settings replaced by [`REDACTED`].
    pub fn redacted(&self) -> Self {
        let mut config = self.clone();
        for value in config.secure_settings.values_mut() {
            *value = REDACTED.to_string();
        }
        config
    }
}

/// A named group of integration configs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Receiver {
    /// Receiver name, unique within a configuration or test request.
    pub name: String,
    /// Integration configs, in caller order.
    #[serde(default)]
    pub configs: Vec<ReceiverConfig>,
}

impl Receiver {
    /// Creates a receiver with no configs.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            configs: Vec::new(),
        }
    }

    /// Appends a config.
    pub fn with_config(mut self, config: ReceiverConfig) -> Self {
        self.configs.push(config);
        self
    }

    /// Looks up a config by uid.
    pub fn config(&self, uid: &str) -> Option<&ReceiverConfig> {
        self.configs.iter().find(|c| c.uid == uid)
    }

    /// Returns a copy with secrets redacted in every config.
    pub fn redacted(&self) -> Self {
        Self {
            name: self.name.clone(),
            configs: self.configs.iter().map(ReceiverConfig::redacted).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_setting_str_prefers_secure_settings() {
        let config = ReceiverConfig::new("hook", "webhook")
            .with_setting("url", "http://plain.example.com")
            .with_secure_setting("url", "http://secret.example.com");

        assert_eq!(config.setting_str("url"), Some("http://secret.example.com"));
    }

    #[test]
    fn test_setting_str_treats_empty_as_missing() {
        let config = ReceiverConfig::new("hook", "webhook").with_setting("url", "");
        assert_eq!(config.setting_str("url"), None);
        assert_eq!(config.setting_str("missing"), None);
    }

    #[test]
    fn test_setting_bool_default() {
        let config = ReceiverConfig::new("hook", "webhook").with_setting("flag", true);
        assert!(config.setting_bool("flag", false));
        assert!(config.setting_bool("absent", true));
    }

    #[test]
    fn test_redacted_hides_secure_settings_only() {
        let receiver = Receiver::new("ops").with_config(
            ReceiverConfig::new("hook", "webhook")
                .with_setting("url", "http://example.com")
                .with_secure_setting("password", "hunter2"),
        );

        let redacted = receiver.redacted();
        let config = &redacted.configs[0];
        assert_eq!(config.secure_settings.get("password").unwrap(), REDACTED);
        assert_eq!(config.setting_str("url"), Some("http://example.com"));
    }

    #[test]
    fn test_deserialize_type_field() {
        let config: ReceiverConfig = serde_json::from_value(serde_json::json!({
            "uid": "abc",
            "name": "team-hook",
            "type": "webhook",
            "settings": { "url": "http://example.com" }
        }))
        .unwrap();

        assert_eq!(config.integration_type, "webhook");
        assert!(!config.disable_resolve_message);
        assert!(config.secure_settings.is_empty());
    }

    #[test]
    fn test_lookup_config_by_uid() {
        let receiver = Receiver::new("ops")
            .with_config(ReceiverConfig::new("a", "webhook").with_uid("uid-a"))
            .with_config(ReceiverConfig::new("b", "slack").with_uid("uid-b"));

        assert_eq!(receiver.config("uid-b").map(|c| c.name.as_str()), Some("b"));
        assert!(receiver.config("uid-c").is_none());
    }
}
