//! Alertmanager configuration model, loading and validation.
//!
//! The configuration is the routing tree plus the full set of receivers. It is
//! parsed from YAML or JSON, validated as a whole, and identified by a content
//! hash so that reloads of an identical document can be detected.

use crate::receiver::Receiver;
use regex::Regex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::env;
use std::path::Path;
use std::sync::OnceLock;
use uuid::Uuid;
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur while loading or validating a configuration.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Failed to read configuration file: {0}")]
    Io(String),

    #[error("Failed to parse configuration: {0}")]
    Parse(String),

    #[error("Environment variable not found: {0}")]
    EnvVarNotFound(String),

    #[error("Receiver name must not be empty")]
    EmptyReceiverName,

    #[error("Duplicate receiver name: {0}")]
    DuplicateReceiver(String),

    #[error("Receiver '{receiver}' has a config with an empty name")]
    EmptyConfigName { receiver: String },

    #[error("Receiver '{receiver}' has a config with an empty type")]
    EmptyIntegrationType { receiver: String },

    #[error("Receiver '{receiver}' has config '{config}' without a uid")]
    EmptyUid { receiver: String, config: String },

    #[error("Receiver '{receiver}' has duplicate config uid '{uid}'")]
    DuplicateUid { receiver: String, uid: String },

    #[error("Root route must specify a receiver")]
    MissingRootReceiver,

    #[error("Route references undefined receiver: {0}")]
    UnknownReceiver(String),

    #[error("Invalid matcher '{matcher}': {message}")]
    InvalidMatcher { matcher: String, message: String },

    #[error("Invalid duration for {field}: '{value}'")]
    InvalidDuration { field: &'static str, value: String },
}

/// Name of the receiver in the built-in default configuration.
pub const DEFAULT_RECEIVER: &str = "default";

/// The active routing tree and receiver definitions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertmanagerConfiguration {
    /// Root of the routing tree.
    pub route: Route,
    /// All receivers the routing tree may reference.
    #[serde(default)]
    pub receivers: Vec<Receiver>,
    /// Notification template file names.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub templates: Vec<String>,
}

/// A node of the routing tree.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Route {
    /// Receiver for alerts matching this node. Required at the root.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub receiver: Option<String>,
    /// Labels alerts are grouped by.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub group_by: Vec<String>,
    /// Label matchers such as `severity="critical"` or `team=~"ops|infra"`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub matchers: Vec<String>,
    /// Keep matching sibling routes after this one matches.
    #[serde(default, rename = "continue")]
    pub continue_matching: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_wait: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_interval: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repeat_interval: Option<String>,
    /// Child routes.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub routes: Vec<Route>,
}

/// Label matching operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchType {
    Equal,
    NotEqual,
    Regexp,
    NotRegexp,
}

/// A parsed route matcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Matcher {
    pub name: String,
    pub match_type: MatchType,
    pub value: String,
}

impl Matcher {
    /// Parses a matcher of the form `name<op>value`, where the value may be quoted.
    pub fn parse(input: &str) -> Result<Self, ConfigError> {
        static MATCHER_RE: OnceLock<Regex> = OnceLock::new();
        let re = MATCHER_RE.get_or_init(|| {
            Regex::new(r#"^\s*([a-zA-Z_][a-zA-Z0-9_]*)\s*(=~|!~|!=|=)\s*(.*?)\s*$"#)
                .expect("matcher regex is valid")
        });

        let invalid = |message: &str| ConfigError::InvalidMatcher {
            matcher: input.to_string(),
            message: message.to_string(),
        };

        let caps = re
            .captures(input)
            .ok_or_else(|| invalid("expected name, operator and value"))?;

        let match_type = match &caps[2] {
            "=" => MatchType::Equal,
            "!=" => MatchType::NotEqual,
            "=~" => MatchType::Regexp,
            _ => MatchType::NotRegexp,
        };

        let raw = &caps[3];
        let value = if raw.len() >= 2 && raw.starts_with('"') && raw.ends_with('"') {
            &raw[1..raw.len() - 1]
        } else {
            raw
        };

        if matches!(match_type, MatchType::Regexp | MatchType::NotRegexp) {
            Regex::new(&format!("^(?:{})$", value)).map_err(|e| invalid(&e.to_string()))?;
        }

        Ok(Self {
            name: caps[1].to_string(),
            match_type,
            value: value.to_string(),
        })
    }
}

/// Parses a Prometheus-style duration such as `30s`, `5m` or `1h30m`.
pub fn parse_duration(input: &str) -> Option<Duration> {
    static FULL_RE: OnceLock<Regex> = OnceLock::new();
    static PART_RE: OnceLock<Regex> = OnceLock::new();
    let full = FULL_RE.get_or_init(|| {
        Regex::new(r"^(\d+(ms|s|m|h|d|w|y))+$").expect("duration regex is valid")
    });
    let part = PART_RE
        .get_or_init(|| Regex::new(r"(\d+)(ms|s|m|h|d|w|y)").expect("duration regex is valid"));

    if !full.is_match(input) {
        return None;
    }

    let mut total = Duration::ZERO;
    for caps in part.captures_iter(input) {
        let amount: u64 = caps[1].parse().ok()?;
        let unit_ms: u64 = match &caps[2] {
            "ms" => 1,
            "s" => 1_000,
            "m" => 60_000,
            "h" => 3_600_000,
            "d" => 86_400_000,
            "w" => 604_800_000,
            _ => 31_536_000_000,
        };
        total += Duration::from_millis(amount.checked_mul(unit_ms)?);
    }
    Some(total)
}

impl Default for AlertmanagerConfiguration {
    fn default() -> Self {
        Self::new(Receiver::new(DEFAULT_RECEIVER))
    }
}

impl AlertmanagerConfiguration {
    /// Creates a configuration routing everything to a single receiver.
    pub fn new(default_receiver: Receiver) -> Self {
        Self {
            route: Route {
                receiver: Some(default_receiver.name.clone()),
                group_by: vec!["alertname".to_string()],
                ..Default::default()
            },
            receivers: vec![default_receiver],
            templates: Vec::new(),
        }
    }

    /// Parses a configuration from YAML (a superset of JSON).
    pub fn from_yaml(input: &str) -> Result<Self, ConfigError> {
        serde_yaml::from_str(input).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Parses a configuration from JSON.
    pub fn from_json(input: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(input).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Serializes the configuration to JSON.
    pub fn to_json(&self) -> Result<String, ConfigError> {
        serde_json::to_string(self).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Looks up a receiver by name.
    pub fn receiver(&self, name: &str) -> Option<&Receiver> {
        self.receivers.iter().find(|r| r.name == name)
    }

    /// Returns the SHA-256 of the canonical JSON form, hex encoded.
    pub fn hash(&self) -> Result<String, ConfigError> {
        let canonical = serde_json::to_vec(self).map_err(|e| ConfigError::Parse(e.to_string()))?;
        Ok(hex::encode(Sha256::digest(&canonical)))
    }

    /// Gives every config that has no uid one.
    ///
    /// A config inherits the uid of the config with the same receiver and
    /// config name in `previous`, so re-applying a document without uids
    /// yields the same uids. Anything else gets a fresh UUID.
    pub fn assign_missing_uids(&mut self, previous: Option<&AlertmanagerConfiguration>) {
        for receiver in &mut self.receivers {
            let prior = previous.and_then(|p| p.receiver(&receiver.name));
            let mut taken: HashSet<String> = receiver
                .configs
                .iter()
                .filter(|c| !c.uid.is_empty())
                .map(|c| c.uid.clone())
                .collect();

            for config in receiver.configs.iter_mut().filter(|c| c.uid.is_empty()) {
                let uid = prior
                    .and_then(|r| r.configs.iter().find(|c| c.name == config.name))
                    .map(|c| c.uid.clone())
                    .filter(|uid| !uid.is_empty() && !taken.contains(uid))
                    .unwrap_or_else(|| Uuid::new_v4().to_string());
                taken.insert(uid.clone());
                config.uid = uid;
            }
        }
    }

    /// Returns a copy with every secure setting redacted.
    pub fn redacted(&self) -> Self {
        Self {
            route: self.route.clone(),
            receivers: self.receivers.iter().map(Receiver::redacted).collect(),
            templates: self.templates.clone(),
        }
    }

    /// Validates the configuration as a whole.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut names = HashSet::new();
        for receiver in &self.receivers {
            if receiver.name.is_empty() {
                return Err(ConfigError::EmptyReceiverName);
            }
            if !names.insert(receiver.name.as_str()) {
                return Err(ConfigError::DuplicateReceiver(receiver.name.clone()));
            }
            validate_receiver_configs(receiver)?;
        }

        if self.route.receiver.as_deref().unwrap_or_default().is_empty() {
            return Err(ConfigError::MissingRootReceiver);
        }
        validate_route(&self.route, &names)
    }
}

/// Validates the configs of a single receiver.
pub fn validate_receiver_configs(receiver: &Receiver) -> Result<(), ConfigError> {
    let mut uids = HashSet::new();
    for config in &receiver.configs {
        if config.name.is_empty() {
            return Err(ConfigError::EmptyConfigName {
                receiver: receiver.name.clone(),
            });
        }
        if config.integration_type.is_empty() {
            return Err(ConfigError::EmptyIntegrationType {
                receiver: receiver.name.clone(),
            });
        }
        if config.uid.is_empty() {
            return Err(ConfigError::EmptyUid {
                receiver: receiver.name.clone(),
                config: config.name.clone(),
            });
        }
        if !uids.insert(config.uid.as_str()) {
            return Err(ConfigError::DuplicateUid {
                receiver: receiver.name.clone(),
                uid: config.uid.clone(),
            });
        }
    }
    Ok(())
}

fn validate_route(route: &Route, receivers: &HashSet<&str>) -> Result<(), ConfigError> {
    if let Some(name) = route.receiver.as_deref() {
        if !receivers.contains(name) {
            return Err(ConfigError::UnknownReceiver(name.to_string()));
        }
    }

    for matcher in &route.matchers {
        Matcher::parse(matcher)?;
    }

    for (field, value) in [
        ("group_wait", &route.group_wait),
        ("group_interval", &route.group_interval),
        ("repeat_interval", &route.repeat_interval),
    ] {
        if let Some(value) = value {
            if parse_duration(value).is_none() {
                return Err(ConfigError::InvalidDuration {
                    field,
                    value: value.clone(),
                });
            }
        }
    }

    route
        .routes
        .iter()
        .try_for_each(|child| validate_route(child, receivers))
}

/// Loads, env-substitutes, parses and validates a configuration file.
///
/// `${VAR}` references are replaced with the value of the environment variable.
pub fn load_configuration(path: &Path) -> Result<AlertmanagerConfiguration, ConfigError> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| ConfigError::Io(format!("{}: {}", path.display(), e)))?;
    let content = substitute_env_vars(&content)?;

    let mut config = AlertmanagerConfiguration::from_yaml(&content)?;
    config.assign_missing_uids(None);
    config.validate()?;
    Ok(config)
}

fn substitute_env_vars(input: &str) -> Result<String, ConfigError> {
    static ENV_RE: OnceLock<Regex> = OnceLock::new();
    let re = ENV_RE.get_or_init(|| {
        Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("env var regex is valid")
    });

    let mut missing = Vec::new();
    let result = re.replace_all(input, |caps: &regex::Captures<'_>| {
        env::var(&caps[1]).unwrap_or_else(|_| {
            missing.push(caps[1].to_string());
            String::new()
        })
    });

    if !missing.is_empty() {
        return Err(ConfigError::EnvVarNotFound(missing.join(", ")));
    }
    Ok(result.into_owned())
}
