//! Request and response bodies.

use ar_core::{ConfigRevision, Receiver, ReloadOutcome, TestAlert, TestReceiversRequest};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use validator::Validate;

use crate::error::ApiError;

/// Body of `POST /api/alertmanager/receivers/test`.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct TestReceiversBody {
    /// Labels and annotations merged over the default test alert.
    #[serde(default)]
    pub alert: Option<TestAlert>,
    /// Receivers to test. Empty means every receiver of the active configuration.
    #[serde(default)]
    #[validate(length(max = 100, message = "At most 100 receivers can be tested at once"))]
    pub receivers: Vec<Receiver>,
}

impl TestReceiversBody {
    /// Validates the body and converts it into an orchestrator request.
    pub fn into_request(self) -> Result<TestReceiversRequest, ApiError> {
        self.validate()?;

        let mut names = HashSet::new();
        for receiver in &self.receivers {
            if receiver.name.trim().is_empty() {
                return Err(ApiError::validation_field(
                    "receivers",
                    "required",
                    "Receiver name must not be empty",
                ));
            }
            if !names.insert(receiver.name.as_str()) {
                return Err(ApiError::validation_field(
                    "receivers",
                    "duplicate",
                    &format!("Duplicate receiver name '{}'", receiver.name),
                ));
            }
        }

        Ok(TestReceiversRequest {
            alert: self.alert,
            receivers: self.receivers,
        })
    }
}

/// Response of `POST /api/alertmanager/config`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReloadResponse {
    pub message: String,
    pub revision: u64,
    pub config_hash: String,
    pub loaded_at: DateTime<Utc>,
    /// False when the posted configuration matched the active one.
    pub changed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

impl From<ReloadOutcome> for ReloadResponse {
    fn from(outcome: ReloadOutcome) -> Self {
        let ConfigRevision {
            version,
            hash,
            loaded_at,
        } = outcome.revision;
        let message = if outcome.changed {
            "configuration applied"
        } else {
            "configuration unchanged"
        };
        Self {
            message: message.to_string(),
            revision: version,
            config_hash: hash,
            loaded_at,
            changed: outcome.changed,
            warning: outcome.persist_warning,
        }
    }
}

/// Response of `GET /health`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
    /// Revision of the active configuration.
    pub config_revision: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicate_receiver_names_rejected() {
        let body = TestReceiversBody {
            alert: None,
            receivers: vec![Receiver::new("ops"), Receiver::new("ops")],
        };
        let err = body.into_request().unwrap_err();
        assert_eq!(err.error_code(), "VALIDATION_ERROR");
    }

    #[test]
    fn test_too_many_receivers_rejected() {
        let body = TestReceiversBody {
            alert: None,
            receivers: (0..101).map(|i| Receiver::new(format!("r{}", i))).collect(),
        };
        assert!(matches!(
            body.into_request(),
            Err(ApiError::ValidationError(_))
        ));
    }

    #[test]
    fn test_valid_body_converts() {
        let body: TestReceiversBody = serde_json::from_value(serde_json::json!({
            "receivers": [{
                "name": "ops",
                "configs": [{"uid": "u1", "name": "hook", "type": "webhook", "settings": {}}]
            }]
        }))
        .unwrap();

        let request = body.into_request().unwrap();
        assert_eq!(request.receivers[0].configs[0].uid, "u1");
        assert!(request.alert.is_none());

        let empty = TestReceiversBody::default().into_request().unwrap();
        assert!(empty.receivers.is_empty());
    }
}
