//! Receiver test error taxonomy and aggregate status.

use crate::integration::NotifyError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Classified outcome of a failed config test.
///
/// Variants are ordered by precedence when computing the aggregate status:
/// invalid configuration beats timeout, which beats any other failure.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "message", rename_all = "snake_case")]
pub enum ReceiverTestError {
    #[error("invalid receiver configuration: {0}")]
    InvalidConfiguration(String),

    #[error("timed out: {0}")]
    Timeout(String),

    #[error("delivery failed: {0}")]
    DeliveryFailure(String),

    #[error("unknown error: {0}")]
    Unknown(String),
}

impl ReceiverTestError {
    pub fn message(&self) -> &str {
        match self {
            ReceiverTestError::InvalidConfiguration(m)
            | ReceiverTestError::Timeout(m)
            | ReceiverTestError::DeliveryFailure(m)
            | ReceiverTestError::Unknown(m) => m,
        }
    }

    /// Short label used in metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            ReceiverTestError::InvalidConfiguration(_) => "invalid_configuration",
            ReceiverTestError::Timeout(_) => "timeout",
            ReceiverTestError::DeliveryFailure(_) => "delivery_failure",
            ReceiverTestError::Unknown(_) => "unknown",
        }
    }
}

impl From<NotifyError> for ReceiverTestError {
    fn from(err: NotifyError) -> Self {
        match err {
            NotifyError::InvalidConfig(m) => ReceiverTestError::InvalidConfiguration(m),
            NotifyError::Timeout(m) => ReceiverTestError::Timeout(m),
            NotifyError::Rejected { .. } | NotifyError::SendFailed(_) => {
                ReceiverTestError::DeliveryFailure(err.to_string())
            }
            NotifyError::Other(m) => ReceiverTestError::Unknown(m),
        }
    }
}

/// Overall status of a receiver test run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregateStatus {
    Ok,
    Failed,
    Timeout,
    InvalidConfiguration,
}

impl AggregateStatus {
    /// Folds a sequence of config errors into one status. Order does not matter.
    pub fn aggregate<'a, I>(errors: I) -> Self
    where
        I: IntoIterator<Item = &'a ReceiverTestError>,
    {
        errors
            .into_iter()
            .map(Self::from)
            .max()
            .unwrap_or(AggregateStatus::Ok)
    }

    /// HTTP status code for the aggregate.
    pub fn status_code(&self) -> u16 {
        match self {
            AggregateStatus::Ok => 200,
            AggregateStatus::Failed => 500,
            AggregateStatus::Timeout => 408,
            AggregateStatus::InvalidConfiguration => 400,
        }
    }
}

impl From<&ReceiverTestError> for AggregateStatus {
    fn from(err: &ReceiverTestError) -> Self {
        match err {
            ReceiverTestError::InvalidConfiguration(_) => AggregateStatus::InvalidConfiguration,
            ReceiverTestError::Timeout(_) => AggregateStatus::Timeout,
            ReceiverTestError::DeliveryFailure(_) | ReceiverTestError::Unknown(_) => {
                AggregateStatus::Failed
            }
        }
    }
}

/// Request-level failure: the test run could not be carried out at all.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OrchestrationError {
    #[error("no async runtime available: {0}")]
    NoRuntime(String),
}
