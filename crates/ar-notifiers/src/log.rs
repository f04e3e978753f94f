//! Integration that only writes the notification to the log.

use ar_core::{Integration, NotifyError, ReceiverConfig, TestNotification};
use async_trait::async_trait;
use tokio::time::Instant;
use tracing::info;

pub const LOG_TYPE: &str = "log";

/// Logs test notifications instead of delivering them. Always succeeds.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogIntegration;

#[async_trait]
impl Integration for LogIntegration {
    fn integration_type(&self) -> &str {
        LOG_TYPE
    }

    fn validate(&self, _config: &ReceiverConfig) -> Result<(), NotifyError> {
        Ok(())
    }

    async fn send(
        &self,
        config: &ReceiverConfig,
        notification: &TestNotification,
        _deadline: Instant,
    ) -> Result<(), NotifyError> {
        info!(
            receiver = %notification.receiver,
            config = %config.name,
            uid = %config.uid,
            title = %notification.title,
            "Test notification"
        );
        Ok(())
    }
}
