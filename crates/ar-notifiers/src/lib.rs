//! # ar-notifiers
//!
//! Notification integrations for Alert Relay.

pub mod dingding;
pub mod http;
pub mod log;
pub mod slack;
pub mod webhook;
pub mod wechat;

pub use dingding::DingDingIntegration;
pub use http::HttpSender;
pub use log::LogIntegration;
pub use slack::SlackIntegration;
pub use webhook::WebhookIntegration;
pub use wechat::WeChatIntegration;

use ar_core::IntegrationRegistry;

/// Registry with every built-in integration, sharing one HTTP client.
pub fn default_registry() -> IntegrationRegistry {
    registry_with_sender(HttpSender::new())
}

/// Registry with every built-in integration, sending through `sender`.
pub fn registry_with_sender(sender: HttpSender) -> IntegrationRegistry {
    IntegrationRegistry::new()
        .with(WebhookIntegration::with_sender(sender.clone()))
        .with(SlackIntegration::with_sender(sender.clone()))
        .with(DingDingIntegration::with_sender(sender.clone()))
        .with(WeChatIntegration::with_sender(sender))
        .with(LogIntegration)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_registry_types() {
        let registry = default_registry();
        assert_eq!(registry.types(), vec!["dingding", "log", "slack", "webhook", "wechat"]);
    }
}
