//! CLI command implementations.

pub mod serve;
pub mod test_receivers;
pub mod validate;

pub use serve::{run_server, ServeConfig};
pub use test_receivers::{run_receiver_test, TestReceiversOptions};
pub use validate::validate_alertmanager_config;

use anyhow::{Context, Result};
use ar_core::{load_configuration, AlertmanagerConfiguration};
use std::path::Path;

/// Loads the Alertmanager configuration at `path`, or the built-in default.
pub fn load_alertmanager_config(path: Option<&Path>) -> Result<AlertmanagerConfiguration> {
    match path {
        Some(path) => load_configuration(path).with_context(|| {
            format!(
                "Failed to load Alertmanager configuration: {}",
                path.display()
            )
        }),
        None => Ok(AlertmanagerConfiguration::default()),
    }
}
