//! Validate command - checks an Alertmanager configuration file.

use anyhow::Result;
use ar_core::{load_configuration, AlertmanagerConfiguration, IntegrationRegistry};
use colored::Colorize;
use std::path::Path;

/// Problems found beyond structural validation.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct ValidationReport {
    /// `receiver/config: message` for each config the registry rejects.
    pub errors: Vec<String>,
    /// Configs whose integration type is not registered.
    pub warnings: Vec<String>,
}

impl ValidationReport {
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn print(&self) {
        for warning in &self.warnings {
            println!("  {} {}", "⚠".yellow(), warning);
        }
        for error in &self.errors {
            println!("  {} {}", "✗".red(), error);
        }
    }
}

/// Runs every integration's own validation over the configuration.
pub fn check_integrations(
    config: &AlertmanagerConfiguration,
    registry: &IntegrationRegistry,
) -> ValidationReport {
    let mut report = ValidationReport::default();
    for receiver in &config.receivers {
        for rc in &receiver.configs {
            let location = format!("{}/{}", receiver.name, rc.name);
            match registry.get(&rc.integration_type) {
                Some(integration) => {
                    if let Err(e) = integration.validate(rc) {
                        report.errors.push(format!("{}: {}", location, e));
                    }
                }
                None => report.warnings.push(format!(
                    "{}: unknown integration type '{}'",
                    location, rc.integration_type
                )),
            }
        }
    }
    report
}

/// Validates the file at `path`. Returns whether it is usable.
pub fn validate_alertmanager_config(path: &Path, registry: &IntegrationRegistry) -> Result<bool> {
    println!(
        "Validating Alertmanager configuration: {}",
        path.display().to_string().cyan()
    );

    let config = match load_configuration(path) {
        Ok(config) => config,
        Err(e) => {
            println!("{}: {}", "Configuration error".red().bold(), e);
            return Ok(false);
        }
    };

    let report = check_integrations(&config, registry);
    report.print();

    let configs: usize = config.receivers.iter().map(|r| r.configs.len()).sum();
    println!();
    println!("{}", "Configuration Summary".bold());
    println!("─────────────────────");
    println!("  Receivers: {}", config.receivers.len());
    println!("  Integrations: {}", configs);
    println!("  Hash: {}", config.hash()?);

    println!();
    if report.has_errors() {
        println!(
            "{}",
            "Configuration validation failed. Fix the errors above."
                .red()
                .bold()
        );
        Ok(false)
    } else {
        println!("{}", "Configuration is valid.".green().bold());
        Ok(true)
    }
}
