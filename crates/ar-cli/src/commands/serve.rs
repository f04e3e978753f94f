//! Serve command - starts the API server.

use anyhow::{Context, Result};
use colored::Colorize;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use ar_api::{ApiServer, ApiServerConfig, AppState};
use ar_core::{ConfigStore, FileKvStore, NamespacedKvStore, KV_NAMESPACE};
use tracing::warn;

use crate::commands::load_alertmanager_config;
use crate::config::AppConfig;

/// Server configuration from CLI arguments.
#[derive(Debug, Clone, Default)]
pub struct ServeConfig {
    /// Overrides the configured port.
    pub port: Option<u16>,
    /// Overrides the configured host.
    pub host: Option<String>,
    /// Overrides the configured Alertmanager configuration file.
    pub alertmanager_config: Option<PathBuf>,
    /// Overrides the configured state file.
    pub state_file: Option<PathBuf>,
}

/// Settings after applying CLI overrides to the application config.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedServe {
    pub bind_address: SocketAddr,
    pub alertmanager_config: Option<PathBuf>,
    pub state_file: Option<PathBuf>,
    pub org_id: i64,
    pub test_timeout: Duration,
}

impl ServeConfig {
    pub fn resolve(&self, app_config: &AppConfig) -> Result<ResolvedServe> {
        let host = self.host.as_deref().unwrap_or(&app_config.server.host);
        let port = self.port.unwrap_or(app_config.server.port);
        let bind_address: SocketAddr = format!("{}:{}", host, port)
            .parse()
            .context("Invalid bind address")?;

        Ok(ResolvedServe {
            bind_address,
            alertmanager_config: self
                .alertmanager_config
                .clone()
                .or_else(|| app_config.alertmanager.config_path.clone()),
            state_file: self
                .state_file
                .clone()
                .or_else(|| app_config.alertmanager.state_file.clone()),
            org_id: app_config.alertmanager.org_id,
            test_timeout: app_config.receivers_test.timeout(),
        })
    }
}

/// Runs the API server.
pub async fn run_server(config: ServeConfig, app_config: AppConfig) -> Result<()> {
    println!("{} Starting Alert Relay API Server...", "[server]".cyan());

    let resolved = config.resolve(&app_config)?;

    let prometheus = match ar_observability::install_prometheus_recorder() {
        Ok(handle) => Some(handle),
        Err(e) => {
            warn!(error = %e, "Prometheus recorder unavailable, /metrics disabled");
            None
        }
    };

    let initial = load_alertmanager_config(resolved.alertmanager_config.as_deref())?;
    match &resolved.alertmanager_config {
        Some(path) => println!("  {} Configuration: {}", "→".green(), path.display()),
        None => println!("  {} Configuration: built-in default", "→".green()),
    }

    let mut store = ConfigStore::new(initial).context("Initial configuration is invalid")?;
    if let Some(path) = &resolved.state_file {
        println!("  {} State file: {}", "→".green(), path.display());
        let backend = Arc::new(FileKvStore::new(path.clone()));
        store = store.with_kv(NamespacedKvStore::new(backend, resolved.org_id, KV_NAMESPACE));
    }

    match store.restore().await {
        Ok(Some(outcome)) => println!(
            "  {} Restored persisted configuration (revision {})",
            "✓".green(),
            outcome.revision.version
        ),
        Ok(None) => {}
        Err(e) => {
            warn!(error = %e, "Ignoring persisted configuration");
            println!("  {} Persisted configuration ignored: {}", "!".yellow(), e);
        }
    }

    let registry = Arc::new(ar_notifiers::default_registry());
    let mut state = AppState::new(Arc::new(store), registry.clone(), resolved.test_timeout);
    if let Some(handle) = prometheus {
        state = state.with_prometheus_handle(handle);
    }

    println!();
    println!("{}", "Alert Relay API Server".bold());
    println!("{}", "═".repeat(40));
    println!("  {} http://{}", "Address:".cyan(), resolved.bind_address);
    println!("  {} {}", "Integrations:".cyan(), registry.types().join(", "));
    println!(
        "  {} {}s",
        "Test timeout:".cyan(),
        resolved.test_timeout.as_secs()
    );
    println!();
    println!("{}", "Endpoints:".bold());
    println!("  GET  /health                           - Health check");
    println!("  GET  /metrics                          - Prometheus metrics");
    println!("  POST /api/alertmanager/receivers/test  - Test receivers");
    println!("  GET  /api/alertmanager/status          - Active configuration status");
    println!("  GET  /api/alertmanager/config          - Active configuration");
    println!("  POST /api/alertmanager/config          - Reload configuration");
    println!("  GET  /api/alertmanager/health          - Health check");
    println!();
    println!("Press {} to stop", "Ctrl+C".yellow());
    println!();

    let server = ApiServer::new(
        state,
        ApiServerConfig {
            bind_address: resolved.bind_address,
        },
    );
    server.run().await.context("Server error")?;

    println!();
    println!("{} Server stopped", "[server]".cyan());

    Ok(())
}
