//! Alert Relay CLI
//!
//! Serves the Alertmanager receiver testing API, and validates or tests
//! receiver configurations locally.

use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::collections::BTreeMap;
use std::path::PathBuf;

mod commands;
mod config;

use commands::{
    load_alertmanager_config, run_receiver_test, run_server, test_receivers::print_result,
    validate_alertmanager_config, ServeConfig, TestReceiversOptions,
};
use ar_observability::{LogFormat, LoggingConfig};
use config::AppConfig;

#[derive(Parser)]
#[command(name = "alert-relay")]
#[command(version)]
#[command(about = "Tests Alertmanager receivers by sending a synthetic alert", long_about = None)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Output format (text, json)
    #[arg(long, default_value = "text")]
    format: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum OutputFormat {
    Text,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            _ => Err(format!("Invalid output format: {}", s)),
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Start the API server
    Serve {
        /// Port to listen on
        #[arg(short, long)]
        port: Option<u16>,

        /// Host to bind to
        #[arg(long)]
        host: Option<String>,

        /// Alertmanager configuration file
        #[arg(long, value_name = "FILE")]
        alertmanager_config: Option<PathBuf>,

        /// File used to persist reloaded configurations
        #[arg(long, value_name = "FILE")]
        state_file: Option<PathBuf>,
    },

    /// Validate an Alertmanager configuration file
    Validate {
        /// Alertmanager configuration file (defaults to the configured one)
        file: Option<PathBuf>,
    },

    /// Send a test alert to receivers from an Alertmanager configuration
    TestReceivers {
        /// Alertmanager configuration file (defaults to the configured one)
        #[arg(long, value_name = "FILE")]
        alertmanager_config: Option<PathBuf>,

        /// Receiver to test; repeat for several. Tests all receivers when omitted.
        #[arg(short, long = "receiver", value_name = "NAME")]
        receivers: Vec<String>,

        /// Alert label override, as key=value
        #[arg(long = "label", value_name = "KEY=VALUE", value_parser = parse_key_val)]
        labels: Vec<(String, String)>,

        /// Alert annotation override, as key=value
        #[arg(long = "annotation", value_name = "KEY=VALUE", value_parser = parse_key_val)]
        annotations: Vec<(String, String)>,

        /// Per-integration timeout in seconds
        #[arg(long)]
        timeout: Option<u64>,
    },

    /// Show the effective application configuration
    Config,
}

fn parse_key_val(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.to_string()))
        }
        _ => Err(format!("expected KEY=VALUE, got '{}'", s)),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config_path = cli.config.clone().unwrap_or_else(default_config_path);
    let config = AppConfig::load(&config_path).unwrap_or_else(|_| {
        if cli.verbose {
            eprintln!("Using default configuration (no config file found)");
        }
        AppConfig::default()
    });

    // Initialize logging
    let mut logging = LoggingConfig::from(&config.logging);
    if cli.verbose {
        logging = logging.verbose();
    }
    if cli.format == OutputFormat::Json {
        logging = logging.with_format(LogFormat::Json);
    }
    ar_observability::init_logging(logging)?;

    match cli.command {
        Commands::Serve {
            port,
            host,
            alertmanager_config,
            state_file,
        } => {
            run_server(
                ServeConfig {
                    port,
                    host,
                    alertmanager_config,
                    state_file,
                },
                config,
            )
            .await
        }
        Commands::Validate { file } => cmd_validate(file, config),
        Commands::TestReceivers {
            alertmanager_config,
            receivers,
            labels,
            annotations,
            timeout,
        } => {
            let path = alertmanager_config.or_else(|| config.alertmanager.config_path.clone());
            let options = TestReceiversOptions {
                receivers,
                labels: labels.into_iter().collect::<BTreeMap<_, _>>(),
                annotations: annotations.into_iter().collect::<BTreeMap<_, _>>(),
                timeout: timeout
                    .map(std::time::Duration::from_secs)
                    .unwrap_or_else(|| config.receivers_test.timeout()),
            };
            cmd_test_receivers(path, options, cli.format).await
        }
        Commands::Config => cmd_config(&config, cli.format),
    }
}

fn default_config_path() -> PathBuf {
    if let Some(dirs) = directories::ProjectDirs::from("io", "alert-relay", "alert-relay") {
        dirs.config_dir().join("config.yaml")
    } else {
        PathBuf::from("config/default.yaml")
    }
}

fn cmd_validate(file: Option<PathBuf>, config: AppConfig) -> Result<()> {
    let Some(path) = file.or(config.alertmanager.config_path) else {
        println!(
            "{}",
            "No Alertmanager configuration file given or configured."
                .red()
                .bold()
        );
        std::process::exit(1);
    };

    let registry = ar_notifiers::default_registry();
    if !validate_alertmanager_config(&path, &registry)? {
        std::process::exit(1);
    }
    Ok(())
}

async fn cmd_test_receivers(
    path: Option<PathBuf>,
    options: TestReceiversOptions,
    format: OutputFormat,
) -> Result<()> {
    let am_config = load_alertmanager_config(path.as_deref())?;
    let registry = ar_notifiers::default_registry();

    let result = run_receiver_test(am_config, registry, options).await?;

    if format == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print_result(&result);
    }

    if result.status_code() != 200 {
        std::process::exit(1);
    }
    Ok(())
}

fn cmd_config(config: &AppConfig, format: OutputFormat) -> Result<()> {
    if format == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(config)?);
    } else {
        println!("{}", serde_yaml::to_string(config)?);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_key_val() {
        assert_eq!(
            parse_key_val("severity=critical").unwrap(),
            ("severity".to_string(), "critical".to_string())
        );
        assert_eq!(
            parse_key_val("summary=a=b").unwrap(),
            ("summary".to_string(), "a=b".to_string())
        );
        assert!(parse_key_val("novalue").is_err());
        assert!(parse_key_val("=x").is_err());
    }

    #[test]
    fn test_cli_parses_test_receivers() {
        let cli = Cli::try_parse_from([
            "alert-relay",
            "test-receivers",
            "-r",
            "ops",
            "--receiver",
            "pager",
            "--label",
            "severity=critical",
            "--timeout",
            "5",
        ])
        .unwrap();

        match cli.command {
            Commands::TestReceivers {
                receivers,
                labels,
                timeout,
                ..
            } => {
                assert_eq!(receivers, vec!["ops", "pager"]);
                assert_eq!(labels, vec![("severity".to_string(), "critical".to_string())]);
                assert_eq!(timeout, Some(5));
            }
            _ => panic!("expected test-receivers"),
        }
    }

    #[test]
    fn test_output_format() {
        assert_eq!("JSON".parse::<OutputFormat>(), Ok(OutputFormat::Json));
        assert!("xml".parse::<OutputFormat>().is_err());
    }
}
