//! Binary entry point for shopify-connector.
//!
//! This binary provides the CLI interface for the Shopify webhook connector.

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(missing_docs)]
// Allow print_stderr in main binary for CLI output
#![allow(clippy::print_stderr)]
// Allow needless_pass_by_value for command functions
#![allow(clippy::needless_pass_by_value)]
// Allow multiple crate versions from transitive dependencies
#![allow(clippy::multiple_crate_versions)]

use clap::{Parser, Subcommand};
use shopify_connector::cli::{self, OutputFormat};
use shopify_connector::config::ConnectorConfig;
use shopify_connector::host::{EventHandler, LocalHost, LoggingHandler};
use shopify_connector::observability::{self, InitOptions, ObservabilityHandle};
use shopify_connector::{ShopifyClient, ShopifyConnector, Topic};
use std::process::ExitCode;
use std::sync::Arc;

/// Shopify connector - keeps webhook subscriptions in sync and routes deliveries.
#[derive(Parser)]
#[command(name = "shopify-connector")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to configuration file.
    #[arg(short, long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands.
#[derive(Subcommand)]
enum Commands {
    /// Reconcile configured topics, then receive deliveries over HTTP.
    Serve {
        /// Port to listen on.
        #[arg(short, long, env = "SHOPIFY_CONNECTOR_PORT", default_value_t = cli::DEFAULT_PORT)]
        port: u16,
    },

    /// Create missing webhook subscriptions.
    Reconcile {
        /// Extra topic to reconcile (repeatable).
        #[arg(short, long = "topic")]
        topics: Vec<String>,

        /// Fail if any subscription could not be created.
        #[arg(long)]
        strict: bool,

        /// Output format: table, json, or yaml.
        #[arg(short, long, default_value = "table")]
        format: String,
    },

    /// List webhook subscriptions registered with the shop.
    List {
        /// Output format: table, json, or yaml.
        #[arg(short, long, default_value = "table")]
        format: String,
    },

    /// Manage configuration.
    Config {
        /// Show current configuration.
        #[arg(short, long)]
        show: bool,
    },
}

/// Main entry point.
///
/// Synchronous: the Admin API client is blocking, and `serve` runs its own
/// runtime.
fn main() -> ExitCode {
    // A missing .env file is not an error.
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    let config = match load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            return ExitCode::FAILURE;
        },
    };

    let expose_metrics = matches!(cli.command, Commands::Serve { .. });
    let observability = match observability::init_from_config(
        &config.observability,
        InitOptions {
            verbose: cli.verbose,
            metrics_expose: expose_metrics,
        },
    ) {
        Ok(handle) => handle,
        Err(e) => {
            eprintln!("Failed to initialize observability: {e}");
            return ExitCode::FAILURE;
        },
    };

    match run_command(cli, config, &observability) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        },
    }
}

/// Runs the selected command.
fn run_command(
    cli: Cli,
    config: ConnectorConfig,
    observability: &ObservabilityHandle,
) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Serve { port } => cli::cmd_serve(config, port, observability.prometheus())?,

        Commands::Reconcile {
            topics,
            strict,
            format,
        } => cmd_reconcile(config, topics, strict, &format)?,

        Commands::List { format } => {
            let client = ShopifyClient::from_config(&config.shop)?;
            cli::cmd_list(&client, OutputFormat::parse(&format))?;
        },

        Commands::Config { show } => {
            if show {
                cli::cmd_config_show(&config)?;
            } else {
                eprintln!("Use --show to print the effective configuration");
            }
        },
    }
    Ok(())
}

/// Reconciles configured plus command-line topics.
fn cmd_reconcile(
    config: ConnectorConfig,
    topics: Vec<String>,
    strict: bool,
    format: &str,
) -> shopify_connector::Result<()> {
    let extra = topics
        .into_iter()
        .map(Topic::new)
        .collect::<shopify_connector::Result<Vec<_>>>()?;

    let mut connector = ShopifyConnector::from_config(config, Arc::new(LocalHost::new()))?;
    let handler: Arc<dyn EventHandler> = Arc::new(LoggingHandler);
    connector.declare_configured(&handler)?;

    cli::cmd_reconcile(&connector, &extra, strict, OutputFormat::parse(format))
}

/// Loads configuration.
fn load_config(path: Option<&str>) -> shopify_connector::Result<ConnectorConfig> {
    match path {
        Some(config_path) => ConnectorConfig::load_from_file(std::path::Path::new(config_path)),
        None => ConnectorConfig::load_default(),
    }
}
