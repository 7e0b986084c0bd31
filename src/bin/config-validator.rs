//! # Delivery Configuration Validator
//!
//! Loads the layered configuration for an environment, validates it and prints a
//! summary. Run it before deploying a new `delivery.toml` or environment override.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use delivery_orchestrator::config::{ConfigManager, DeliveryConfig};
use delivery_orchestrator::logging::init_structured_logging;
use std::path::PathBuf;
use std::process;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "config-validator")]
#[command(about = "Validate delivery orchestrator configuration")]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct Cli {
    /// Environment to validate (defaults to DELIVERY_ENV / APP_ENV / development)
    #[arg(short, long)]
    environment: Option<String>,

    /// Configuration directory (defaults to DELIVERY_CONFIG_DIR or ./config)
    #[arg(short, long)]
    config_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Validate the whole configuration
    All,

    /// Validate and summarize one section
    Section {
        /// service, orchestration, notifications, event_bus, logging or roster
        name: String,
    },

    /// Print the merged configuration as JSON
    Show,
}

fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(&cli) {
        error!("Configuration validation failed: {e:#}");
        eprintln!("configuration invalid: {e:#}");
        process::exit(1);
    }
}

fn run(cli: &Cli) -> Result<()> {
    let environment = cli
        .environment
        .clone()
        .unwrap_or_else(ConfigManager::detect_environment);
    let manager = ConfigManager::load_from_directory_with_env(cli.config_dir.clone(), &environment)
        .with_context(|| format!("loading configuration for '{environment}'"))?;
    let config = manager.config();

    init_structured_logging(&config.logging);
    info!(
        environment = %manager.environment(),
        config_dir = %manager.config_directory().display(),
        "configuration loaded"
    );

    match &cli.command {
        None | Some(Commands::All) => {
            println!("Environment: {}", manager.environment());
            println!("Config directory: {}", manager.config_directory().display());
            for section in SECTIONS {
                print_section(config, section)?;
            }
            println!("All configuration checks passed");
        }
        Some(Commands::Section { name }) => print_section(config, name)?,
        Some(Commands::Show) => {
            let rendered = serde_json::to_string_pretty(&manager.debug_config())
                .context("rendering configuration")?;
            println!("{rendered}");
        }
    }
    Ok(())
}

const SECTIONS: [&str; 6] = [
    "service",
    "orchestration",
    "notifications",
    "event_bus",
    "logging",
    "roster",
];

fn print_section(config: &DeliveryConfig, name: &str) -> Result<()> {
    match name.to_lowercase().replace('-', "_").as_str() {
        "service" => println!(
            "service: name={} source={} bus={}",
            config.service.name, config.service.event_source, config.service.event_bus_name
        ),
        "orchestration" => println!(
            "orchestration: max_conflict_retries={} signal_timeout_ms={}",
            config.orchestration.max_conflict_retries, config.orchestration.signal_timeout_ms
        ),
        "notifications" => println!(
            "notifications: send_timeout_ms={} message_type={}",
            config.notifications.send_timeout_ms, config.notifications.message_type
        ),
        "event_bus" => println!("event_bus: buffer_size={}", config.event_bus.buffer_size),
        "logging" => println!(
            "logging: level={} json={}",
            config.logging.level, config.logging.json
        ),
        "roster" => println!(
            "roster: cooks={} dispatchers={} couriers={}",
            config.roster.cooks.len(),
            config.roster.dispatchers.len(),
            config.roster.couriers.len()
        ),
        other => bail!("unknown section: {other}"),
    }
    Ok(())
}
