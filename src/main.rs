//! HTTP sensor bridge - command line entry point
//!
//! Loads an accessory configuration and either reads a single field,
//! watches every field on an interval, or validates the configuration.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use http_sensor_bridge::{
    accessory::Accessory,
    cache::BodyCache,
    host::{register_accessory, ConsoleHost},
    logging::{init_logging, LogConfig},
    services::SensorField,
    AccessoryConfig,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, Level};

/// Command line arguments
#[derive(Parser, Debug)]
#[command(name = "http-sensor")]
#[command(about = "Poll a JSON HTTP endpoint and expose sensor readings")]
#[command(version)]
struct Cli {
    /// Accessory configuration file (.json or .toml)
    #[arg(short, long, env = "HTTP_SENSOR_CONFIG")]
    config: PathBuf,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Fetch once and print one field
    Read {
        /// temperature, humidity, battery or batteryLow
        field: String,
    },
    /// Poll every configured field until Ctrl+C
    Watch {
        /// Seconds between polls
        #[arg(short, long, default_value = "10")]
        interval: u64,
    },
    /// Validate the configuration and list enabled fields
    Check,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let mut log_config = LogConfig::from_env();
    if cli.debug {
        log_config = log_config.with_level(Level::DEBUG);
    }
    if let Err(e) = init_logging(log_config) {
        eprintln!("Failed to initialize logging: {}", e);
        std::process::exit(1);
    }

    if let Err(e) = run(cli).await {
        error!("{:#}", e);
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let mut config = AccessoryConfig::from_file(&cli.config)
        .with_context(|| format!("Loading {}", cli.config.display()))?;
    config.apply_env_overrides()?;
    debug!("Effective configuration: {:?}", config);

    let accessory = Accessory::from_config(config, Arc::new(BodyCache::new()))
        .context("Invalid accessory configuration")?;

    match cli.command {
        Commands::Read { field } => {
            let field: SensorField = field.parse()?;
            let value = accessory.state().get_value(field).await?;
            println!("{}", value);
        }
        Commands::Watch { interval } => {
            anyhow::ensure!(interval > 0, "Interval must be greater than zero");
            let mut host = ConsoleHost::new();
            register_accessory(&mut host, &accessory)?;
            host.run(Duration::from_secs(interval)).await?;
        }
        Commands::Check => {
            let information = accessory.information();
            let endpoint = accessory.state().fetcher().endpoint();
            println!(
                "{} ({} {}) polls {} {}",
                information.name,
                information.manufacturer,
                information.model,
                endpoint.method,
                endpoint.url
            );
            for field in accessory.state().available_fields() {
                println!("  {}", field);
            }
        }
    }

    Ok(())
}
