//! Mockice - CLI Entry Point

use anyhow::{Context, Result};
use clap::Parser;
use mockice::config::normalize_address;
use mockice::{logging, signal, Endpoint, MockiceConfig, Service};
use std::path::PathBuf;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(
    name = "mockice",
    about = "Configurable HTTP mock server - named endpoints with static or file-backed responses",
    version
)]
struct Args {
    /// The path to the configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Print the effective configuration and exit
    #[arg(long)]
    print_config: bool,

    /// Validate configuration and exit
    #[arg(long)]
    validate: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    logging::init(args.verbose)?;

    let shutdown = signal::install().context("while installing signal handlers")?;

    let config = MockiceConfig::load(args.config.as_deref())?;

    if args.print_config {
        print!("{}", serde_yaml::to_string(&config)?);
        return Ok(());
    }

    if args.validate {
        println!(
            "Configuration is valid ({} endpoints defined)",
            config.endpoints.len()
        );
        return Ok(());
    }

    let mut service = Service::new(config.address.clone()).with_grace_period(config.grace_period());
    for endpoint_config in config.endpoints {
        let endpoint = Endpoint::new(endpoint_config);
        info!("Registering /{} endpoint", endpoint.name());
        service.register(endpoint)?;
    }

    info!(address = %normalize_address(&config.address), "Service listen");
    if let Err(err) = service.start(shutdown).await {
        error!(error = %err, "Service failed");
        return Err(err.into());
    }

    Ok(())
}
