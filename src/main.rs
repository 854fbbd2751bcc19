use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tracker_relay::config::RelayConfig;
use tracker_relay::listener;

/// Transparent relay between a tracking device and its downstream consumers.
#[derive(Debug, Parser)]
#[command(name = "tracker-relay", version)]
struct Args {
    /// Port to listen on for the tracking device
    port: u16,

    /// Path to the TOML configuration file
    config: PathBuf,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let config = RelayConfig::load(&args.config)?;

    let default_filter = if config.debug {
        "tracker_relay=debug"
    } else {
        "tracker_relay=info"
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!(
        port = args.port,
        endpoints = config.endpoints.len(),
        read_timeout_ms = config.read_timeout_ms,
        accept_timeout_ms = config.accept_timeout_ms,
        "configuration loaded"
    );

    listener::run(config, args.port).await?;
    Ok(())
}
