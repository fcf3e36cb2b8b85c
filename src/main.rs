//! Humio Log Streamer Binary

use clap::Parser;
use humio_streamer::{Cli, Command, Config, Result, Shipper, run_query};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    initialize_tracing();

    let cli = Cli::parse();

    if let Some(Command::Query(args)) = cli.command {
        if let Err(e) = run_query(&args).await {
            error!("Query failed: {}", e);
            std::process::exit(1);
        }
        return Ok(());
    }

    info!("Starting Humio log streamer v{}", env!("CARGO_PKG_VERSION"));

    let config = Config::from(cli.stream);

    let shipper = match Shipper::new(config) {
        Ok(shipper) => shipper,
        Err(e) => {
            error!("Failed to start: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = shipper.start().await {
        error!("Streaming failed: {}", e);
        std::process::exit(1);
    }

    Ok(())
}

/// Initialize structured logging on stderr; stdout is left to the input pipe
fn initialize_tracing() {
    let log_level = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_file(false)
        .with_line_number(false)
        .with_writer(std::io::stderr)
        .json();

    let filter_layer = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(&log_level))
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter_layer)
        .with(fmt_layer)
        .init();
}
