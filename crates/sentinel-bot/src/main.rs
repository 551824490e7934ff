//! price-sentinel entry point.

use anyhow::Result;
use clap::Parser;
use tracing::info;

/// Threshold price alerts over a live market data feed.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Configuration file path (can also be set via SENTINEL_CONFIG env var)
    #[arg(short, long)]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Must run before any TLS connection is made
    sentinel_ws::init_crypto();

    let args = Args::parse();

    sentinel_telemetry::init_logging()?;

    info!("Starting price-sentinel v{}", env!("CARGO_PKG_VERSION"));

    let config = sentinel_bot::AppConfig::load(args.config)?;
    info!(
        feed_url = %config.feed.url,
        store = ?config.store.backend,
        notifier = ?config.notify.backend,
        semantics = ?config.trigger.semantics,
        "Configuration loaded"
    );

    let app = sentinel_bot::Application::new(config)?;
    app.run().await?;

    Ok(())
}
