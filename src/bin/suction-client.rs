//! Edge client: buffers sensor records and ships them to the collector.

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use suction::{ClientCredentials, ClientHandle, Config, DEFAULT_SHUTDOWN_GRACE, logging};

/// Suction telemetry client
#[derive(Parser, Debug)]
#[command(name = "suction-client")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// YAML configuration file; SUCTION_* environment variables override it
    #[arg(long, short, env = "SUCTION_CONFIG")]
    config: Option<PathBuf>,

    /// Do not run the synthetic record producer
    #[arg(long)]
    no_producer: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::init("suction=info");

    let mut config = Config::load(cli.config.as_deref()).context("loading configuration")?;
    if cli.no_producer {
        config.client.synthetic_producer = false;
    }

    let credentials = ClientCredentials::from_pem_file(&config.client.ca_path)
        .with_context(|| format!("loading trust anchors from {}", config.client.ca_path.display()))?;

    let client = ClientHandle::start(&config, &credentials).context("starting client")?;

    suction::shutdown_signal().await;

    let summary = client.shutdown(DEFAULT_SHUTDOWN_GRACE).await;
    tracing::info!(
        attempts = summary.attempts,
        connections = summary.connections,
        "Client shutdown complete"
    );
    Ok(())
}
