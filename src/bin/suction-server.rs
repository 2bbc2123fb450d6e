//! Collector: accepts client streams and decodes telemetry batches.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use suction::cache::{CacheProbe, RedisProbe};
use suction::{Config, DEFAULT_SHUTDOWN_GRACE, LoggingProcessor, ServerCredentials, ServerHandle, logging};

/// Suction telemetry collector
#[derive(Parser, Debug)]
#[command(name = "suction-server")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// YAML configuration file; SUCTION_* environment variables override it
    #[arg(long, short, env = "SUCTION_CONFIG")]
    config: Option<PathBuf>,

    /// Skip the cache liveness check even when a cache URL is configured
    #[arg(long)]
    skip_cache_check: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::init("suction=info");

    let config = Config::load(cli.config.as_deref()).context("loading configuration")?;

    if let Some(url) = config.server.cache_url.as_deref().filter(|_| !cli.skip_cache_check) {
        RedisProbe::new(url)?.ping().await.context("cache liveness check")?;
    }

    let credentials =
        ServerCredentials::from_pem_files(&config.server.cert_path, &config.server.key_path)
            .context("loading server certificate")?;

    let server = ServerHandle::start(&config, &credentials, Arc::new(LoggingProcessor))
        .context("starting server")?;

    suction::shutdown_signal().await;

    server.shutdown(DEFAULT_SHUTDOWN_GRACE).await;
    Ok(())
}
