//! docshift - Entry point
//!
//! Serves the conversion engine as an MCP server over stdio.

use docshift::{run_server_with_config, EngineConfig};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging (stdout carries the protocol)
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "docshift=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = EngineConfig::from_env()?;
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "Starting docshift");

    run_server_with_config(config).await
}
