//! offline-agent entry point.
//!
//! Boots the offline cache agent behind an MCP server on stdio transport.
//! Logging goes to stderr to avoid interfering with the JSON-RPC protocol on stdout.

use std::sync::Arc;

use anyhow::{Context, Result};
use offline_client::{Agent, FetchClient, FetchConfig};
use offline_core::{AgentConfig, CacheDb};
use rmcp::service::serve_server;
use rmcp::transport::io::stdio;
use tracing_subscriber::EnvFilter;

mod error;
mod handler;
mod tools;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .json()
        .init();

    let config = AgentConfig::load().context("loading configuration")?;
    tracing::info!(
        version = %config.version,
        origin = %config.origin,
        db_path = %config.db_path.display(),
        "Starting offline-agent on stdio transport"
    );

    let cache = CacheDb::open(&config.db_path)
        .await
        .with_context(|| format!("opening cache storage at {}", config.db_path.display()))?;
    let network = FetchClient::new(FetchConfig::from(&config))?;
    let agent = Agent::new(config, Arc::new(cache.clone()), Arc::new(network))?;

    let handler = handler::OfflineAgentServer::new(Arc::new(agent), cache);
    let transport = stdio();
    let server = serve_server(handler, transport).await?;

    server.waiting().await?;

    Ok(())
}
