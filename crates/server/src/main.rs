//! shelter server entry point.
//!
//! This is the main binary that boots the MCP server on stdio transport.
//! Logging goes to stderr to avoid interfering with the JSON-RPC protocol on stdout.

use std::sync::Arc;

use anyhow::Result;
use rmcp::service::serve_server;
use rmcp::transport::io::stdio;
use shelter_client::{HttpNetwork, NetworkConfig};
use shelter_core::{AppConfig, CacheDb};
use tracing_subscriber::EnvFilter;

mod handler;
mod host;
mod tools;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .json()
        .init();

    let config = AppConfig::load()?;
    tracing::info!(origin = %config.origin, cache = %config.cache_name, db = %config.db_path.display(), "Starting shelter server on stdio transport");

    let cache = CacheDb::open(&config.db_path).await?;
    let network = HttpNetwork::new(NetworkConfig::from_app_config(&config)?)?;
    let host = Arc::new(host::HostState::new(config, cache, Arc::new(network)));

    if let Err(e) = host.register(None).await {
        tracing::warn!("initial registration failed, serving without a version: {}", e);
    }

    let handler = handler::ShelterServer::new(host);
    let transport = stdio();
    let server = serve_server(handler, transport).await?;

    server.waiting().await?;

    Ok(())
}
