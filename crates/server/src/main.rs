//! tether-mcp server entry point.
//!
//! Boots the MCP server on stdio transport with the configured version
//! installed and active. Logging goes to stderr to avoid interfering with
//! the JSON-RPC protocol on stdout.

use std::sync::Arc;

use anyhow::Result;
use rmcp::service::serve_server;
use rmcp::transport::io::stdio;
use tether_core::{AppConfig, CacheDb};
use tracing_subscriber::EnvFilter;

mod handler;
mod tools;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .json()
        .init();

    let config = AppConfig::load()?;
    tracing::info!(
        version = %config.version,
        origin = %config.origin,
        db = %config.db_path.display(),
        "Starting tether-mcp server on stdio transport"
    );

    let db = CacheDb::open(&config.db_path).await?;
    let state = Arc::new(handler::ServerState::new(config, db)?);

    if let Err(e) = state.start_configured().await {
        tracing::warn!(error = %e, "could not start worker, requests pass through until sw_update succeeds");
    }

    let handler = handler::TetherServer::new(state.clone());
    let transport = stdio();
    let server = serve_server(handler, transport).await?;

    server.waiting().await?;
    state.registration.settle().await;

    Ok(())
}
