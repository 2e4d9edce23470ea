use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use rmcp::ServiceExt;
use rmcp::transport::stdio;
use tracing_subscriber::EnvFilter;

use mcp_countries::adapters::cache::fetch_cache::FetchCache;
use mcp_countries::adapters::rest::client::RestCountriesClient;
use mcp_countries::config::load_config;
use mcp_countries::mcp::server::CountriesMcpServer;
use mcp_countries::ports::country_client::CountryClient;

fn find_config_path() -> PathBuf {
    // Check common locations for config file
    let candidates = [
        PathBuf::from("config.yaml"),
        dirs_next().join("config.yaml"),
    ];

    for path in &candidates {
        if path.exists() {
            return path.clone();
        }
    }

    candidates[0].clone()
}

fn dirs_next() -> PathBuf {
    // Look in the directory where the binary is
    std::env::current_exe()
        .ok()
        .and_then(|p| p.parent().map(Path::to_path_buf))
        .unwrap_or_else(|| PathBuf::from("."))
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging to stderr (stdout is reserved for MCP JSON-RPC)
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    tracing::info!("Starting mcp-countries server");

    // Load configuration
    let config_path = find_config_path();
    let config = load_config(&config_path)?;

    // Build dependencies: one cache per process, swept in the background
    let cache = Arc::new(FetchCache::new(Duration::from_secs(config.cache.ttl_secs)));
    let sweeper =
        Arc::clone(&cache).spawn_sweeper(Duration::from_secs(config.cache.sweep_interval_secs));

    let client = Arc::new(RestCountriesClient::new(config.api, Arc::clone(&cache))?);

    // Warm the cache in the background; a failed prefetch is not fatal
    let warmup = Arc::clone(&client);
    tokio::spawn(async move {
        match warmup.prefetch_popular().await {
            Ok(countries) => {
                tracing::info!(count = countries.len(), "Prefetched popular countries");
            }
            Err(e) => tracing::warn!(error = %e, "Popular-country prefetch failed"),
        }
    });

    let server = CountriesMcpServer::new(client, Arc::clone(&cache));

    // Start MCP server over stdio
    let service = server.serve(stdio()).await?;
    service.waiting().await?;

    sweeper.abort();

    Ok(())
}
