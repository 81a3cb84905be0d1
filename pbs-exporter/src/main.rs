/**
 * PBS EXPORTER - Main entry point
 *
 * ROLE : Resolve configuration, set up logging, build the shared upstream
 * client and serve the scrape endpoint.
 *
 * FLOW : flags + env (.env loaded first) -> Settings -> tracing -> reqwest client -> axum.
 */

use anyhow::{Context, Result};
use clap::Parser;
use pbs_exporter::client::ApiClient;
use pbs_exporter::config::{Args, Settings};
use pbs_exporter::http::{self, AppState};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{debug, info};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env if present
    dotenvy::dotenv().ok();

    let settings = Settings::load(Args::parse()).context("Invalid configuration")?;

    tracing_subscriber::fmt()
        .with_max_level(settings.log_level)
        .init();

    debug!("Using connection credential: {:?}", settings.credential);
    debug!("Using connection timeout: {:?}", settings.timeout);
    debug!("Using connection insecure: {}", settings.insecure);

    if let Some(endpoint) = &settings.endpoint {
        info!("Using fix connection endpoint: {}", endpoint);
    }
    info!("Listening on: {}", settings.listen_address);
    info!("Metrics path: {}", settings.metrics_path);

    let client = ApiClient::new(settings.client_settings())
        .context("Failed to build HTTP client")?;

    let listener = TcpListener::bind(&settings.listen_address)
        .await
        .with_context(|| format!("Failed to bind {}", settings.listen_address))?;

    let app = http::build_router(AppState {
        settings: Arc::new(settings),
        client,
    });

    axum::serve(listener, app)
        .await
        .context("HTTP server failed")?;

    Ok(())
}
