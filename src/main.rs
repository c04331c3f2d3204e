//! # Clonescope - service entry point
//!
//! ## Initialization Sequence
//!
//! 1. **Tracing** - `EnvFilter` from `RUST_LOG`, fmt layer
//! 2. **Configuration** - clap flags with environment fallbacks
//! 3. **Clients** - AI provider and first-party extractor
//! 4. **Axum API** - bind and serve until Ctrl+C
//!
//! ## Shutdown
//!
//! Ctrl+C cancels the shared shutdown token, which stops in-flight retry
//! loops, then axum drains open connections.

#![forbid(unsafe_code)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::panic)]
#![deny(clippy::expect_used)]

mod cli;

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use clonescope_web::{
    AnalysisService, AppState, HttpAnalysisProvider, HttpFirstPartyExtractor,
    InMemoryAnalysisRepository, create_router,
};
use tokio::net::TcpListener;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use crate::cli::Cli;

const DEFAULT_LOG_FILTER: &str = "info,clonescope=debug,tower_http=debug";

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let config = Cli::parse()
        .into_config()
        .context("Invalid configuration")?;

    if config.provider.api_key.is_none() {
        warn!("No AI provider API key configured; analyses will fail with CONFIG_MISSING");
    }

    let provider = HttpAnalysisProvider::new(config.provider.clone())
        .context("Failed to build AI provider client")?;
    let extractor = HttpFirstPartyExtractor::new().context("Failed to build site extractor")?;

    let shutdown = CancellationToken::new();
    let service = AnalysisService::new(
        Arc::new(InMemoryAnalysisRepository::new()),
        Arc::new(provider),
        Arc::new(extractor),
        config.service.clone(),
        shutdown.clone(),
    );
    let state = AppState::new(Arc::new(service), config.server.production);
    let app = create_router(state, &config.server).context("Failed to create router")?;

    let listener = TcpListener::bind(&config.server.bind_address)
        .await
        .with_context(|| format!("Failed to bind {}", config.server.bind_address))?;
    info!(
        address = %config.server.bind_address,
        model = %config.provider.model,
        production = config.server.production,
        "Clonescope listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(wait_for_shutdown(shutdown))
        .await
        .context("Server error")?;

    info!("Shutdown complete");
    Ok(())
}

/// Initialize tracing subscriber.
fn init_tracing() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)))
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Wait for Ctrl+C, then cancel in-flight work.
async fn wait_for_shutdown(token: CancellationToken) {
    match signal::ctrl_c().await {
        Ok(()) => info!("Received Ctrl+C, initiating graceful shutdown"),
        Err(err) => error!("Failed to listen for shutdown signal: {}", err),
    }
    token.cancel();
}
