mod api;
mod config;
mod constants;
mod decode;
mod error;
mod geo;
mod grid;
mod http_client;
mod indexer;
mod ingest;
mod interpolate;
mod knmi;
mod lookup;
mod notify;
mod projection;
mod types;
mod utils;

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::routing::get;
use axum::Router;
use reqwest::Client;
use tower_http::compression::CompressionLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::api::{healthz, meta, point, route};
use crate::config::Config;
use crate::ingest::spawn_background_workers;
use crate::types::AppState;
use crate::utils::init_tracing;

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let cfg = Arc::new(Config::from_env()?);

    let http = Client::builder()
        .timeout(cfg.request_timeout)
        .user_agent("radar-nowcast/1.0")
        .build()
        .context("Failed to build reqwest client")?;

    info!("Decoding forecast datasets as {:?}", cfg.dataset_format);
    let state = AppState::new(cfg.clone(), http);

    spawn_background_workers(state.clone()).await?;

    let app = Router::new()
        .route("/healthz", get(healthz))
        .route("/v1/meta", get(meta))
        .route("/coordinate", get(point))
        .route("/v1/point", get(point))
        .route("/v1/route", get(route))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(&cfg.listen_addr)
        .await
        .with_context(|| format!("Failed to bind {}", cfg.listen_addr))?;

    info!("Radar nowcast service listening on {}", cfg.listen_addr);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        tracing::warn!("Failed to listen for shutdown signal: {error}");
    }
    info!("Shutting down");
}
