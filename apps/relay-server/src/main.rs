//! Design relay server.
//!
//! Run with: cargo run -p relay-server
//!
//! Then POST `{ "input", "sessionId", "context"? }` to
//! http://localhost:3001/api/agent. The downstream agent is expected at
//! `DESIGN_RELAY__AGENT__URL` (default http://localhost:5100/agent).

mod config;

use std::sync::Arc;

use anyhow::Context as _;
use axum::http::{HeaderValue, Method, header};
use design_relay_agent::HttpAgent;
use design_relay_session::{Relay, storage::MemoryStore};
use design_relay_transport::http::create_router;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::{RelayConfig, ServerConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = RelayConfig::load().context("failed to load configuration")?;

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.server.log_level)),
        )
        .init();

    config.validate().context("invalid configuration")?;

    let agent = HttpAgent::new(config.agent.url.clone(), config.agent.timeout())
        .context("failed to build agent client")?;
    let relay = Arc::new(Relay::new(MemoryStore::new(), agent, config.relay.clone()));

    let app = create_router(relay).layer(cors_layer(&config.server));

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    tracing::info!(
        agent = %config.agent.url,
        precedence = ?config.relay.context_precedence,
        serialize_sessions = config.relay.serialize_sessions,
        "Relay listening on http://{addr}"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    tracing::info!("Relay stopped");
    Ok(())
}

fn cors_layer(server: &ServerConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = server
        .cors_origins_list()
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin: {origin}");
                None
            }
        })
        .collect();

    if origins.is_empty() {
        return CorsLayer::permissive();
    }

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE])
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {e}");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown requested");
}
