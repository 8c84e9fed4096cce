//! # quill-server binary
//!
//! Wires the pipeline together and serves the HTTP surface: in-memory
//! store, admission controller on the system clock, streaming relay, and
//! the Axum router. Configuration comes from `QUILL_*` / `OPENAI_*`
//! environment variables.

#![deny(unsafe_code)]

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use tracing::{info, warn};

use quill_admission::AdmissionController;
use quill_admission::clock::SystemClock;
use quill_chat::memory_store::MemoryStore;
use quill_chat::orchestrator::Orchestrator;
use quill_core::constants::UPSTREAM_REQUEST_TIMEOUT_SECS;
use quill_llm::{RelayConfig, StreamingRelay};
use quill_server::auth::StaticTokenAuthenticator;
use quill_server::config::ServerConfig;
use quill_server::routes::{AppState, router};

fn init_tracing(level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .compact();
    // try_init is a no-op if a subscriber is already set
    let _ = subscriber.try_init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = ServerConfig::from_env();
    init_tracing(&config.log_level);

    if config.openai_api_key.is_none() {
        warn!("OPENAI_API_KEY is not set; chat requests will fail with a configuration error");
    }
    if config.api_tokens.is_empty() {
        warn!("QUILL_API_TOKENS is not set; every request will be rejected as unauthenticated");
    }

    let clock = Arc::new(SystemClock);
    let store = Arc::new(MemoryStore::new());
    let admission = Arc::new(AdmissionController::new(clock.clone()));
    let relay = Arc::new(StreamingRelay::new(RelayConfig {
        api_key: config.openai_api_key.clone(),
        base_url: config.openai_base_url.clone(),
        default_model: config.default_model.clone(),
        request_timeout: Duration::from_secs(UPSTREAM_REQUEST_TIMEOUT_SECS),
        ..RelayConfig::default()
    }));
    let orchestrator = Arc::new(Orchestrator::new(store, admission, relay, clock));
    let auth = Arc::new(StaticTokenAuthenticator::from_entries(&config.api_tokens));

    let app = router(AppState {
        orchestrator,
        auth,
        start_time: Instant::now(),
    });

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!(addr = %listener.local_addr()?, "quill server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    info!("quill server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for shutdown signal");
        return;
    }
    info!("shutdown signal received");
}
