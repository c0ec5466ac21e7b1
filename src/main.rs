//! Practice Session Backend · programming-exercise trainer
//!
//! - Axum HTTP + WebSocket API around a single practice session
//! - Optional OpenAI integration for problems and model answers (via environment variables)
//! - Sandbox runner client for grading and free-input runs
//! - Static SPA fallback (./static/index.html)
//!
//! Important env variables:
//!   PORT                  : u16 (default 3000)
//!   OPENAI_API_KEY        : enables OpenAI generation if present (seed problems otherwise)
//!   OPENAI_BASE_URL       : default "https://api.openai.com/v1"
//!   OPENAI_MODEL          : default "gpt-4o-mini"
//!   GRADER_URL            : sandbox runner base URL, default "http://localhost:8000"
//!   PRACTICE_CONFIG_PATH  : path to TOML config (catalog, prompts, timeouts, storage)
//!   PRACTICE_DATA_DIR     : overrides storage.data_dir (stats.json + JSONL archive)
//!   LOG_LEVEL             : tracing filter, e.g. "debug" or full directives
//!   LOG_FORMAT            : "pretty" (default) or "json"

mod telemetry;
mod util;
mod error;
mod domain;
mod config;
mod codec;
mod stats;
mod selector;
mod aggregator;
mod generator;
mod seeds;
mod openai;
mod grader;
mod store;
mod archive;
mod session;
mod runtime;
mod protocol;
mod state;
mod routes;

use std::{net::SocketAddr, sync::Arc};
use tokio::net::TcpListener;
use tracing::{info, instrument};

use crate::routes::build_router;
use crate::state::AppState;

#[instrument(level = "info", skip_all)]
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
  telemetry::init_tracing();

  // Build shared application state (config, stats, services, session actor).
  let state = Arc::new(AppState::new()?);

  // Build the HTTP router with routes, CORS and tracing layers.
  let app = build_router(state.clone());

  // Read port from env or default to 3000.
  let addr: SocketAddr = std::env::var("PORT")
    .ok()
    .and_then(|p| p.parse::<u16>().ok())
    .map(|port| SocketAddr::from(([0, 0, 0, 0], port)))
    .unwrap_or_else(|| SocketAddr::from(([0, 0, 0, 0], 3000)));

  let listener = TcpListener::bind(addr).await?;
  info!(target: "practice_backend", %addr, generator = state.generator, "HTTP server listening");
  axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await?;
  info!(target: "practice_backend", "HTTP server stopped");
  Ok(())
}

async fn shutdown_signal() {
  if let Err(e) = tokio::signal::ctrl_c().await {
    tracing::error!(target: "practice_backend", error = %e, "Failed to listen for Ctrl-C");
    std::future::pending::<()>().await;
  }
  info!(target: "practice_backend", "Shutdown signal received");
}
