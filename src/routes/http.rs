//! HTTP endpoint handlers. Reads come from the latest session snapshot; the only
//! write (stats reset) is forwarded to the session actor like any WS command.

use std::sync::Arc;
use axum::{extract::State, http::StatusCode, Json, response::IntoResponse};
use tracing::{error, info, instrument};

use crate::protocol::*;
use crate::session::Event;
use crate::state::AppState;

#[instrument(level = "info", skip(state))]
pub async fn http_health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
  Json(HealthOut { ok: true, generator: state.generator })
}

#[instrument(level = "info", skip(state))]
pub async fn http_get_catalog(State(state): State<Arc<AppState>>) -> impl IntoResponse {
  Json(CatalogOut::from(&state.catalog))
}

#[instrument(level = "info", skip(state))]
pub async fn http_get_session(State(state): State<Arc<AppState>>) -> impl IntoResponse {
  let snap = state.session.snapshot();
  info!(target: "session", phase = ?snap.phase, "HTTP session snapshot served");
  Json(snap)
}

#[instrument(level = "info", skip(state))]
pub async fn http_get_stats(State(state): State<Arc<AppState>>) -> impl IntoResponse {
  Json(StatsOut { topics: state.session.snapshot().stats })
}

#[instrument(level = "info", skip(state))]
pub async fn http_post_stats_reset(State(state): State<Arc<AppState>>) -> impl IntoResponse {
  match state.session.send(Event::ResetStats).await {
    Ok(()) => {
      info!(target: "stats", "HTTP stats reset requested");
      (StatusCode::ACCEPTED, Json(AckOut { ok: true })).into_response()
    }
    Err(e) => {
      error!(target: "practice_backend", error = %e, "Stats reset could not be delivered");
      (StatusCode::SERVICE_UNAVAILABLE, Json(ErrorOut { message: e.to_string() })).into_response()
    }
  }
}
