//! Router assembly: HTTP endpoints, WebSocket upgrade, static files, CORS, and HTTP tracing.

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    services::{ServeDir, ServeFile},
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

use crate::state::AppState;

pub mod http;
pub mod ws;

/// Build the application router with:
/// - WebSocket at `/ws` (session commands in, session snapshots out)
/// - REST-ish read endpoints under `/api/v1/...`
/// - Static SPA from `./static` with index fallback
/// - CORS (allow any origin/method/headers)
/// - HTTP trace layer (per-request spans w/ method, path, status, latency)
pub fn build_router(state: Arc<AppState>) -> Router {
    // Static files with SPA fallback
    let static_service = ServeDir::new("./static")
        .append_index_html_on_directories(true)
        .not_found_service(ServeFile::new("./static/index.html"));

    Router::new()
        // WebSocket
        .route("/ws", get(ws::ws_upgrade))
        // HTTP API
        .route("/api/v1/health", get(http::http_health))
        .route("/api/v1/catalog", get(http::http_get_catalog))
        .route("/api/v1/session", get(http::http_get_session))
        .route("/api/v1/stats", get(http::http_get_stats))
        .route("/api/v1/stats/reset", post(http::http_post_stats_reset))
        // State + CORS + HTTP tracing
        .with_state(state)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_request(DefaultOnRequest::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        // Frontend fallback
        .fallback_service(static_service)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use tempfile::TempDir;
    use tower::ServiceExt;

    use crate::config::AppConfig;

    fn test_state(dir: &TempDir) -> Arc<AppState> {
        let mut cfg = AppConfig::default();
        cfg.storage.data_dir = dir.path().to_path_buf();
        Arc::new(AppState::from_config(cfg).unwrap())
    }

    async fn get_json(app: Router, uri: &str) -> (StatusCode, serde_json::Value) {
        let res = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = res.status();
        let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn health_and_catalog() {
        let dir = TempDir::new().unwrap();
        let app = build_router(test_state(&dir));

        let (status, body) = get_json(app.clone(), "/api/v1/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["ok"], true);

        let (status, body) = get_json(app, "/api/v1/catalog").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["autoTopic"], "auto");
        assert_eq!(body["languages"], serde_json::json!(["python", "c", "cpp", "java"]));
    }

    #[tokio::test]
    async fn fresh_session_is_idle() {
        let dir = TempDir::new().unwrap();
        let app = build_router(test_state(&dir));
        let (status, body) = get_json(app.clone(), "/api/v1/session").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["phase"], "idle");

        let (_, body) = get_json(app, "/api/v1/stats").await;
        assert_eq!(body["topics"], serde_json::json!([]));
    }

    #[tokio::test]
    async fn stats_reset_is_accepted() {
        let dir = TempDir::new().unwrap();
        let app = build_router(test_state(&dir));
        let res = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/v1/stats/reset")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::ACCEPTED);
    }
}
