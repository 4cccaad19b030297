//! Relay server: router, shared state, and telemetry middleware

use axum::{
    extract::{Request, State},
    middleware::{self, Next},
    response::Response,
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::compression::CompressionLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use super::handler::chat_handler;
use crate::config::AppConfig;
use crate::routing::ModelTracker;
use crate::telemetry::UsageTelemetry;
use crate::upstream::{Dispatcher, UpstreamClient};

/// Shared state for the relay, constructed once at startup
#[derive(Clone)]
pub struct RelayState {
    pub config: Arc<AppConfig>,
    pub upstream: Arc<UpstreamClient>,
    pub dispatcher: Arc<Dispatcher>,
    pub tracker: Arc<ModelTracker>,
    pub telemetry: Arc<UsageTelemetry>,
}

/// Build the router with all routes and layers
pub fn build_router(state: RelayState) -> Router {
    Router::new()
        .route("/api/chat", post(chat_handler))
        .route("/health", get(health_handler))
        .route("/dashboard", get(dashboard_handler))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            track_telemetry,
        ))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(
                    CorsLayer::new()
                        .allow_origin(Any)
                        .allow_methods(Any)
                        .allow_headers(Any),
                )
                .layer(CompressionLayer::new()),
        )
        .with_state(state)
}

/// Run the relay server
pub async fn run_server(state: RelayState) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let addr: SocketAddr = format!(
        "{}:{}",
        state.config.server.host, state.config.server.port
    )
    .parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;

    tracing::info!("llm-relay listening on {}", addr);
    tracing::info!("forwarding to {}", state.config.upstream.base_url());

    let app = build_router(state);
    Ok(axum::serve(listener, app).await?)
}

/// Count every inbound request and every terminal error response
async fn track_telemetry(
    State(state): State<RelayState>,
    request: Request,
    next: Next,
) -> Response {
    let route = request.uri().path().to_string();
    state.telemetry.track_request(&route);

    let response = next.run(request).await;

    let status = response.status();
    if status.is_client_error() || status.is_server_error() {
        state.telemetry.track_error(&route, status.as_u16());
    }

    response
}

/// Health snapshot: degraded while any model sits in cooldown
async fn health_handler(State(state): State<RelayState>) -> Json<serde_json::Value> {
    let models = state.tracker.snapshot();
    let telemetry = state.telemetry.snapshot();

    let status = if models.iter().any(|m| m.is_limited) {
        "degraded"
    } else {
        "ok"
    };

    let routes: Vec<serde_json::Value> = telemetry
        .routes
        .iter()
        .map(|r| {
            json!({
                "path": r.path,
                "requests": r.requests,
                "errors": r.errors,
                "success_rate": r
                    .success_rate()
                    .map(|rate| format!("{:.2}%", rate))
                    .unwrap_or_else(|| "N/A".to_string()),
            })
        })
        .collect();

    Json(json!({
        "status": status,
        "uptime_seconds": telemetry.uptime_seconds,
        "models": models,
        "routes": routes,
    }))
}

/// Raw counters for operators
async fn dashboard_handler(State(state): State<RelayState>) -> Json<serde_json::Value> {
    let telemetry = state.telemetry.snapshot();
    Json(json!({
        "uptime_seconds": telemetry.uptime_seconds,
        "routes": telemetry.routes,
        "models": state.tracker.snapshot(),
    }))
}
