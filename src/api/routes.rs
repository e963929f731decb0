//! HTTP surface: reserved welcome/status paths and the catch-all dispatch

use axum::{
    body::{to_bytes, Body},
    extract::{ConnectInfo, State},
    http::Request,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tower_http::trace::TraceLayer;

use crate::audit::RoutingDecision;
use crate::error::{AppError, Result};
use crate::gateway::classifier::classify;
use crate::middleware::RequestLogLayer;
use crate::proxy::ForwardRequest;
use crate::AppState;

/// Client-supplied selection override
const PREFERENCE_HEADER: &str = "x-server-preference";

/// Forwarded bodies are buffered; larger payloads are rejected
const MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

/// Build the router. Every path except the two reserved ones is classified,
/// selected and forwarded, any method.
pub async fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(welcome))
        .route("/status", get(status))
        .fallback(dispatch)
        .layer(RequestLogLayer::new())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn welcome() -> impl IntoResponse {
    Json(json!({
        "service": "api-pool-balancer",
        "message": "Welcome to the load balancer. Requests on any other path are routed to a backend pool.",
    }))
}

async fn status(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let total = state.registry.backend_count();
    let live = state.liveness.live_count();

    Json(json!({
        "backends": {
            "total": total,
            "live": live,
            "dead": total.saturating_sub(live),
        },
        "algorithm": state.settings.routing.algorithm,
        "queue_depth": state.admission.queue_depth(),
    }))
}

/// Catch-all: classify, select, audit, admit, forward
async fn dispatch(
    State(state): State<Arc<AppState>>,
    ConnectInfo(client_addr): ConnectInfo<SocketAddr>,
    request: Request<Body>,
) -> Result<Response> {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let path_and_query = request
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| path.clone());
    let headers = request.headers().clone();

    let preference = headers
        .get(PREFERENCE_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string());

    let group = classify(&path);

    let selection_start = Instant::now();
    let backend = state.selector.select(group, preference.as_deref())?;
    let selection_latency = selection_start.elapsed();

    state.audit.emit(RoutingDecision::new(
        client_addr,
        group,
        backend.address.clone(),
        selection_latency,
    ));

    let body = to_bytes(request.into_body(), MAX_BODY_BYTES)
        .await
        .map_err(|e| AppError::Internal(format!("Failed to buffer request body: {}", e)))?;

    let forward = ForwardRequest {
        method,
        path_and_query,
        headers,
        body,
        group,
    };

    state.admission.dispatch(backend, forward).await
}
