use std::time::Instant;

use axum::{
    Json,
    extract::{MatchedPath, Request, State},
    middleware::Next,
    response::Response,
};
use chrono::Utc;
use serde_json::{Value, json};
use tracing::warn;

use crate::{
    application::{dto::HealthResponse, metrics::MetricsSnapshot},
    interface::http::problem::{ApiProblem, ApiResult},
    state::AppState,
};

const UNMATCHED_ROUTE: &str = "<unmatched>";

/// Records one sample per request, keyed by the matched route template so
/// `/users/{userId}` aggregates across users.
pub async fn record_metrics(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let method = request.method().to_string();
    let route = request
        .extensions()
        .get::<MatchedPath>()
        .map(|path| path.as_str().to_string())
        .unwrap_or_else(|| UNMATCHED_ROUTE.to_string());

    let started = Instant::now();
    let response = next.run(request).await;
    state
        .metrics
        .record(&method, &route, response.status().as_u16(), started.elapsed());

    response
}

pub async fn healthcheck(State(state): State<AppState>) -> Json<HealthResponse> {
    let healthy = store_is_healthy(&state).await;
    Json(health(&state, if healthy { "ok" } else { "degraded" }))
}

/// Like `/health`, but a failing store is reported as 503.
pub async fn detailed_health(State(state): State<AppState>) -> ApiResult<Json<HealthResponse>> {
    if !store_is_healthy(&state).await {
        return Err(ApiProblem::service_unavailable("preferences store is not responding"));
    }
    Ok(Json(health(&state, "ok")))
}

pub async fn metrics(State(state): State<AppState>) -> Json<MetricsSnapshot> {
    Json(state.metrics.snapshot())
}

pub async fn reset_metrics(State(state): State<AppState>) -> Json<Value> {
    state.metrics.reset();
    Json(json!({ "success": true, "message": "Metrics reset successfully" }))
}

pub async fn banner() -> Json<Value> {
    Json(json!({
        "name": "CoSearch API",
        "version": env!("CARGO_PKG_VERSION"),
        "status": "running",
        "endpoints": {
            "health": "/health",
            "user": "/api/user",
            "settings": "/api/setting",
            "cleanup": "/api/cleanup",
            "admin": "/api/admin",
            "monitoring": "/api/monitoring",
        },
    }))
}

async fn store_is_healthy(state: &AppState) -> bool {
    match state.repository.ping().await {
        Ok(()) => true,
        Err(err) => {
            warn!(error = %err, "store health check failed");
            false
        }
    }
}

fn health(state: &AppState, status: &'static str) -> HealthResponse {
    HealthResponse {
        status,
        timestamp: Utc::now(),
        uptime_secs: state.started_at.elapsed().as_secs(),
        version: env!("CARGO_PKG_VERSION"),
        store: state.store_kind,
    }
}
