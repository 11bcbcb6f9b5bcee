//! Liveness and readiness endpoints.

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::probes::ReadinessReport;
use crate::http::response::timestamp_now;
use crate::lifecycle::uptime;
use crate::http::server::AppState;

/// Body of `GET /health`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct HealthStatus {
    pub status: String,
    pub timestamp: String,
    /// Seconds since the process started.
    pub uptime: f64,
    pub environment: String,
    pub version: String,
}

/// Routes mounted under the API prefix.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/health/ready", get(ready))
}

/// Liveness probe. Always 200 while the process can serve requests.
#[utoipa::path(
    get,
    path = "/health",
    tag = "health",
    responses(
        (status = 200, description = "Health check response", body = HealthStatus)
    )
)]
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    Json(HealthStatus {
        status: "healthy".to_string(),
        timestamp: timestamp_now(),
        uptime: uptime().as_secs_f64(),
        environment: state.config.environment.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Readiness probe. 200 when every dependency is ready, 503 otherwise.
#[utoipa::path(
    get,
    path = "/health/ready",
    tag = "health",
    responses(
        (status = 200, description = "Service is ready", body = ReadinessReport),
        (status = 503, description = "Service is not ready", body = ReadinessReport)
    )
)]
pub async fn ready(State(state): State<AppState>) -> impl IntoResponse {
    let report = state.readiness.evaluate().await;
    let status = if report.ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, [(header::CACHE_CONTROL, "no-store")], Json(report))
}
