//! Health check endpoint.
//!
//! Provides a simple health check endpoint for load balancers and monitoring systems.

use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;

use crate::state::AppState;

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Service status (always "healthy" if reachable).
    pub status: &'static str,
    /// Service name.
    pub service: &'static str,
    /// Service version.
    pub version: &'static str,
    /// Number of datasets with published metrics.
    pub datasets: usize,
    /// Completed collection cycles.
    pub cycles: u64,
    /// Seconds since the exporter started.
    pub uptime_seconds: i64,
}

/// Creates the health check routes.
pub fn health_routes() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}

/// Health check handler.
///
/// The exporter stays healthy while the API is unreachable: stale datasets
/// are visible through their own metrics.
async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let datasets = state.registry().len().unwrap_or_else(|e| {
        tracing::error!(error = %e, "Failed to read metric registry");
        0
    });

    Json(HealthResponse {
        status: "healthy",
        service: "ifcb-exporter",
        version: env!("CARGO_PKG_VERSION"),
        datasets,
        cycles: state.exporter_metrics().cycles(),
        uptime_seconds: (chrono::Utc::now() - state.started_at()).num_seconds(),
    })
}
