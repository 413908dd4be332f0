//! Prometheus scrape endpoint.

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};

use crate::metrics::{encode_metrics, CONTENT_TYPE};
use crate::state::AppState;

/// Creates the metrics routes.
pub fn metrics_routes() -> Router<AppState> {
    Router::new().route("/metrics", get(scrape))
}

/// Renders the current registry contents.
///
/// Reads never wait for a collection cycle; only the brief registry lock is
/// shared with the publisher.
async fn scrape(State(state): State<AppState>) -> Response {
    match encode_metrics(state.registry(), state.exporter_metrics()) {
        Ok(body) => ([(header::CONTENT_TYPE, CONTENT_TYPE)], body).into_response(),
        Err(e) => {
            tracing::error!(error = %e, "Failed to encode metrics");
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}
