//! Common test utilities and helpers for integration tests.
//!
//! This module provides the test app setup, a mock dashboard API and
//! helpers to read the exposition text.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use exporter::{create_router, AppState, DatasetSource, Scheduler, SchedulerSettings};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use shared::client::IfcbClient;
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Creates a test router with an empty registry.
///
/// # Returns
///
/// A tuple containing the configured router and the app state.
pub fn test_app() -> (Router, AppState) {
    let state = AppState::with_in_memory_registry().unwrap();
    let router = create_router(state.clone());
    (router, state)
}

/// Settings used by the collection tests.
pub fn settings(threshold_secs: u64) -> SchedulerSettings {
    SchedulerSettings {
        interval: Duration::from_millis(50),
        threshold_secs,
        lookback_bins: Some(100),
        fetch_timeout: Duration::from_secs(5),
        shutdown_grace: Duration::from_millis(100),
        rediscover_every: None,
    }
}

/// Builds a scheduler that polls `datasets` on `server` and publishes into `state`.
pub fn scheduler(
    server: &MockServer,
    state: &AppState,
    datasets: &[&str],
    settings: SchedulerSettings,
) -> Scheduler {
    let client = IfcbClient::builder(format!("{}/api", server.uri()))
        .timeout(Duration::from_secs(2))
        .build()
        .unwrap();

    Scheduler::new(
        Arc::new(client),
        state.shared_registry(),
        state.shared_exporter_metrics(),
        settings,
        datasets.iter().map(ToString::to_string).collect(),
        DatasetSource::Configured,
    )
}

/// Serves `bins` for `dataset` on the mock API.
pub async fn mount_bins(server: &MockServer, dataset: &str, bins: Value) {
    Mock::given(method("GET"))
        .and(path("/api/list_bins"))
        .and(query_param("dataset", dataset))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": bins })))
        .mount(server)
        .await;
}

/// Makes `dataset` fail with `status` on the mock API.
pub async fn mount_failure(server: &MockServer, dataset: &str, status: u16) {
    Mock::given(method("GET"))
        .and(path("/api/list_bins"))
        .and(query_param("dataset", dataset))
        .respond_with(ResponseTemplate::new(status))
        .mount(server)
        .await;
}

/// Helper to make a GET request returning the raw body.
pub async fn get_text(app: Router, uri: &str) -> (StatusCode, String) {
    let response = tower::ServiceExt::oneshot(
        app,
        Request::builder().uri(uri).body(Body::empty()).unwrap(),
    )
    .await
    .unwrap();

    let status = response.status();
    let body_bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, String::from_utf8(body_bytes.to_vec()).unwrap())
}

/// Helper to make a GET request with a JSON response.
pub async fn get(app: Router, uri: &str) -> (StatusCode, Value) {
    let (status, body) = get_text(app, uri).await;
    (status, serde_json::from_str(&body).unwrap_or(Value::Null))
}

/// Looks up the value of `name{dataset="..."}` in an exposition.
pub fn sample(text: &str, name: &str, dataset: &str) -> Option<f64> {
    let prefix = format!("{name}{{dataset=\"{dataset}\"}} ");
    text.lines()
        .find_map(|line| line.strip_prefix(&prefix))
        .and_then(|value| value.trim().parse().ok())
}

/// Current unix time in seconds.
pub fn now() -> i64 {
    chrono::Utc::now().timestamp()
}
