//! Integration tests for the health endpoint.

use axum::http::StatusCode;
use serde_json::json;
use wiremock::MockServer;

use super::common::{get, mount_bins, mount_failure, now, scheduler, settings, test_app};

#[tokio::test]
async fn test_health_check() {
    let (app, _state) = test_app();

    let (status, response) = get(app, "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(response["status"], "healthy");
    assert_eq!(response["service"], "ifcb-exporter");
    assert_eq!(response["datasets"], 0);
}

#[tokio::test]
async fn test_health_counts_published_datasets_and_cycles() {
    let server = MockServer::start().await;
    mount_bins(&server, "mvco", json!([{"pid": "b1", "sample_time": now() - 60}])).await;
    mount_failure(&server, "down", 503).await;

    let (app, state) = test_app();
    scheduler(&server, &state, &["mvco", "down"], settings(86_400))
        .run_cycle()
        .await;

    let (status, response) = get(app, "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(response["status"], "healthy");
    assert_eq!(response["datasets"], 1);
    assert_eq!(response["cycles"], 1);
}
