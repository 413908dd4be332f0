//! End-to-end tests: mock dashboard API, collection cycle, scrape.

use serde_json::json;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use super::common::{
    get_text, mount_bins, mount_failure, now, sample, scheduler, settings, test_app,
};

#[tokio::test]
async fn test_fresh_dataset_end_to_end() {
    let server = MockServer::start().await;
    let t0 = now();
    mount_bins(
        &server,
        "mvco",
        json!([{
            "pid": "D20240501T120000_IFCB104",
            "sample_time": t0 - 100,
            "blobs": {"timestamp": t0 - 50},
            "size": 500_000
        }]),
    )
    .await;

    let (app, state) = test_app();
    let report = scheduler(&server, &state, &["mvco"], settings(86_400))
        .run_cycle()
        .await;
    assert_eq!(report.succeeded, vec!["mvco".to_string()]);

    let (_, body) = get_text(app, "/metrics").await;
    #[allow(clippy::cast_precision_loss)]
    let expected_ts = (t0 - 100) as f64;
    assert_eq!(sample(&body, "ifcb_latest_bin_timestamp", "mvco"), Some(expected_ts));
    assert_eq!(sample(&body, "ifcb_is_dataset_up_to_date", "mvco"), Some(1.0));
    let lag = sample(&body, "ifcb_latest_blobs_lag_seconds", "mvco").unwrap();
    assert!((50.0..=53.0).contains(&lag), "lag {lag}");
    assert_eq!(sample(&body, "ifcb_latest_features_lag_seconds", "mvco"), Some(-1.0));
    assert_eq!(sample(&body, "ifcb_size_value", "mvco"), Some(500_000.0));
    assert_eq!(sample(&body, "ifcb_size_timestamp", "mvco"), Some(expected_ts));
}

#[tokio::test]
async fn test_stale_dataset_is_not_up_to_date() {
    let server = MockServer::start().await;
    mount_bins(
        &server,
        "old",
        json!([{"pid": "b1", "sample_time": now() - 100_000}]),
    )
    .await;

    let (app, state) = test_app();
    scheduler(&server, &state, &["old"], settings(86_400))
        .run_cycle()
        .await;

    let (_, body) = get_text(app, "/metrics").await;
    assert_eq!(sample(&body, "ifcb_is_dataset_up_to_date", "old"), Some(0.0));
}

#[tokio::test]
async fn test_failure_is_isolated_and_prior_values_retained() {
    let server = MockServer::start().await;
    let t0 = now();
    mount_bins(&server, "a", json!([{"pid": "a1", "sample_time": t0 - 10}])).await;
    Mock::given(method("GET"))
        .and(path("/api/list_bins"))
        .and(query_param("dataset", "b"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"data": [{"pid": "b1", "sample_time": t0 - 20}]})),
        )
        .up_to_n_times(1)
        .mount(&server)
        .await;

    let (app, state) = test_app();
    let scheduler = scheduler(&server, &state, &["a", "b"], settings(86_400));
    scheduler.run_cycle().await;

    // The one-shot mock for "b" is exhausted: it now gets wiremock's 404.
    let report = scheduler.run_cycle().await;
    assert_eq!(report.succeeded, vec!["a".to_string()]);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].dataset, "b");

    let (_, body) = get_text(app, "/metrics").await;
    #[allow(clippy::cast_precision_loss)]
    let b_ts = (t0 - 20) as f64;
    assert_eq!(sample(&body, "ifcb_latest_bin_timestamp", "b"), Some(b_ts));
    assert!(body.contains(
        "ifcb_exporter_dataset_failures_total{dataset=\"b\",kind=\"response\"} 1"
    ));
}

#[tokio::test]
async fn test_never_successful_dataset_is_absent() {
    let server = MockServer::start().await;
    mount_bins(&server, "up", json!([])).await;
    mount_failure(&server, "down", 500).await;

    let (app, state) = test_app();
    scheduler(&server, &state, &["up", "down"], settings(86_400))
        .run_cycle()
        .await;

    let (_, body) = get_text(app, "/metrics").await;
    assert_eq!(sample(&body, "ifcb_latest_bin_timestamp", "up"), Some(0.0));
    assert_eq!(sample(&body, "ifcb_latest_bin_timestamp", "down"), None);
}

#[tokio::test]
async fn test_loop_collects_until_cancelled() {
    let server = MockServer::start().await;
    mount_bins(&server, "mvco", json!([{"pid": "b1", "sample_time": now() - 5}])).await;

    let (app, state) = test_app();
    let cancel = CancellationToken::new();
    let handle = tokio::spawn(
        scheduler(&server, &state, &["mvco"], settings(86_400)).run(cancel.clone()),
    );

    tokio::time::sleep(Duration::from_millis(180)).await;
    cancel.cancel();
    tokio::time::timeout(Duration::from_secs(2), handle)
        .await
        .unwrap()
        .unwrap();

    let (_, body) = get_text(app, "/metrics").await;
    assert_eq!(sample(&body, "ifcb_is_dataset_up_to_date", "mvco"), Some(1.0));
    let cycles = state.exporter_metrics().cycles();
    assert!(cycles >= 2, "cycles {cycles}");
}
