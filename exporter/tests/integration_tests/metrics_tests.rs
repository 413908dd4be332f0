//! Integration tests for the metrics endpoint rendering.

use axum::http::StatusCode;
use shared::models::{Artifact, DatasetMetrics, MetricPoint, SampleStat};

use super::common::{get_text, sample, test_app};

#[tokio::test]
async fn test_empty_registry_exposes_only_exporter_metrics() {
    let (app, _state) = test_app();

    let (status, body) = get_text(app, "/metrics").await;
    assert_eq!(status, StatusCode::OK);
    assert!(!body.contains("ifcb_latest_bin_timestamp"));
    assert!(body.contains("ifcb_exporter_cycles_total 0"));
}

#[tokio::test]
async fn test_sentinels_for_dataset_without_bins() {
    let (app, state) = test_app();
    state
        .registry()
        .publish("empty", DatasetMetrics::empty())
        .unwrap();

    let (_, body) = get_text(app, "/metrics").await;
    assert_eq!(sample(&body, "ifcb_latest_bin_timestamp", "empty"), Some(0.0));
    assert_eq!(sample(&body, "ifcb_is_dataset_up_to_date", "empty"), Some(0.0));
    for artifact in Artifact::ALL {
        let lag = format!("ifcb_latest_{}_lag_seconds", artifact.as_str());
        let ts = format!("ifcb_latest_{}_timestamp", artifact.as_str());
        assert_eq!(sample(&body, &lag, "empty"), Some(-1.0));
        assert_eq!(sample(&body, &ts, "empty"), Some(0.0));
    }
    assert_eq!(sample(&body, "ifcb_size_value", "empty"), None);
    assert_eq!(sample(&body, "ifcb_size_timestamp", "empty"), Some(0.0));
}

#[tokio::test]
async fn test_every_dataset_has_its_own_series() {
    let (app, state) = test_app();
    let mut a = DatasetMetrics::empty();
    a.latest_bin_timestamp = 1_000;
    let mut b = DatasetMetrics::empty();
    b.latest_bin_timestamp = 2_000;
    b.samples
        .insert(SampleStat::Size, MetricPoint::observed(42.0, 2_000));
    state.registry().publish("a", a).unwrap();
    state.registry().publish("b", b).unwrap();

    let (_, body) = get_text(app, "/metrics").await;
    assert_eq!(sample(&body, "ifcb_latest_bin_timestamp", "a"), Some(1_000.0));
    assert_eq!(sample(&body, "ifcb_latest_bin_timestamp", "b"), Some(2_000.0));
    assert_eq!(sample(&body, "ifcb_size_value", "a"), None);
    assert_eq!(sample(&body, "ifcb_size_value", "b"), Some(42.0));
    assert_eq!(body.matches("# TYPE ifcb_latest_bin_timestamp gauge").count(), 1);
}
