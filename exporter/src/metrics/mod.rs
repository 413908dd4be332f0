//! Metrics exposition module.
//!
//! This module turns the registry snapshots into Prometheus text format and
//! keeps the exporter's own operational metrics (cycles, failures).

pub mod encode;
pub mod exporter_metrics;

pub use encode::{encode_metrics, EncodeError, CONTENT_TYPE};
pub use exporter_metrics::ExporterMetrics;
