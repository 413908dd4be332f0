//! Data models for the IFCB exporter.
//!
//! This module contains the bin records returned by the dashboard API and the
//! derived metric sets published per dataset.

pub mod bin;
pub mod dataset_metrics;

pub use bin::{Artifact, ArtifactRecord, Bin, SampleStat, SampleStats, UnixTime};
pub use dataset_metrics::{
    ArtifactMetrics, DatasetMetrics, GaugeSample, LagResult, MetricPoint, METRIC_PREFIX, NO_LAG,
    NO_TIMESTAMP,
};
