//! Storage traits and implementations.
//!
//! This module provides the abstraction for holding the latest metrics of each
//! dataset. The `MetricRegistry` trait defines the interface shared by the
//! collection loop (writer) and the metrics endpoint (reader).

pub mod metric_registry;

pub use metric_registry::{
    DatasetSnapshot, InMemoryMetricRegistry, MetricRegistry, RegistryError,
};
