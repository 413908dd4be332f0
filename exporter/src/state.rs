//! Application state module.
//!
//! Defines the shared state passed to route handlers and to the collection
//! loop.

use crate::metrics::ExporterMetrics;
use chrono::{DateTime, Utc};
use shared::storage::{InMemoryMetricRegistry, MetricRegistry};
use std::sync::Arc;

/// State shared by the request handlers and the scheduler.
///
/// The registry is the only value written while requests are served.
#[derive(Clone)]
pub struct AppState {
    registry: Arc<dyn MetricRegistry>,
    exporter_metrics: Arc<ExporterMetrics>,
    started_at: DateTime<Utc>,
}

impl AppState {
    /// Creates a new application state.
    pub fn new(registry: Arc<dyn MetricRegistry>, exporter_metrics: Arc<ExporterMetrics>) -> Self {
        Self {
            registry,
            exporter_metrics,
            started_at: Utc::now(),
        }
    }

    /// Creates a new application state with an empty in-memory registry.
    ///
    /// # Errors
    ///
    /// Returns an error if the exporter metrics cannot be registered.
    pub fn with_in_memory_registry() -> Result<Self, prometheus::Error> {
        Ok(Self::new(
            InMemoryMetricRegistry::new_shared(),
            Arc::new(ExporterMetrics::new()?),
        ))
    }

    /// Returns a reference to the metric registry.
    #[must_use]
    pub fn registry(&self) -> &dyn MetricRegistry {
        self.registry.as_ref()
    }

    /// Returns a shared handle to the metric registry.
    #[must_use]
    pub fn shared_registry(&self) -> Arc<dyn MetricRegistry> {
        Arc::clone(&self.registry)
    }

    /// Returns a reference to the exporter's own metrics.
    #[must_use]
    pub fn exporter_metrics(&self) -> &ExporterMetrics {
        self.exporter_metrics.as_ref()
    }

    /// Returns a shared handle to the exporter's own metrics.
    #[must_use]
    pub fn shared_exporter_metrics(&self) -> Arc<ExporterMetrics> {
        Arc::clone(&self.exporter_metrics)
    }

    /// When the state was created.
    #[must_use]
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }
}
