//! IFCB Prometheus exporter
//!
//! This crate polls an IFCB dashboard API on a fixed interval and exposes the
//! freshness and sample statistics of every dataset on a Prometheus pull
//! endpoint.
//!
//! # Architecture
//!
//! The exporter is built on Axum and Tokio:
//! - A [`Scheduler`] task fetches bins, derives [`shared::models::DatasetMetrics`]
//!   and publishes them into a [`shared::storage::MetricRegistry`]
//! - `/metrics` renders the registry in the Prometheus text format
//! - `/health` reports liveness as JSON
//!
//! # Example
//!
//! ```no_run
//! use exporter::{run_with_config, Config};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::new("https://ifcb.caloos.org/api").with_datasets(["mvco"]);
//!     run_with_config(config).await
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod config;
pub mod metrics;
mod routes;
pub mod scheduler;
mod state;

pub use config::{Config, ConfigError};
pub use metrics::ExporterMetrics;
pub use scheduler::{
    resolve_datasets, CycleReport, DatasetFailure, DatasetSource, Scheduler, SchedulerSettings,
};
pub use state::AppState;

use anyhow::{Context, Result};
use axum::Router;
use shared::client::{IfcbClient, InstrumentApi};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;

/// User agent sent to the dashboard API.
const USER_AGENT: &str = concat!("ifcb-exporter/", env!("CARGO_PKG_VERSION"));

/// Builds the dashboard API client for `config`.
///
/// # Errors
///
/// Returns an error if the base URL is invalid or the HTTP client cannot be built.
pub fn build_client(config: &Config) -> Result<IfcbClient> {
    IfcbClient::builder(config.base_url.clone())
        .timeout(config.request_timeout())
        .user_agent(USER_AGENT)
        .build()
        .context("Failed to create API client")
}

/// Runs the exporter with the provided configuration.
///
/// Resolves the dataset set, starts the collection loop and serves the
/// metrics endpoint until SIGTERM/SIGINT.
///
/// # Errors
///
/// Returns an error if:
/// - The configuration is invalid
/// - Dataset discovery is needed and fails or finds nothing
/// - The server fails to bind to the configured address
/// - A fatal error occurs during operation
pub async fn run_with_config(config: Config) -> Result<()> {
    config
        .validate_config()
        .context("Invalid configuration")?;
    let addr = config.socket_addr()?;

    tracing::info!(
        host = %config.host,
        port = %config.port,
        base_url = %config.base_url,
        interval_secs = config.interval_secs,
        threshold_secs = config.threshold_secs,
        "IFCB exporter starting"
    );

    let api: Arc<dyn InstrumentApi> = Arc::new(build_client(&config)?);
    let (datasets, source) = resolve_datasets(api.as_ref(), &config.datasets).await?;
    tracing::info!(datasets = ?datasets, source = ?source, "Polling datasets");

    let state = AppState::with_in_memory_registry().context("Failed to register exporter metrics")?;
    let scheduler = Scheduler::new(
        api,
        state.shared_registry(),
        state.shared_exporter_metrics(),
        SchedulerSettings::from(&config),
        datasets,
        source,
    );

    let cancel = CancellationToken::new();
    let collector = tokio::spawn(scheduler.run(cancel.clone()));

    let app = create_router(state);
    let listener = match TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(e) => {
            cancel.cancel();
            let _ = collector.await;
            return Err(e).with_context(|| format!("Failed to bind {addr}"));
        }
    };

    tracing::info!(%addr, "Listening for connections");

    let shutdown = cancel.clone();
    let served = axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            tokio::select! {
                () = shutdown_signal() => shutdown.cancel(),
                () = shutdown.cancelled() => {}
            }
        })
        .await;

    cancel.cancel();
    if let Err(e) = collector.await {
        tracing::error!(error = %e, "Collection task failed");
    }
    served?;

    tracing::info!("Exporter shutdown complete");
    Ok(())
}

/// Runs a single collection cycle and returns the rendered exposition.
///
/// Used for one-off checks without starting the server.
///
/// # Errors
///
/// Returns an error if the configuration is invalid, dataset resolution
/// fails or the metrics cannot be encoded.
pub async fn collect_once(config: &Config) -> Result<(CycleReport, String)> {
    config
        .validate_config()
        .context("Invalid configuration")?;

    let api: Arc<dyn InstrumentApi> = Arc::new(build_client(config)?);
    let (datasets, source) = resolve_datasets(api.as_ref(), &config.datasets).await?;

    let state = AppState::with_in_memory_registry().context("Failed to register exporter metrics")?;
    let scheduler = Scheduler::new(
        api,
        state.shared_registry(),
        state.shared_exporter_metrics(),
        SchedulerSettings::from(config),
        datasets,
        source,
    );

    let report = scheduler.run_cycle().await;
    let body = metrics::encode_metrics(state.registry(), state.exporter_metrics())?;
    Ok((report, body))
}

/// Creates the application router with all routes and middleware.
///
/// This function is public to allow testing the router without starting a full server.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .merge(routes::health_routes())
        .merge(routes::metrics_routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Waits for a shutdown signal (SIGTERM or SIGINT).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received Ctrl+C, starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    fn app() -> Router {
        create_router(AppState::with_in_memory_registry().unwrap())
    }

    #[tokio::test]
    async fn test_health_endpoint_returns_200() {
        let response = app()
            .oneshot(
                Request::builder()
                    .uri("/health")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_health_endpoint_returns_json() {
        let response = app()
            .oneshot(
                Request::builder()
                    .uri("/health")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        let content_type = response
            .headers()
            .get("content-type")
            .and_then(|v| v.to_str().ok());

        assert!(content_type.is_some_and(|ct| ct.contains("application/json")));
    }

    #[tokio::test]
    async fn test_unknown_route_returns_404() {
        let response = app()
            .oneshot(
                Request::builder()
                    .uri("/bins")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_build_client_rejects_bad_url() {
        let config = Config::new("ftp://example.org");
        assert!(build_client(&config).is_err());
    }

    #[tokio::test]
    async fn test_run_rejects_invalid_config() {
        let mut config = Config::new("https://ifcb.caloos.org/api");
        config.interval_secs = 0;
        assert!(run_with_config(config).await.is_err());
    }
}
