//! Health Check Server - Liveness, Readiness and Metrics
//!
//! Exposes /live, /ready and /metrics via axum 0.7. Readiness
//! reflects whether the current session has a detected provider.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use tokio::sync::broadcast;
use tracing::{info, instrument};

use super::prometheus::MetricsRegistry;

/// Axum-based health and metrics HTTP server.
pub struct HealthServer {
    /// Metrics shared with the session observer.
    metrics: Arc<MetricsRegistry>,
    /// Bind address (from config).
    bind_address: String,
}

impl HealthServer {
    /// Create a new health server.
    pub fn new(metrics: Arc<MetricsRegistry>, bind_address: impl Into<String>) -> Self {
        Self {
            metrics,
            bind_address: bind_address.into(),
        }
    }

    /// Router with all endpoints.
    pub fn router(&self) -> Router {
        Router::new()
            .route("/live", get(Self::liveness))
            .route("/ready", get(Self::readiness))
            .route("/metrics", get(Self::metrics))
            .with_state(Arc::clone(&self.metrics))
    }

    /// Serve until shutdown.
    #[instrument(skip(self, shutdown_rx))]
    pub async fn run(self, mut shutdown_rx: broadcast::Receiver<()>) -> anyhow::Result<()> {
        let app = self.router();

        let listener = tokio::net::TcpListener::bind(&self.bind_address).await?;
        info!(address = %self.bind_address, "Health server started");

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.recv().await;
            })
            .await?;

        Ok(())
    }

    /// Liveness probe: always returns 200 if the process is running.
    async fn liveness() -> impl IntoResponse {
        (StatusCode::OK, "OK")
    }

    /// Readiness probe: 200 only while a provider is detected.
    async fn readiness(State(metrics): State<Arc<MetricsRegistry>>) -> impl IntoResponse {
        if metrics.is_ready() {
            (StatusCode::OK, "READY")
        } else {
            (StatusCode::SERVICE_UNAVAILABLE, "NOT READY")
        }
    }

    /// Prometheus text exposition.
    async fn metrics(State(metrics): State<Arc<MetricsRegistry>>) -> impl IntoResponse {
        metrics.render()
    }
}
