//! Metrics and Monitoring Adapters
//!
//! Provides Prometheus metrics for the wallet session and the health
//! endpoints (/live, /ready, /metrics) via axum 0.7.

pub mod health;
pub mod prometheus;

pub use self::health::HealthServer;
pub use self::prometheus::MetricsRegistry;
