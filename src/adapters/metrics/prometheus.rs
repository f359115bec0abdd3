//! Prometheus Metrics Registry - Session Observability
//!
//! Implements the `SessionObserver` port with Prometheus counters and
//! gauges. Covers provider events, failed provider requests, reloads
//! and the connection state of the current session.

use std::sync::atomic::{AtomicBool, Ordering};

use prometheus::{Encoder, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};

use crate::domain::error::WalletError;
use crate::domain::events::ProviderEventKind;
use crate::domain::session::{Phase, SessionView};
use crate::ports::telemetry::SessionObserver;

/// Centralized Prometheus metrics for the wallet session.
///
/// All metrics follow the naming convention `wallet_session_*`.
pub struct MetricsRegistry {
    /// Prometheus registry.
    registry: Registry,
    /// Provider events consumed, by event name.
    pub events_total: IntCounterVec,
    /// Failed provider requests, by method and failure class.
    pub request_failures_total: IntCounterVec,
    /// Reloads requested by chain changes.
    pub reloads_total: IntCounter,
    /// Whether an account is connected (1 = connected).
    pub connected: IntGauge,
    /// Whether a provider was detected (1 = detected).
    pub provider_detected: IntGauge,
    /// Readiness flag for the health probe.
    ready: AtomicBool,
}

impl MetricsRegistry {
    /// Create and register all Prometheus metrics.
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let events_total = IntCounterVec::new(
            Opts::new("wallet_session_events_total", "Provider events consumed"),
            &["event"],
        )?;

        let request_failures_total = IntCounterVec::new(
            Opts::new(
                "wallet_session_request_failures_total",
                "Failed provider requests",
            ),
            &["method", "kind"],
        )?;

        let reloads_total = IntCounter::new(
            "wallet_session_reloads_total",
            "Full reloads requested by chain changes",
        )?;

        let connected = IntGauge::new(
            "wallet_session_connected",
            "Account connection status (1=connected, 0=disconnected)",
        )?;

        let provider_detected = IntGauge::new(
            "wallet_session_provider_detected",
            "Provider detection status (1=detected, 0=absent)",
        )?;

        // Register all metrics
        registry.register(Box::new(events_total.clone()))?;
        registry.register(Box::new(request_failures_total.clone()))?;
        registry.register(Box::new(reloads_total.clone()))?;
        registry.register(Box::new(connected.clone()))?;
        registry.register(Box::new(provider_detected.clone()))?;

        Ok(Self {
            registry,
            events_total,
            request_failures_total,
            reloads_total,
            connected,
            provider_detected,
            ready: AtomicBool::new(false),
        })
    }

    /// Whether the current session has a detected provider.
    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Relaxed)
    }

    /// Encode all metrics in the Prometheus text format.
    pub fn render(&self) -> String {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        if encoder.encode(&metric_families, &mut buffer).is_err() {
            return String::new();
        }
        String::from_utf8(buffer).unwrap_or_default()
    }
}

fn failure_kind(error: &WalletError) -> &'static str {
    match error {
        WalletError::UserRejected { .. } => "user_rejected",
        WalletError::Provider { .. } => "provider",
        WalletError::InvalidAmount(_) => "invalid_amount",
        WalletError::InvalidResponse { .. } => "invalid_response",
        WalletError::Unsupported(_) => "unsupported",
        WalletError::NoProvider => "no_provider",
    }
}

impl SessionObserver for MetricsRegistry {
    fn on_event(&self, kind: ProviderEventKind) {
        self.events_total.with_label_values(&[kind.as_str()]).inc();
    }

    fn on_request_failed(&self, method: &'static str, error: &WalletError) {
        self.request_failures_total
            .with_label_values(&[method, failure_kind(error)])
            .inc();
    }

    fn on_reload(&self) {
        self.reloads_total.inc();
    }

    fn on_session_changed(&self, view: &SessionView) {
        self.connected.set(i64::from(view.is_connected));
        let ready = view.phase == Phase::Ready;
        self.provider_detected.set(i64::from(ready));
        self.ready.store(ready, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::session::Session;

    #[test]
    fn test_counters_render() {
        let metrics = MetricsRegistry::new().unwrap();
        metrics.on_event(ProviderEventKind::AccountsChanged);
        metrics.on_event(ProviderEventKind::AccountsChanged);
        metrics.on_request_failed(
            "eth_requestAccounts",
            &WalletError::from_rpc(4001, "User rejected"),
        );
        metrics.on_reload();

        assert_eq!(
            metrics
                .events_total
                .with_label_values(&["accountsChanged"])
                .get(),
            2
        );
        assert_eq!(metrics.reloads_total.get(), 1);

        let text = metrics.render();
        assert!(text.contains("wallet_session_events_total"));
        assert!(text.contains("user_rejected"));
    }

    #[test]
    fn test_session_gauges_follow_view() {
        let metrics = MetricsRegistry::new().unwrap();
        let mut session = Session::new();
        metrics.on_session_changed(&session.view());
        assert!(!metrics.is_ready());

        session.set_phase(Phase::Ready);
        session.apply_account("0xabc");
        metrics.on_session_changed(&session.view());
        assert!(metrics.is_ready());
        assert_eq!(metrics.connected.get(), 1);
        assert_eq!(metrics.provider_detected.get(), 1);
    }
}
