//! Configuration Module - TOML-based Application Configuration
//!
//! Loads and validates configuration from `config.toml` with an
//! environment override for the wallet bridge endpoint.
//! The session core never reads the environment itself; everything
//! it needs is passed in through `SessionConfig`.

pub mod loader;

use serde::Deserialize;

use crate::domain::units::ETHER_DECIMALS;

/// Top-level application configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
  /// Application identity and logging.
  pub app: AppSection,
  /// Wallet provider bridge settings.
  #[serde(default)]
  pub provider: ProviderConfig,
  /// Session core settings.
  #[serde(default)]
  pub session: SessionConfig,
  /// Metrics and health endpoints.
  #[serde(default)]
  pub metrics: MetricsConfig,
}

/// Application identity configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AppSection {
  /// Human-readable application name.
  pub name: String,
  /// Log level (trace, debug, info, warn, error).
  #[serde(default = "default_log_level")]
  pub log_level: String,
}

/// Wallet bridge configuration.
///
/// An absent `bridge_url` means no provider is injected; sessions
/// end up in the no-provider state.
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderConfig {
  /// JSON-RPC endpoint of the wallet bridge.
  pub bridge_url: Option<String>,
  /// Per-request timeout in milliseconds.
  #[serde(default = "default_timeout_ms")]
  pub timeout_ms: u64,
  /// Retries on transport errors (never for prompting requests).
  #[serde(default = "default_max_retries")]
  pub max_retries: u32,
  /// Event poller interval in milliseconds.
  #[serde(default = "default_poll_interval_ms")]
  pub poll_interval_ms: u64,
  /// Consecutive poll failures before a disconnect event.
  #[serde(default = "default_disconnect_after")]
  pub disconnect_after_failures: u32,
}

impl Default for ProviderConfig {
  fn default() -> Self {
    Self {
      bridge_url: None,
      timeout_ms: default_timeout_ms(),
      max_retries: default_max_retries(),
      poll_interval_ms: default_poll_interval_ms(),
      disconnect_after_failures: default_disconnect_after(),
    }
  }
}

/// Session core configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
  /// Capacity of the bounded provider event channel.
  #[serde(default = "default_event_buffer")]
  pub event_buffer: usize,
  /// Decimal places of the balance unit (fixed at 18).
  #[serde(default = "default_decimals")]
  pub decimals: u32,
}

impl Default for SessionConfig {
  fn default() -> Self {
    Self {
      event_buffer: default_event_buffer(),
      decimals: default_decimals(),
    }
  }
}

/// Metrics and monitoring configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
  /// Serve `/live`, `/ready` and `/metrics`.
  #[serde(default = "default_true")]
  pub enabled: bool,
  /// Bind address for the metrics server.
  #[serde(default = "default_metrics_addr")]
  pub bind_address: String,
}

impl Default for MetricsConfig {
  fn default() -> Self {
    Self {
      enabled: default_true(),
      bind_address: default_metrics_addr(),
    }
  }
}

// Default value functions for serde

fn default_log_level() -> String {
  "info".to_string()
}

fn default_true() -> bool {
  true
}

fn default_timeout_ms() -> u64 {
  10_000
}

fn default_max_retries() -> u32 {
  2
}

fn default_poll_interval_ms() -> u64 {
  1_000
}

fn default_disconnect_after() -> u32 {
  3
}

fn default_event_buffer() -> usize {
  64
}

fn default_decimals() -> u32 {
  ETHER_DECIMALS
}

fn default_metrics_addr() -> String {
  "0.0.0.0:9090".to_string()
}
