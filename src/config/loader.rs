//! Configuration Loader - File Loading and Validation
//!
//! Handles loading `config.toml`, applying the `WALLET_BRIDGE_URL`
//! override, and validating every parameter with clear messages.

use std::path::Path;

use anyhow::{Context, Result};
use tracing::info;

use super::AppConfig;
use crate::domain::units::ETHER_DECIMALS;

/// Environment variable that replaces `provider.bridge_url`.
pub const BRIDGE_URL_ENV: &str = "WALLET_BRIDGE_URL";

/// Load and validate configuration from a TOML file.
///
/// # Errors
/// Returns detailed error if:
/// - File doesn't exist or can't be read
/// - TOML parsing fails
/// - Validation rules are violated
pub fn load_config(path: &str) -> Result<AppConfig> {
  let path = Path::new(path);

  let content = std::fs::read_to_string(path)
    .with_context(|| format!("Failed to read config file: {}", path.display()))?;

  let mut config = parse_config(&content)?;

  if let Ok(url) = std::env::var(BRIDGE_URL_ENV) {
    let url = url.trim();
    config.provider.bridge_url = (!url.is_empty()).then(|| url.to_string());
  }

  validate_config(&config)?;

  info!(
    name = %config.app.name,
    bridge = config.provider.bridge_url.is_some(),
    poll_ms = config.provider.poll_interval_ms,
    "Configuration loaded successfully"
  );

  Ok(config)
}

/// Parse configuration text without touching the environment.
pub fn parse_config(content: &str) -> Result<AppConfig> {
  toml::from_str(content).with_context(|| "Failed to parse config.toml")
}

/// Validate all configuration parameters.
pub fn validate_config(config: &AppConfig) -> Result<()> {
  anyhow::ensure!(!config.app.name.is_empty(), "app.name must not be empty");

  if let Some(url) = &config.provider.bridge_url {
    anyhow::ensure!(
      url.starts_with("http://") || url.starts_with("https://"),
      "provider.bridge_url must be an http(s) URL, got {url}"
    );
  }
  anyhow::ensure!(
    config.provider.timeout_ms > 0,
    "provider.timeout_ms must be positive"
  );
  anyhow::ensure!(
    config.provider.poll_interval_ms >= 100,
    "provider.poll_interval_ms must be at least 100, got {}",
    config.provider.poll_interval_ms
  );
  anyhow::ensure!(
    config.provider.disconnect_after_failures > 0,
    "provider.disconnect_after_failures must be positive"
  );

  anyhow::ensure!(
    config.session.event_buffer > 0,
    "session.event_buffer must be positive"
  );
  anyhow::ensure!(
    config.session.decimals == ETHER_DECIMALS,
    "session.decimals is fixed at {ETHER_DECIMALS}, got {}",
    config.session.decimals
  );

  anyhow::ensure!(
    !config.metrics.enabled || !config.metrics.bind_address.is_empty(),
    "metrics.bind_address must not be empty when metrics are enabled"
  );

  Ok(())
}
