//! Event Poller - Push Events from a Pull-only Bridge
//!
//! A JSON-RPC bridge cannot push `accountsChanged` / `chainChanged` /
//! `disconnect` notifications, so the poller samples `eth_chainId` and
//! `eth_accounts` on an interval and dispatches the differences as
//! provider events into the registered sinks.
//!
//! - accounts differ from the last sample → `AccountsChanged`
//! - chain id differs from the last sample → `ChainChanged`
//! - N consecutive failed samples → one `Disconnected`
//! - first good sample after a disconnect → `ChainChanged(current)`,
//!   which makes the session reinitialize

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tracing::{debug, info, instrument, warn};

use super::client::BridgeClient;
use crate::config::ProviderConfig;
use crate::domain::error::WalletError;
use crate::domain::events::{AccountAddress, ChainId, ProviderEvent};
use crate::ports::provider::RpcRequest;

/// What one sample of the bridge looked like.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Sample {
    Ok {
        chain_id: ChainId,
        accounts: Vec<AccountAddress>,
    },
    Failed(String),
}

/// Diffing state, independent of any transport.
#[derive(Debug)]
pub struct ChangeDetector {
    last_chain: Option<ChainId>,
    last_accounts: Option<Vec<AccountAddress>>,
    failures: u32,
    disconnect_after: u32,
    disconnected: bool,
}

impl ChangeDetector {
    pub fn new(disconnect_after: u32) -> Self {
        Self {
            last_chain: None,
            last_accounts: None,
            failures: 0,
            disconnect_after: disconnect_after.max(1),
            disconnected: false,
        }
    }

    /// Feed one sample, returning the events to dispatch in order.
    ///
    /// The first good sample reports the accounts (the session handler is
    /// idempotent) but never a chain change.
    pub fn observe(&mut self, sample: Sample) -> Vec<ProviderEvent> {
        match sample {
            Sample::Failed(reason) => {
                self.failures += 1;
                if self.failures >= self.disconnect_after && !self.disconnected {
                    self.disconnected = true;
                    return vec![ProviderEvent::Disconnected(reason)];
                }
                Vec::new()
            }
            Sample::Ok { chain_id, accounts } => {
                self.failures = 0;
                if self.disconnected {
                    self.disconnected = false;
                    self.last_chain = Some(chain_id.clone());
                    self.last_accounts = Some(accounts);
                    return vec![ProviderEvent::ChainChanged(chain_id)];
                }

                let mut events = Vec::new();
                if self.last_chain.as_ref().is_some_and(|last| *last != chain_id) {
                    events.push(ProviderEvent::ChainChanged(chain_id.clone()));
                }
                if self.last_accounts.as_ref() != Some(&accounts) {
                    events.push(ProviderEvent::AccountsChanged(accounts.clone()));
                }
                self.last_chain = Some(chain_id);
                self.last_accounts = Some(accounts);
                events
            }
        }
    }
}

/// Polls the bridge and dispatches provider events.
pub struct EventPoller {
    client: Arc<BridgeClient>,
    detector: ChangeDetector,
    interval: Duration,
}

impl EventPoller {
    pub fn new(client: Arc<BridgeClient>, config: &ProviderConfig) -> Self {
        Self {
            client,
            detector: ChangeDetector::new(config.disconnect_after_failures),
            interval: Duration::from_millis(config.poll_interval_ms),
        }
    }

    /// Poll until shutdown.
    #[instrument(skip_all, fields(bridge = %self.client.url()))]
    pub async fn run(&mut self, mut shutdown_rx: broadcast::Receiver<()>) -> anyhow::Result<()> {
        info!(interval_ms = self.interval.as_millis(), "Event poller started");

        loop {
            tokio::select! {
                biased;
                _ = shutdown_rx.recv() => {
                    info!("Event poller shutting down");
                    return Ok(());
                }
                _ = tokio::time::sleep(self.interval) => {
                    let sample = self.sample().await;
                    for event in self.detector.observe(sample) {
                        let kind = event.kind();
                        if !self.client.sinks().dispatch(event).await {
                            debug!(event = %kind, "Event not delivered");
                        }
                    }
                }
            }
        }
    }

    async fn sample(&self) -> Sample {
        match self.read_state().await {
            Ok((chain_id, accounts)) => Sample::Ok { chain_id, accounts },
            Err(e) => {
                warn!(error = %e, "Bridge poll failed");
                Sample::Failed(e.to_string())
            }
        }
    }

    async fn read_state(&self) -> Result<(ChainId, Vec<AccountAddress>), WalletError> {
        let chain = self.client.call(&RpcRequest::ChainId).await?;
        let chain_id = chain
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| WalletError::InvalidResponse {
                method: "eth_chainId",
                reason: format!("expected string, got {chain}"),
            })?;

        let accounts = self.client.call(&RpcRequest::Accounts).await?;
        let accounts = serde_json::from_value(accounts).map_err(|e| WalletError::InvalidResponse {
            method: "eth_accounts",
            reason: e.to_string(),
        })?;

        Ok((chain_id, accounts))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ok(chain: &str, accounts: &[&str]) -> Sample {
        Sample::Ok {
            chain_id: chain.to_string(),
            accounts: accounts.iter().map(|a| (*a).to_string()).collect(),
        }
    }

    #[test]
    fn test_first_sample_reports_accounts_only() {
        let mut detector = ChangeDetector::new(3);
        let events = detector.observe(ok("0x1", &["0xabc"]));
        assert_eq!(events, vec![ProviderEvent::AccountsChanged(vec!["0xabc".into()])]);
    }

    #[test]
    fn test_unchanged_sample_is_silent() {
        let mut detector = ChangeDetector::new(3);
        detector.observe(ok("0x1", &["0xabc"]));
        assert!(detector.observe(ok("0x1", &["0xabc"])).is_empty());
    }

    #[test]
    fn test_chain_and_account_changes() {
        let mut detector = ChangeDetector::new(3);
        detector.observe(ok("0x1", &["0xabc"]));
        assert_eq!(
            detector.observe(ok("0x89", &["0xabc"])),
            vec![ProviderEvent::ChainChanged("0x89".into())]
        );
        assert_eq!(
            detector.observe(ok("0x89", &[])),
            vec![ProviderEvent::AccountsChanged(vec![])]
        );
    }

    #[test]
    fn test_disconnect_after_consecutive_failures() {
        let mut detector = ChangeDetector::new(2);
        detector.observe(ok("0x1", &["0xabc"]));
        assert!(detector.observe(Sample::Failed("down".into())).is_empty());
        assert_eq!(
            detector.observe(Sample::Failed("down".into())),
            vec![ProviderEvent::Disconnected("down".into())]
        );
        // Only once per outage
        assert!(detector.observe(Sample::Failed("down".into())).is_empty());
        // Recovery forces reinitialization
        assert_eq!(
            detector.observe(ok("0x1", &["0xabc"])),
            vec![ProviderEvent::ChainChanged("0x1".into())]
        );
        assert!(detector.observe(ok("0x1", &["0xabc"])).is_empty());
    }

    #[test]
    fn test_success_resets_failure_count() {
        let mut detector = ChangeDetector::new(2);
        detector.observe(Sample::Failed("blip".into()));
        detector.observe(ok("0x1", &[]));
        assert!(detector.observe(Sample::Failed("blip".into())).is_empty());
    }
}
