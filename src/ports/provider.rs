//! Provider Port - Wallet Provider Gateway Interface
//!
//! Defines the contract the session core consumes from the injected
//! wallet provider: request issuance, event subscription, and detection
//! with an identity check against the host's global provider handle.
//!
//! Method names and parameter shapes follow the EIP-1193 / JSON-RPC
//! convention and must match exactly.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Value, json};
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::domain::error::WalletError;
use crate::domain::events::{AccountAddress, ProviderEvent, ProviderEventKind};

/// Block tag used for balance queries.
pub const LATEST_BLOCK: &str = "latest";

/// The provider requests issued by the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RpcRequest {
  /// `eth_chainId` — current chain id as a hex string.
  ChainId,
  /// `eth_accounts` — exposed accounts, never prompts.
  Accounts,
  /// `eth_requestAccounts` — may prompt the user, may be rejected.
  RequestAccounts,
  /// `eth_getBalance` — balance in base units at the latest block.
  GetBalance {
    /// Address to query.
    address: AccountAddress,
  },
}

impl RpcRequest {
  /// JSON-RPC method name.
  pub fn method(&self) -> &'static str {
    match self {
      Self::ChainId => "eth_chainId",
      Self::Accounts => "eth_accounts",
      Self::RequestAccounts => "eth_requestAccounts",
      Self::GetBalance { .. } => "eth_getBalance",
    }
  }

  /// JSON-RPC params array.
  pub fn params(&self) -> Value {
    match self {
      Self::ChainId | Self::Accounts | Self::RequestAccounts => json!([]),
      Self::GetBalance { address } => json!([address, LATEST_BLOCK]),
    }
  }

  /// Whether the request can surface a permission prompt.
  ///
  /// Prompting requests are never retried by adapters.
  pub fn is_prompting(&self) -> bool {
    matches!(self, Self::RequestAccounts)
  }
}

/// Trait for the injected wallet provider.
///
/// At most one sink per event kind is active; subscribing again for the
/// same kind replaces the previous sink.
#[async_trait]
pub trait ProviderGateway: Send + Sync + 'static {
  /// Issue a request and wait for the provider's answer.
  ///
  /// # Errors
  /// `UserRejected` when the user declines a prompt, `Provider` for any
  /// other rejection.
  async fn request(&self, request: RpcRequest) -> Result<Value, WalletError>;

  /// Route events of `kind` into `sink`.
  fn subscribe(
    &self,
    kind: ProviderEventKind,
    sink: mpsc::Sender<ProviderEvent>,
  ) -> Result<(), WalletError>;

  /// Stop routing events of `kind`.
  ///
  /// Providers without unsubscription return `Unsupported`; callers
  /// treat that as a no-op.
  fn unsubscribe(&self, kind: ProviderEventKind) -> Result<(), WalletError>;
}

/// The environment a provider is injected into.
#[async_trait]
pub trait ProviderHost: Send + Sync + 'static {
  /// Concrete provider type exposed by this host.
  type Gateway: ProviderGateway;

  /// Probe the environment for an injected provider.
  async fn probe(&self) -> Option<Arc<Self::Gateway>>;

  /// The environment's canonical provider handle.
  fn global_handle(&self) -> Option<Arc<Self::Gateway>>;
}

/// Detect the injected provider.
///
/// The probed provider is accepted only if it is the very same object as
/// the host's global handle; a different object is treated as a spoofed
/// injection. A missing provider is the normal "no wallet installed"
/// outcome, not an error.
pub async fn detect<H: ProviderHost>(host: &H) -> Option<Arc<H::Gateway>> {
  let Some(candidate) = host.probe().await else {
    info!("Please install MetaMask! No wallet provider detected");
    return None;
  };

  match host.global_handle() {
    Some(global) if Arc::ptr_eq(&candidate, &global) => {
      info!("Wallet provider is available");
      Some(candidate)
    }
    Some(_) => {
      warn!("Probed provider is not the global provider handle, ignoring it");
      None
    }
    None => {
      warn!("Probed provider found but no global provider handle is set");
      None
    }
  }
}
