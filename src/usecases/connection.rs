//! Connection State Machine Use Case - Provider Session Synchronization
//!
//! Owns the canonical `Session` and reconciles it with the provider's
//! push-driven event stream and the presenter's user actions.
//!
//! Transitions:
//! 1. Initialize: detect → `eth_chainId` → `eth_accounts` → subscribe
//! 2. AccountsChanged: clear, switch (+ detached balance refresh), or no-op
//! 3. ChainChanged: record chain id, request a full reload
//! 4. Disconnected: clear account, chain and balance
//! 5. ConnectRequested: `eth_requestAccounts` → transition 2
//! 6. FetchBalanceRequested: `eth_getBalance` for any address
//!
//! Late responses are guarded by the session's account epoch: a result
//! is applied only if no account change happened since it was requested.
//! Automatic balance refreshes run as separate tasks so the event loop
//! keeps applying events while a query is in flight.

use std::sync::{Arc, OnceLock};

use rust_decimal::Decimal;
use serde_json::Value;
use tokio::sync::{Mutex, RwLock, broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{Instrument, debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::config::SessionConfig;
use crate::domain::error::WalletError;
use crate::domain::events::{AccountAddress, Effect, ProviderEvent, ProviderEventKind};
use crate::domain::session::{Phase, Session, SessionView};
use crate::domain::units::to_display_units;
use crate::ports::provider::{ProviderGateway, ProviderHost, RpcRequest, detect};
use crate::ports::telemetry::{NoopObserver, SessionObserver};

/// Outcome of a connect request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectOutcome {
  /// The provider exposed this account (new or already active).
  Connected(AccountAddress),
  /// The provider granted access but exposed no account.
  NoAccounts,
  /// The user declined the prompt; state unchanged.
  Rejected,
  /// An account change landed while the request was pending; the
  /// response was discarded.
  Superseded,
}

/// Why the event loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionExit {
  /// A chain change requested a full reload.
  Reload,
  /// Host shutdown.
  Shutdown,
  /// The provider dropped every event sink.
  ProviderClosed,
}

/// Session state shared with detached balance refreshes.
struct SessionCell {
  /// Canonical session state. Never held across an await.
  session: RwLock<Session>,
  /// Presenter-facing snapshot channel.
  view_tx: watch::Sender<SessionView>,
  /// Observation hooks (metrics).
  observer: Arc<dyn SessionObserver>,
  decimals: u32,
}

impl SessionCell {
  fn publish(&self, session: &Session) {
    let view = session.view();
    self.observer.on_session_changed(&view);
    self.view_tx.send_replace(view);
  }

  /// Show a failed user action. Only provider failures are surfaced.
  async fn record_error(&self, error: &WalletError) {
    if !error.is_provider_failure() {
      return;
    }
    let mut session = self.session.write().await;
    session.set_last_error(Some(error.to_string()));
    self.publish(&session);
  }

  async fn clear_error(&self) {
    let mut session = self.session.write().await;
    session.set_last_error(None);
    self.publish(&session);
  }

  async fn call<G: ProviderGateway>(
    &self,
    gateway: &G,
    request: RpcRequest,
  ) -> Result<Value, WalletError> {
    let method = request.method();
    let result = gateway.request(request).await;
    if let Err(e) = &result {
      self.observer.on_request_failed(method, e);
    }
    result
  }

  async fn request_balance<G: ProviderGateway>(
    &self,
    gateway: &G,
    address: &str,
  ) -> Result<Decimal, WalletError> {
    let request = RpcRequest::GetBalance {
      address: address.to_string(),
    };
    let value = self.call(gateway, request).await?;
    let raw = decode_quantity(value)?;
    debug!(address = %address, raw = %raw, "Balance");
    let result = to_display_units(&raw, self.decimals);
    if let Err(e) = &result {
      self.observer.on_request_failed("eth_getBalance", e);
    }
    result
  }

  /// Fetch the balance of the active account.
  ///
  /// Failures leave the balance absent; the next account change or an
  /// explicit fetch retries.
  async fn refresh_balance<G: ProviderGateway>(
    self: Arc<Self>,
    gateway: Arc<G>,
    account: AccountAddress,
    epoch: u64,
  ) {
    let balance = match self.request_balance(gateway.as_ref(), &account).await {
      Ok(balance) => balance,
      Err(e) => {
        warn!(account = %account, error = %e, "Error fetching balance");
        return;
      }
    };

    let mut session = self.session.write().await;
    if session.account() != Some(account.as_str()) || session.account_epoch() != epoch {
      debug!(account = %account, "Discarding balance for inactive account");
      return;
    }
    session.set_balance(balance);
    info!(account = %account, balance = %balance, "Balance updated");
    self.publish(&session);
  }
}

/// Session state machine driven by provider events and user actions.
pub struct ConnectionStateMachine<G: ProviderGateway> {
  /// Provider bound at detection time.
  gateway: OnceLock<Arc<G>>,
  cell: Arc<SessionCell>,
  /// Latest automatic balance refresh.
  refresh: Mutex<Option<JoinHandle<()>>>,
  config: SessionConfig,
  session_id: Uuid,
}

impl<G: ProviderGateway> ConnectionStateMachine<G> {
  /// Mount a fresh session with all fields absent.
  pub fn new(config: SessionConfig) -> Self {
    Self::with_observer(config, Arc::new(NoopObserver))
  }

  /// Mount a fresh session reporting to `observer`.
  pub fn with_observer(config: SessionConfig, observer: Arc<dyn SessionObserver>) -> Self {
    let session = Session::new();
    let session_id = session.id();
    let (view_tx, _) = watch::channel(session.view());
    Self {
      gateway: OnceLock::new(),
      cell: Arc::new(SessionCell {
        session: RwLock::new(session),
        view_tx,
        observer,
        decimals: config.decimals,
      }),
      refresh: Mutex::new(None),
      config,
      session_id,
    }
  }

  /// Session identifier (fresh on every mount).
  pub fn session_id(&self) -> Uuid {
    self.session_id
  }

  /// Current read surface.
  pub async fn view(&self) -> SessionView {
    self.cell.session.read().await.view()
  }

  /// Receive a new snapshot after every change.
  pub fn subscribe_view(&self) -> watch::Receiver<SessionView> {
    self.cell.view_tx.subscribe()
  }

  /// Wait for the latest automatic balance refresh to finish.
  pub async fn wait_for_refresh(&self) {
    let task = self.refresh.lock().await.take();
    if let Some(task) = task {
      if let Err(e) = task.await {
        if !e.is_cancelled() {
          error!(error = %e, "Balance refresh task failed");
        }
      }
    }
  }

  // ── Transition 1: Initialize ───────────────────────────────

  /// Detect the provider and establish the initial state.
  ///
  /// Returns the event stream to feed into [`Self::run`], or `None`
  /// when no provider was detected (terminal for this session).
  #[instrument(skip_all, fields(session = %self.session_id))]
  pub async fn initialize<H>(&self, host: &H) -> Option<mpsc::Receiver<ProviderEvent>>
  where
    H: ProviderHost<Gateway = G>,
  {
    {
      let mut session = self.cell.session.write().await;
      if session.phase() != Phase::Uninitialized {
        warn!(phase = ?session.phase(), "Session already initialized");
        return None;
      }
      session.set_phase(Phase::Detecting);
      self.cell.publish(&session);
    }

    let Some(gateway) = detect(host).await else {
      let mut session = self.cell.session.write().await;
      session.set_phase(Phase::NoProvider);
      self.cell.publish(&session);
      return None;
    };
    let gateway = Arc::clone(self.gateway.get_or_init(|| gateway));

    match self.request_chain_id(&gateway).await {
      Ok(chain_id) => {
        info!(chain_id = %chain_id, "Initial chain id");
        let mut session = self.cell.session.write().await;
        session.set_chain_id(Some(chain_id));
        self.cell.publish(&session);
      }
      Err(e) => warn!(error = %e, "Failed to read initial chain id"),
    }

    match self.request_accounts(&gateway, RpcRequest::Accounts).await {
      Ok(accounts) => self.handle_accounts_changed(accounts).await,
      Err(e) => warn!(error = %e, "Failed to read initial accounts"),
    }

    let (tx, rx) = mpsc::channel(self.config.event_buffer);
    for kind in ProviderEventKind::ALL {
      if let Err(e) = gateway.subscribe(kind, tx.clone()) {
        error!(event = %kind, error = %e, "Failed to subscribe to provider event");
      }
    }

    {
      let mut session = self.cell.session.write().await;
      session.set_phase(Phase::Ready);
      self.cell.publish(&session);
    }
    info!("Session ready");

    Some(rx)
  }

  // ── Event dispatch ─────────────────────────────────────────

  /// Apply one provider event and return the effect the host must run.
  pub async fn handle_event(&self, event: ProviderEvent) -> Effect {
    self.cell.observer.on_event(event.kind());
    match event {
      ProviderEvent::AccountsChanged(accounts) => {
        self.handle_accounts_changed(accounts).await;
        Effect::None
      }
      ProviderEvent::ChainChanged(chain_id) => self.handle_chain_changed(chain_id).await,
      ProviderEvent::Disconnected(reason) => {
        self.handle_disconnected(&reason).await;
        Effect::None
      }
    }
  }

  /// Consume provider events until a reload, shutdown or closed stream.
  #[instrument(skip_all, fields(session = %self.session_id))]
  pub async fn run(
    &self,
    mut events: mpsc::Receiver<ProviderEvent>,
    mut shutdown_rx: broadcast::Receiver<()>,
  ) -> SessionExit {
    loop {
      tokio::select! {
        biased;
        _ = shutdown_rx.recv() => {
          info!("Session received shutdown signal");
          return SessionExit::Shutdown;
        }
        event = events.recv() => {
          let Some(event) = event else {
            warn!("Provider event stream closed");
            return SessionExit::ProviderClosed;
          };
          if self.handle_event(event).await == Effect::Reload {
            return SessionExit::Reload;
          }
        }
      }
    }
  }

  // ── Transition 2: AccountsChanged ──────────────────────────

  /// Reconcile the exposed accounts with the session.
  ///
  /// A switch starts a balance refresh in the background; see
  /// [`Self::wait_for_refresh`].
  pub async fn handle_accounts_changed(&self, accounts: Vec<AccountAddress>) {
    self.apply_accounts(&accounts, None).await;
  }

  /// Apply an accounts list. With `issued_at`, the list is dropped if the
  /// account epoch moved since the request was issued.
  ///
  /// Returns `false` when the list was discarded as stale.
  async fn apply_accounts(&self, accounts: &[AccountAddress], issued_at: Option<u64>) -> bool {
    let (account, epoch) = {
      let mut session = self.cell.session.write().await;
      if issued_at.is_some_and(|epoch| epoch != session.account_epoch()) {
        debug!("Discarding stale accounts response");
        return false;
      }

      let Some(first) = accounts.first() else {
        if session.is_connected() {
          info!("Please connect to MetaMask. No accounts exposed");
        }
        session.clear_account();
        self.cell.publish(&session);
        return true;
      };

      if !session.apply_account(first) {
        debug!(account = %first, "Account unchanged");
        return true;
      }
      info!(account = %first, "Active account changed");
      self.cell.publish(&session);
      (first.clone(), session.account_epoch())
    };

    self.spawn_refresh(account, epoch).await;
    true
  }

  /// Start the balance refresh for a newly active account.
  ///
  /// An older refresh still in flight is left to finish; the epoch check
  /// in `refresh_balance` drops its result.
  async fn spawn_refresh(&self, account: AccountAddress, epoch: u64) {
    let Some(gateway) = self.gateway.get() else {
      return;
    };
    let task = tokio::spawn(
      Arc::clone(&self.cell)
        .refresh_balance(Arc::clone(gateway), account, epoch)
        .in_current_span(),
    );
    let previous = self.refresh.lock().await.replace(task);
    if previous.is_some_and(|task| !task.is_finished()) {
      debug!("Superseding in-flight balance refresh");
    }
  }

  // ── Transition 3: ChainChanged ─────────────────────────────

  /// Record the new chain and request a full reload, every time.
  pub async fn handle_chain_changed(&self, chain_id: String) -> Effect {
    info!(chain_id = %chain_id, "Chain changed, reloading");
    {
      let mut session = self.cell.session.write().await;
      session.set_chain_id(Some(chain_id));
      self.cell.publish(&session);
    }
    self.cell.observer.on_reload();
    Effect::Reload
  }

  // ── Transition 4: Disconnected ─────────────────────────────

  /// Clear account, chain id and balance.
  pub async fn handle_disconnected(&self, reason: &str) {
    info!(reason = %reason, "Disconnected from wallet provider");
    let mut session = self.cell.session.write().await;
    session.disconnect();
    self.cell.publish(&session);
  }

  // ── Transition 5: ConnectRequested ─────────────────────────

  /// Ask the provider for account access (may prompt the user).
  ///
  /// # Errors
  /// `NoProvider` without a detected provider; provider failures other
  /// than a user rejection are returned and recorded as `last_error`.
  #[instrument(skip_all, fields(session = %self.session_id))]
  pub async fn connect_wallet(&self) -> Result<ConnectOutcome, WalletError> {
    let gateway = self.ready_gateway().await?;
    let issued_at = self.cell.session.read().await.account_epoch();

    let accounts = match self.request_accounts(&gateway, RpcRequest::RequestAccounts).await {
      Ok(accounts) => accounts,
      Err(e) if e.is_user_rejection() => {
        info!(error = %e, "User rejected the connection request");
        return Ok(ConnectOutcome::Rejected);
      }
      Err(e) => {
        error!(error = %e, "Connection request failed");
        self.cell.record_error(&e).await;
        return Err(e);
      }
    };

    self.cell.clear_error().await;
    if !self.apply_accounts(&accounts, Some(issued_at)).await {
      return Ok(ConnectOutcome::Superseded);
    }
    Ok(accounts
      .into_iter()
      .next()
      .map_or(ConnectOutcome::NoAccounts, ConnectOutcome::Connected))
  }

  // ── Transition 6: FetchBalanceRequested ────────────────────

  /// Update the address typed by the user.
  pub async fn set_input_address(&self, value: impl Into<String>) {
    let mut session = self.cell.session.write().await;
    session.set_input_address(value);
    self.cell.publish(&session);
  }

  /// Query the balance of any address and show it.
  ///
  /// The value is stored while an account is connected and no account
  /// change happened during the request; it is returned either way.
  ///
  /// # Errors
  /// Provider failures leave the previous balance in place and are
  /// recorded as `last_error`.
  #[instrument(skip_all, fields(session = %self.session_id, address = %address))]
  pub async fn fetch_balance(&self, address: &str) -> Result<Decimal, WalletError> {
    let gateway = self.ready_gateway().await?;
    let issued_at = self.cell.session.read().await.account_epoch();

    let balance = match self.cell.request_balance(gateway.as_ref(), address).await {
      Ok(balance) => balance,
      Err(e) => {
        error!(error = %e, "Error fetching balance");
        self.cell.record_error(&e).await;
        return Err(e);
      }
    };

    let mut session = self.cell.session.write().await;
    session.set_last_error(None);
    if session.account_epoch() != issued_at {
      debug!("Account changed during balance query, not storing");
    } else if session.set_balance(balance) {
      info!(balance = %balance, "Balance updated");
    } else {
      debug!(status = ?session.status(), "No connected account, balance not stored");
    }
    self.cell.publish(&session);
    Ok(balance)
  }

  /// Fetch the balance of the current input address.
  ///
  /// # Errors
  /// See [`Self::fetch_balance`].
  pub async fn fetch_input_balance(&self) -> Result<Decimal, WalletError> {
    let address = self.cell.session.read().await.input_address().to_string();
    self.fetch_balance(&address).await
  }

  // ── Teardown ───────────────────────────────────────────────

  /// Unregister every event handler and stop the pending refresh.
  /// Never fails.
  #[instrument(skip_all, fields(session = %self.session_id))]
  pub async fn teardown(&self) {
    if let Some(task) = self.refresh.lock().await.take() {
      task.abort();
    }

    if let Some(gateway) = self.gateway.get() {
      for kind in ProviderEventKind::ALL {
        match gateway.unsubscribe(kind) {
          Ok(()) => {}
          Err(WalletError::Unsupported(what)) => {
            debug!(event = %kind, what, "Provider has no unsubscription, skipping");
          }
          Err(e) => warn!(event = %kind, error = %e, "Failed to unsubscribe"),
        }
      }
    }

    self.cell.clear_error().await;
    info!("Session torn down");
  }

  // ── Provider requests ──────────────────────────────────────

  async fn ready_gateway(&self) -> Result<Arc<G>, WalletError> {
    let phase = self.cell.session.read().await.phase();
    match (phase, self.gateway.get()) {
      (Phase::Ready, Some(gateway)) => Ok(Arc::clone(gateway)),
      _ => Err(WalletError::NoProvider),
    }
  }

  async fn request_chain_id(&self, gateway: &G) -> Result<String, WalletError> {
    let value = self.cell.call(gateway, RpcRequest::ChainId).await?;
    decode_chain_id(value)
  }

  async fn request_accounts(
    &self,
    gateway: &G,
    request: RpcRequest,
  ) -> Result<Vec<AccountAddress>, WalletError> {
    let method = request.method();
    let value = self.cell.call(gateway, request).await?;
    decode_accounts(method, value)
  }
}

fn decode_chain_id(value: Value) -> Result<String, WalletError> {
  match value {
    Value::String(chain_id) if !chain_id.is_empty() => Ok(chain_id),
    other => Err(WalletError::InvalidResponse {
      method: "eth_chainId",
      reason: format!("expected chain id string, got {other}"),
    }),
  }
}

fn decode_accounts(method: &'static str, value: Value) -> Result<Vec<AccountAddress>, WalletError> {
  serde_json::from_value(value).map_err(|e| WalletError::InvalidResponse {
    method,
    reason: e.to_string(),
  })
}

fn decode_quantity(value: Value) -> Result<String, WalletError> {
  match value {
    Value::String(raw) => Ok(raw),
    Value::Number(n) if n.is_u64() => Ok(n.to_string()),
    other => Err(WalletError::InvalidAmount(format!(
      "expected quantity string, got {other}"
    ))),
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn test_decode_chain_id() {
    assert_eq!(decode_chain_id(json!("0x89")).unwrap(), "0x89");
    assert!(decode_chain_id(json!(137)).is_err());
    assert!(decode_chain_id(json!("")).is_err());
  }

  #[test]
  fn test_decode_accounts() {
    assert_eq!(
      decode_accounts("eth_accounts", json!(["0xabc", "0xdef"])).unwrap(),
      vec!["0xabc".to_string(), "0xdef".to_string()]
    );
    assert!(decode_accounts("eth_accounts", json!([])).unwrap().is_empty());
    let err = decode_accounts("eth_accounts", json!("0xabc")).unwrap_err();
    assert!(matches!(err, WalletError::InvalidResponse { method: "eth_accounts", .. }));
  }

  #[test]
  fn test_decode_quantity() {
    assert_eq!(decode_quantity(json!("0x10")).unwrap(), "0x10");
    assert_eq!(decode_quantity(json!(42)).unwrap(), "42");
    assert!(matches!(
      decode_quantity(json!(null)),
      Err(WalletError::InvalidAmount(_))
    ));
  }
}
