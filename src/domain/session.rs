//! Session state owned by the connection state machine.
//!
//! `Session` is the single mutable record of the provider connection.
//! Only the state machine mutates it; everything else reads a
//! `SessionView` snapshot.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use super::events::{AccountAddress, ChainId};
use super::units::format_display;

/// Currency symbol shown next to balances.
pub const NATIVE_SYMBOL: &str = "ETH";

/// Lifecycle phase of a mounted session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Phase {
    /// Created, detection not started.
    Uninitialized,
    /// Detection and initial probes in progress.
    Detecting,
    /// No provider found. Terminal for this session.
    NoProvider,
    /// Provider detected and subscribed.
    Ready,
}

/// Connection sub-state inside `Phase::Ready`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ConnectionStatus {
    Disconnected,
    Connected,
}

/// Canonical connection state.
///
/// Invariants:
/// - `is_connected() == account.is_some()`
/// - `balance` is `None` whenever `account` is `None`
/// - `account_epoch` increases on every change of `account`
#[derive(Debug, Clone)]
pub struct Session {
    id: Uuid,
    mounted_at: DateTime<Utc>,
    phase: Phase,
    account: Option<AccountAddress>,
    chain_id: Option<ChainId>,
    balance: Option<Decimal>,
    balance_updated_at: Option<DateTime<Utc>>,
    input_address: String,
    last_error: Option<String>,
    account_epoch: u64,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    /// Fresh session: everything absent, not connected.
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            mounted_at: Utc::now(),
            phase: Phase::Uninitialized,
            account: None,
            chain_id: None,
            balance: None,
            balance_updated_at: None,
            input_address: String::new(),
            last_error: None,
            account_epoch: 0,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn set_phase(&mut self, phase: Phase) {
        self.phase = phase;
    }

    pub fn account(&self) -> Option<&str> {
        self.account.as_deref()
    }

    pub fn chain_id(&self) -> Option<&str> {
        self.chain_id.as_deref()
    }

    pub fn balance(&self) -> Option<Decimal> {
        self.balance
    }

    pub fn account_epoch(&self) -> u64 {
        self.account_epoch
    }

    pub fn is_connected(&self) -> bool {
        self.account.is_some()
    }

    pub fn status(&self) -> ConnectionStatus {
        if self.is_connected() {
            ConnectionStatus::Connected
        } else {
            ConnectionStatus::Disconnected
        }
    }

    /// Switch to `account`. Returns `false` when it is already active.
    ///
    /// The previous account's balance is dropped.
    pub fn apply_account(&mut self, account: &str) -> bool {
        if self.account.as_deref() == Some(account) {
            return false;
        }
        self.account = Some(account.to_string());
        self.clear_balance();
        self.account_epoch += 1;
        true
    }

    /// Drop the active account and its balance.
    pub fn clear_account(&mut self) {
        if self.account.take().is_some() {
            self.account_epoch += 1;
        }
        self.clear_balance();
    }

    pub fn set_chain_id(&mut self, chain_id: Option<ChainId>) {
        self.chain_id = chain_id;
    }

    /// Clear account, chain and balance.
    pub fn disconnect(&mut self) {
        self.clear_account();
        self.chain_id = None;
    }

    /// Store a display balance. Ignored while no account is active.
    pub fn set_balance(&mut self, balance: Decimal) -> bool {
        if !self.is_connected() {
            return false;
        }
        self.balance = Some(balance);
        self.balance_updated_at = Some(Utc::now());
        true
    }

    fn clear_balance(&mut self) {
        self.balance = None;
        self.balance_updated_at = None;
    }

    pub fn input_address(&self) -> &str {
        &self.input_address
    }

    pub fn set_input_address(&mut self, value: impl Into<String>) {
        self.input_address = value.into();
    }

    pub fn set_last_error(&mut self, error: Option<String>) {
        self.last_error = error;
    }

    /// Read-only snapshot for presenters.
    pub fn view(&self) -> SessionView {
        SessionView {
            session_id: self.id,
            mounted_at: self.mounted_at,
            phase: self.phase,
            is_connected: self.is_connected(),
            account: self.account.clone(),
            chain_id: self.chain_id.clone(),
            balance: self.balance,
            balance_updated_at: self.balance_updated_at,
            input_address: self.input_address.clone(),
            last_error: self.last_error.clone(),
        }
    }
}

/// Presenter-facing read surface.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionView {
    pub session_id: Uuid,
    pub mounted_at: DateTime<Utc>,
    pub phase: Phase,
    pub is_connected: bool,
    pub account: Option<AccountAddress>,
    pub chain_id: Option<ChainId>,
    pub balance: Option<Decimal>,
    pub balance_updated_at: Option<DateTime<Utc>>,
    pub input_address: String,
    /// Last failure of an explicit user action, for display.
    pub last_error: Option<String>,
}

impl SessionView {
    /// `"1.50 ETH"`, or a placeholder while the balance is unknown.
    pub fn balance_label(&self) -> String {
        match self.balance {
            Some(balance) => format_display(balance, NATIVE_SYMBOL),
            None => "Fetching balance...".to_string(),
        }
    }

    /// Label of the connect button.
    pub fn connect_label(&self) -> &'static str {
        if self.is_connected {
            "Wallet Connected"
        } else {
            "Connect Wallet"
        }
    }

    /// One-line summary of the connection.
    pub fn status_line(&self) -> String {
        match (self.phase, &self.account) {
            (Phase::NoProvider, _) => "Please install MetaMask!".to_string(),
            (Phase::Uninitialized | Phase::Detecting, _) => "Detecting wallet provider...".to_string(),
            (Phase::Ready, Some(account)) => format!(
                "Connected Account: {account} | Network Chain ID: {} | Account Balance: {}",
                self.chain_id.as_deref().unwrap_or("unknown"),
                self.balance_label()
            ),
            (Phase::Ready, None) => "Please connect your MetaMask wallet.".to_string(),
        }
    }
}
