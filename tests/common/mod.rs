//! Shared test doubles: a scripted provider gateway and static hosts.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::{Notify, mpsc};

use wallet_injection::config::SessionConfig;
use wallet_injection::domain::error::WalletError;
use wallet_injection::domain::events::{ProviderEvent, ProviderEventKind};
use wallet_injection::ports::provider::{ProviderGateway, ProviderHost, RpcRequest};
use wallet_injection::usecases::connection::ConnectionStateMachine;

/// Gateway answering from scripted responses.
///
/// Responses are keyed by method (and by address for `eth_getBalance`).
/// A queued response is used once; otherwise the default for the key
/// applies. A gate holds every matching request until released.
#[derive(Default)]
pub struct ScriptedGateway {
    defaults: Mutex<HashMap<String, Result<Value, WalletError>>>,
    queued: Mutex<HashMap<String, VecDeque<Result<Value, WalletError>>>>,
    gates: Mutex<HashMap<String, Arc<Notify>>>,
    calls: Mutex<Vec<RpcRequest>>,
    sinks: Mutex<HashMap<ProviderEventKind, mpsc::Sender<ProviderEvent>>>,
    unsubscribed: Mutex<Vec<ProviderEventKind>>,
    pub unsubscribe_unsupported: bool,
}

fn key(request: &RpcRequest) -> String {
    match request {
        RpcRequest::GetBalance { address } => format!("eth_getBalance:{address}"),
        other => other.method().to_string(),
    }
}

impl ScriptedGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Gateway whose provider has no unsubscription.
    pub fn without_unsubscribe() -> Self {
        Self {
            unsubscribe_unsupported: true,
            ..Self::default()
        }
    }

    /// Default answer for a method (`"eth_chainId"`, ...).
    pub fn respond(&self, method: &str, response: Result<Value, WalletError>) {
        self.defaults.lock().unwrap().insert(method.to_string(), response);
    }

    /// One-shot answer for a method, used before the default.
    pub fn respond_once(&self, method: &str, response: Result<Value, WalletError>) {
        self.queued
            .lock()
            .unwrap()
            .entry(method.to_string())
            .or_default()
            .push_back(response);
    }

    /// Default answer for `eth_getBalance` of `address`.
    pub fn respond_balance(&self, address: &str, response: Result<Value, WalletError>) {
        self.respond(&format!("eth_getBalance:{address}"), response);
    }

    /// Hold requests for `key` until the returned handle is notified.
    pub fn gate(&self, key: &str) -> Arc<Notify> {
        let notify = Arc::new(Notify::new());
        self.gates
            .lock()
            .unwrap()
            .insert(key.to_string(), Arc::clone(&notify));
        notify
    }

    /// Every request issued so far.
    pub fn calls(&self) -> Vec<RpcRequest> {
        self.calls.lock().unwrap().clone()
    }

    /// Number of requests for a method name.
    pub fn count(&self, method: &str) -> usize {
        self.calls().iter().filter(|r| r.method() == method).count()
    }

    /// Number of balance queries for `address`.
    pub fn balance_calls(&self, address: &str) -> usize {
        self.calls()
            .iter()
            .filter(|r| matches!(r, RpcRequest::GetBalance { address: a } if a == address))
            .count()
    }

    /// Push an event into the subscribed sink, if any.
    pub async fn emit(&self, event: ProviderEvent) -> bool {
        let sink = self.sinks.lock().unwrap().get(&event.kind()).cloned();
        match sink {
            Some(sink) => sink.send(event).await.is_ok(),
            None => false,
        }
    }

    pub fn is_subscribed(&self, kind: ProviderEventKind) -> bool {
        self.sinks.lock().unwrap().contains_key(&kind)
    }

    pub fn unsubscribed(&self) -> Vec<ProviderEventKind> {
        self.unsubscribed.lock().unwrap().clone()
    }

    fn answer(&self, key: &str) -> Result<Value, WalletError> {
        if let Some(response) = self
            .queued
            .lock()
            .unwrap()
            .get_mut(key)
            .and_then(VecDeque::pop_front)
        {
            return response;
        }
        self.defaults
            .lock()
            .unwrap()
            .get(key)
            .cloned()
            .unwrap_or_else(|| Err(WalletError::provider(format!("no scripted response for {key}"))))
    }
}

#[async_trait]
impl ProviderGateway for ScriptedGateway {
    async fn request(&self, request: RpcRequest) -> Result<Value, WalletError> {
        let key = key(&request);
        self.calls.lock().unwrap().push(request.clone());

        let gate = {
            let gates = self.gates.lock().unwrap();
            gates.get(&key).or_else(|| gates.get(request.method())).cloned()
        };
        if let Some(gate) = gate {
            gate.notified().await;
        }

        self.answer(&key)
    }

    fn subscribe(
        &self,
        kind: ProviderEventKind,
        sink: mpsc::Sender<ProviderEvent>,
    ) -> Result<(), WalletError> {
        self.sinks.lock().unwrap().insert(kind, sink);
        Ok(())
    }

    fn unsubscribe(&self, kind: ProviderEventKind) -> Result<(), WalletError> {
        if self.unsubscribe_unsupported {
            return Err(WalletError::Unsupported("removeListener"));
        }
        self.sinks.lock().unwrap().remove(&kind);
        self.unsubscribed.lock().unwrap().push(kind);
        Ok(())
    }
}

/// Host whose probe and global handle are fixed.
pub struct StaticHost<G> {
    pub probed: Option<Arc<G>>,
    pub global: Option<Arc<G>>,
}

impl<G> StaticHost<G> {
    /// Host with `gateway` injected as the genuine provider.
    pub fn with(gateway: Arc<G>) -> Self {
        Self {
            probed: Some(Arc::clone(&gateway)),
            global: Some(gateway),
        }
    }

    /// Host with no provider at all.
    pub fn empty() -> Self {
        Self {
            probed: None,
            global: None,
        }
    }
}

#[async_trait]
impl<G: ProviderGateway> ProviderHost for StaticHost<G> {
    type Gateway = G;

    async fn probe(&self) -> Option<Arc<G>> {
        self.probed.clone()
    }

    fn global_handle(&self) -> Option<Arc<G>> {
        self.global.clone()
    }
}

/// Gateway scripted for a mainnet provider with no exposed account.
pub fn mainnet_gateway() -> Arc<ScriptedGateway> {
    let gateway = ScriptedGateway::new();
    gateway.respond("eth_chainId", Ok(serde_json::json!("0x1")));
    gateway.respond("eth_accounts", Ok(serde_json::json!([])));
    Arc::new(gateway)
}

/// Mount and initialize a session against `gateway`.
pub async fn ready_machine(
    gateway: &Arc<ScriptedGateway>,
) -> (
    Arc<ConnectionStateMachine<ScriptedGateway>>,
    mpsc::Receiver<ProviderEvent>,
) {
    let machine = Arc::new(ConnectionStateMachine::new(SessionConfig::default()));
    let host = StaticHost::with(Arc::clone(gateway));
    let events = machine
        .initialize(&host)
        .await
        .expect("provider should be detected");
    (machine, events)
}

/// One ether in wei.
pub const ONE_ETH: &str = "1000000000000000000";
