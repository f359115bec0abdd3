//! Wallet Bridge Client - JSON-RPC over HTTP Provider
//!
//! Implements the `ProviderGateway` port against a wallet bridge that
//! speaks EIP-1193 methods as plain JSON-RPC 2.0 over HTTP. Requests
//! carry a timeout; transport failures of non-prompting requests are
//! retried with exponential backoff. `eth_requestAccounts` is never
//! retried because it can surface a permission prompt.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::{Semaphore, mpsc};
use tokio::time::sleep;
use tracing::{debug, warn};

use super::sinks::EventSinks;
use crate::config::ProviderConfig;
use crate::domain::error::WalletError;
use crate::domain::events::{ProviderEvent, ProviderEventKind};
use crate::ports::provider::{ProviderGateway, RpcRequest};

/// Maximum in-flight requests to the bridge.
const MAX_CONCURRENT: usize = 4;

/// Configuration for the bridge client.
#[derive(Debug, Clone)]
pub struct BridgeClientConfig {
    /// JSON-RPC endpoint.
    pub url: String,
    /// Per-request timeout.
    pub timeout: Duration,
    /// Retries on transport errors for non-prompting requests.
    pub max_retries: u32,
    /// Base delay between retries (exponential backoff).
    pub retry_base_delay: Duration,
}

impl BridgeClientConfig {
    /// Build from the `[provider]` section. `None` without a bridge URL.
    pub fn from_provider(config: &ProviderConfig) -> Option<Self> {
        config.bridge_url.as_ref().map(|url| Self {
            url: url.clone(),
            timeout: Duration::from_millis(config.timeout_ms),
            max_retries: config.max_retries,
            retry_base_delay: Duration::from_millis(200),
        })
    }
}

#[derive(Debug, Serialize)]
struct RpcEnvelope<'a> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: Value,
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcErrorObject>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorObject {
    code: i64,
    message: String,
}

/// A single failed attempt, tagged with whether retrying makes sense.
struct AttemptError {
    error: WalletError,
    transient: bool,
}

/// JSON-RPC wallet bridge implementing `ProviderGateway`.
pub struct BridgeClient {
    http: Client,
    config: BridgeClientConfig,
    semaphore: Semaphore,
    next_id: AtomicU64,
    sinks: Arc<EventSinks>,
}

impl BridgeClient {
    /// Create a new bridge client.
    pub fn new(config: BridgeClientConfig) -> anyhow::Result<Self> {
        let http = Client::builder()
            .timeout(config.timeout)
            .pool_max_idle_per_host(2)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            http,
            config,
            semaphore: Semaphore::new(MAX_CONCURRENT),
            next_id: AtomicU64::new(1),
            sinks: Arc::new(EventSinks::new()),
        })
    }

    /// Registry the poller dispatches events into.
    pub fn sinks(&self) -> Arc<EventSinks> {
        Arc::clone(&self.sinks)
    }

    /// Bridge endpoint.
    pub fn url(&self) -> &str {
        &self.config.url
    }

    /// Execute a request with retries on transient transport errors.
    pub async fn call(&self, request: &RpcRequest) -> Result<Value, WalletError> {
        let _permit = self
            .semaphore
            .acquire()
            .await
            .map_err(|e| WalletError::provider(format!("request limiter closed: {e}")))?;

        let retries = if request.is_prompting() {
            0
        } else {
            self.config.max_retries
        };

        let mut attempt = 0;
        loop {
            match self.send_once(request).await {
                Ok(value) => return Ok(value),
                Err(AttemptError { error, transient }) if transient && attempt < retries => {
                    attempt += 1;
                    let delay = self.config.retry_base_delay * 2u32.pow(attempt - 1);
                    debug!(
                        method = request.method(),
                        attempt,
                        delay_ms = delay.as_millis(),
                        error = %error,
                        "Retrying bridge request"
                    );
                    sleep(delay).await;
                }
                Err(AttemptError { error, .. }) => return Err(error),
            }
        }
    }

    async fn send_once(&self, request: &RpcRequest) -> Result<Value, AttemptError> {
        let envelope = RpcEnvelope {
            jsonrpc: "2.0",
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            method: request.method(),
            params: request.params(),
        };

        let response = self
            .http
            .post(&self.config.url)
            .json(&envelope)
            .send()
            .await
            .map_err(|e| AttemptError {
                transient: e.is_timeout() || e.is_connect(),
                error: WalletError::provider(format!("bridge transport error: {e}")),
            })?;

        let status = response.status();
        if status.is_server_error() {
            return Err(AttemptError {
                error: WalletError::provider(format!("bridge returned HTTP {status}")),
                transient: true,
            });
        }
        if !status.is_success() {
            return Err(AttemptError {
                error: WalletError::provider(format!("bridge returned HTTP {status}")),
                transient: false,
            });
        }

        let body: RpcResponse = response.json().await.map_err(|e| AttemptError {
            error: WalletError::InvalidResponse {
                method: request.method(),
                reason: e.to_string(),
            },
            transient: false,
        })?;

        decode_response(body).map_err(|error| AttemptError {
            error,
            transient: false,
        })
    }
}

fn decode_response(body: RpcResponse) -> Result<Value, WalletError> {
    if let Some(err) = body.error {
        return Err(WalletError::from_rpc(err.code, err.message));
    }
    Ok(body.result.unwrap_or(Value::Null))
}

#[async_trait]
impl ProviderGateway for BridgeClient {
    async fn request(&self, request: RpcRequest) -> Result<Value, WalletError> {
        let method = request.method();
        let result = self.call(&request).await;
        if let Err(e) = &result {
            if e.is_user_rejection() {
                debug!(method, error = %e, "Bridge request rejected by user");
            } else {
                warn!(method, error = %e, "Bridge request failed");
            }
        }
        result
    }

    fn subscribe(
        &self,
        kind: ProviderEventKind,
        sink: mpsc::Sender<ProviderEvent>,
    ) -> Result<(), WalletError> {
        self.sinks.register(kind, sink)
    }

    fn unsubscribe(&self, kind: ProviderEventKind) -> Result<(), WalletError> {
        self.sinks.remove(kind)
    }
}
