//! Bridge Host - Provider Detection for the Wallet Bridge
//!
//! The host owns the process-wide provider handle (the native
//! counterpart of the page's single injected wallet object). Probing
//! checks that the bridge answers before handing out that handle.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, instrument};

use super::client::BridgeClient;
use crate::ports::provider::{ProviderHost, RpcRequest};

/// Host environment backed by an optional bridge client.
pub struct BridgeHost {
    global: Option<Arc<BridgeClient>>,
}

impl BridgeHost {
    /// Host with `client` injected as the global provider.
    pub fn new(client: Option<Arc<BridgeClient>>) -> Self {
        Self { global: client }
    }
}

#[async_trait]
impl ProviderHost for BridgeHost {
    type Gateway = BridgeClient;

    #[instrument(skip_all)]
    async fn probe(&self) -> Option<Arc<BridgeClient>> {
        let client = self.global.as_ref()?;
        match client.call(&RpcRequest::ChainId).await {
            Ok(_) => Some(Arc::clone(client)),
            Err(e) => {
                debug!(bridge = %client.url(), error = %e, "Bridge did not answer probe");
                None
            }
        }
    }

    fn global_handle(&self) -> Option<Arc<BridgeClient>> {
        self.global.clone()
    }
}
