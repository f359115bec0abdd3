//! Event sink registry shared by the bridge client and the poller.
//!
//! Holds at most one sink per event kind; registering again replaces
//! the previous sink.

use std::collections::HashMap;
use std::sync::RwLock;

use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::domain::error::WalletError;
use crate::domain::events::{ProviderEvent, ProviderEventKind};

#[derive(Debug, Default)]
pub struct EventSinks {
    sinks: RwLock<HashMap<ProviderEventKind, mpsc::Sender<ProviderEvent>>>,
}

impl EventSinks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Route `kind` to `sink`, replacing any previous sink.
    pub fn register(
        &self,
        kind: ProviderEventKind,
        sink: mpsc::Sender<ProviderEvent>,
    ) -> Result<(), WalletError> {
        let mut sinks = self
            .sinks
            .write()
            .map_err(|e| WalletError::provider(format!("sink registry poisoned: {e}")))?;
        if sinks.insert(kind, sink).is_some() {
            debug!(event = %kind, "Replaced existing event sink");
        }
        Ok(())
    }

    /// Stop routing `kind`. Removing an absent sink is a no-op.
    pub fn remove(&self, kind: ProviderEventKind) -> Result<(), WalletError> {
        let mut sinks = self
            .sinks
            .write()
            .map_err(|e| WalletError::provider(format!("sink registry poisoned: {e}")))?;
        sinks.remove(&kind);
        Ok(())
    }

    /// Whether a sink is registered for `kind`.
    pub fn is_registered(&self, kind: ProviderEventKind) -> bool {
        self.sinks
            .read()
            .map(|sinks| sinks.contains_key(&kind))
            .unwrap_or(false)
    }

    /// Deliver `event` to its sink. Returns `false` when nobody listens.
    pub async fn dispatch(&self, event: ProviderEvent) -> bool {
        let kind = event.kind();
        let sink = match self.sinks.read() {
            Ok(sinks) => sinks.get(&kind).cloned(),
            Err(e) => {
                warn!(error = %e, "Sink registry poisoned, dropping event");
                return false;
            }
        };

        let Some(sink) = sink else {
            debug!(event = %kind, "No sink registered, dropping event");
            return false;
        };

        if sink.send(event).await.is_err() {
            debug!(event = %kind, "Sink closed, removing it");
            self.remove_closed(kind, &sink);
            return false;
        }
        true
    }

    /// Remove `closed` unless it was replaced while the send was pending.
    fn remove_closed(&self, kind: ProviderEventKind, closed: &mpsc::Sender<ProviderEvent>) {
        let Ok(mut sinks) = self.sinks.write() else {
            return;
        };
        if sinks.get(&kind).is_some_and(|current| current.same_channel(closed)) {
            sinks.remove(&kind);
        } else {
            debug!(event = %kind, "Sink replaced during send, keeping the new one");
        }
    }
}
