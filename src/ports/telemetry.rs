//! Telemetry Port - Session Observation Hooks
//!
//! Lets adapters (metrics, presenters) observe the state machine
//! without the use-case layer depending on them. Every hook has a
//! no-op default.

use crate::domain::error::WalletError;
use crate::domain::events::ProviderEventKind;
use crate::domain::session::SessionView;

/// Observer notified by the connection state machine.
pub trait SessionObserver: Send + Sync + 'static {
  /// A provider event was consumed.
  fn on_event(&self, _kind: ProviderEventKind) {}

  /// A provider request failed.
  fn on_request_failed(&self, _method: &'static str, _error: &WalletError) {}

  /// A transition requested a full reload.
  fn on_reload(&self) {}

  /// The session changed; `view` is the new snapshot.
  fn on_session_changed(&self, _view: &SessionView) {}
}

/// Observer that ignores everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl SessionObserver for NoopObserver {}
