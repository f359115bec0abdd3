//! Provider events and transition effects.
//!
//! Provider notifications are a typed, transient stream: each event is
//! consumed exactly once by the matching state machine handler and is
//! never stored.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Account address as reported by the provider (opaque, `0x`-prefixed).
pub type AccountAddress = String;

/// Opaque hex-encoded chain identifier (e.g. `"0x1"`).
pub type ChainId = String;

/// The three provider notifications the session reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProviderEventKind {
    /// `chainChanged`
    #[serde(rename = "chainChanged")]
    ChainChanged,
    /// `accountsChanged`
    #[serde(rename = "accountsChanged")]
    AccountsChanged,
    /// `disconnect`
    #[serde(rename = "disconnect")]
    Disconnect,
}

impl ProviderEventKind {
    /// All kinds, in subscription order.
    pub const ALL: [Self; 3] = [Self::ChainChanged, Self::AccountsChanged, Self::Disconnect];

    /// Provider event name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ChainChanged => "chainChanged",
            Self::AccountsChanged => "accountsChanged",
            Self::Disconnect => "disconnect",
        }
    }
}

impl fmt::Display for ProviderEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A provider notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderEvent {
    /// Exposed accounts changed; empty means the wallet is locked or
    /// the site lost its permission.
    AccountsChanged(Vec<AccountAddress>),
    /// The active network changed.
    ChainChanged(ChainId),
    /// The provider lost its connection to every chain.
    Disconnected(String),
}

impl ProviderEvent {
    /// The subscription this event is delivered through.
    pub fn kind(&self) -> ProviderEventKind {
        match self {
            Self::AccountsChanged(_) => ProviderEventKind::AccountsChanged,
            Self::ChainChanged(_) => ProviderEventKind::ChainChanged,
            Self::Disconnected(_) => ProviderEventKind::Disconnect,
        }
    }
}

/// Side effect requested by a transition, executed by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Effect {
    /// Nothing for the host to do.
    #[default]
    None,
    /// Tear the session down and mount a fresh one (full reload).
    Reload,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_kind_wire_names() {
        assert_eq!(ProviderEventKind::ChainChanged.as_str(), "chainChanged");
        assert_eq!(ProviderEventKind::AccountsChanged.as_str(), "accountsChanged");
        assert_eq!(ProviderEventKind::Disconnect.as_str(), "disconnect");
        assert_eq!(
            serde_json::to_string(&ProviderEventKind::AccountsChanged).unwrap(),
            "\"accountsChanged\""
        );
    }

    #[test]
    fn test_event_maps_to_kind() {
        assert_eq!(
            ProviderEvent::AccountsChanged(vec![]).kind(),
            ProviderEventKind::AccountsChanged
        );
        assert_eq!(
            ProviderEvent::ChainChanged("0x1".into()).kind(),
            ProviderEventKind::ChainChanged
        );
        assert_eq!(
            ProviderEvent::Disconnected("gone".into()).kind(),
            ProviderEventKind::Disconnect
        );
    }
}
