//! Wallet Bridge Adapters - JSON-RPC Provider Integration
//!
//! Provides the concrete wallet provider:
//! - `BridgeClient`: `ProviderGateway` over JSON-RPC/HTTP
//! - `BridgeHost`: detection against the global provider handle
//! - `EventPoller`: turns polling into provider events
//! - `EventSinks`: one sink per event kind

pub mod client;
pub mod host;
pub mod poller;
pub mod sinks;

pub use client::{BridgeClient, BridgeClientConfig};
pub use host::BridgeHost;
pub use poller::EventPoller;
pub use sinks::EventSinks;
