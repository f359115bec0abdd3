//! Domain layer - Core session model and pure logic.
//!
//! This module contains the wallet session model, the provider event
//! vocabulary, the error taxonomy and base-unit conversion.
//! No I/O here (hexagonal architecture inner ring).

pub mod error;
pub mod events;
pub mod session;
pub mod units;

// Re-export core types for convenience
pub use error::WalletError;
pub use events::{AccountAddress, ChainId, Effect, ProviderEvent, ProviderEventKind};
pub use session::{ConnectionStatus, Phase, Session, SessionView};
pub use units::{ETHER_DECIMALS, to_display_units};
