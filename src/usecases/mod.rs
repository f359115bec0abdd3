//! Use Cases Layer - Application Business Logic
//!
//! Orchestrates domain logic with port interfaces.
//!
//! Use cases:
//! - `ConnectionStateMachine`: provider session synchronization

pub mod connection;

pub use connection::{ConnectOutcome, ConnectionStateMachine, SessionExit};
