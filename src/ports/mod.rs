//! Ports Layer - Hexagonal Architecture Boundaries
//!
//! Defines the interfaces (traits) that the domain/usecases layer
//! requires from the outside world. Adapters implement these traits.
//!
//! Port categories:
//! - `ProviderGateway` / `ProviderHost`: the injected wallet provider
//! - `SessionObserver`: metrics and presenter hooks

pub mod provider;
pub mod telemetry;
