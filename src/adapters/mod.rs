//! Adapters Layer - Hexagonal Architecture Outer Ring
//!
//! Implements the port traits defined in `crate::ports` with concrete
//! external dependencies (HTTP JSON-RPC, Prometheus, stdin/stdout).
//!
//! Adapter categories:
//! - `bridge`: wallet provider over a JSON-RPC bridge
//! - `console`: line-oriented presenter
//! - `metrics`: Prometheus metrics export and health checks

pub mod bridge;
pub mod console;
pub mod metrics;
