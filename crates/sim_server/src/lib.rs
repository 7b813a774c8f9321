//! HTTP and WebSocket server for the trading dashboard simulator
//!
//! This crate wires the shared [`sim_core::StateStore`] to the outside world:
//! - [`hub`]: subscriber registry and event fan-out
//! - [`scheduler`]: periodic synthetic updates
//! - [`routes`]: REST endpoints and the WebSocket push channel
//! - [`server`]: startup, binding and graceful shutdown

pub mod config;
pub mod error;
pub mod hub;
pub mod routes;
pub mod scheduler;
pub mod server;

pub use sim_core;

/// Server version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
