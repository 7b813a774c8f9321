//! # sim_core: Shared State for the Dashboard Simulator
//!
//! This crate is the runtime-free foundation of the simulator. It provides:
//! - Domain records: [`StrategyRecord`] and [`ModelMetric`] (`records`)
//! - The fixed symbol, model and strategy registries (`registry`)
//! - [`StateStore`], a per-record locked in-memory table (`store`)
//! - Pure synthetic payload generators (`generator`)
//! - Outbound [`Event`]s and inbound [`ControlMessage`]s (`event`)
//! - Error types (`error`)
//!
//! Nothing here spawns tasks or performs I/O; the server crate owns the async
//! runtime and only talks to this crate through [`StateStore`] and [`Event`].
//!
//! ## Usage Examples
//!
//! ```rust
//! use sim_core::{Event, StateStore, StrategyStatus};
//!
//! let store = StateStore::with_defaults();
//! let record = store.toggle_strategy("cumulative_delta", false).unwrap();
//! assert_eq!(record.status, StrategyStatus::Inactive);
//!
//! let event = Event::strategy_status(&store.strategies().snapshot());
//! assert_eq!(event.kind(), "strategy_status");
//! ```

pub mod error;
pub mod event;
pub mod generator;
pub mod records;
pub mod registry;
pub mod store;

pub use error::{RecordKind, StoreError};
pub use event::{ControlMessage, Event, StrategyStatusRow};
pub use generator::{MarketSnapshot, Prediction, Signal};
pub use records::{ModelMetric, ModelStatus, Performance, Record, StrategyRecord, StrategyStatus};
pub use store::{RecordTable, StateStore};
