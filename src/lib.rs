//! # hmt-engine
//!
//! A host-monitored trigger engine for a retail derivatives platform: users
//! register conditional orders ("when the last-traded price of instrument I
//! crosses threshold T, place order O"); the engine watches the live
//! market-data feed, evaluates triggers on every tick, and dispatches market
//! orders to the upstream broker. A webhook gateway accepts external strategy
//! signals, places the entry order, and arms a paired stop-loss/target
//! trigger.
//!
//! ## Architecture
//!
//! ```text
//!  feed ──ticks──▶ TriggerIndex ──▶ evaluate() ──▶ execution task
//!                      ▲                              │  (risk gate,
//!                      │ change events                │   retrying dispatch,
//!                  durable store ◀───status writes────┘   OCO cancel)
//! ```
//!
//! The durable store owns the truth; the index is a cache rebuilt from it at
//! startup and repaired by the change listener. One instance leads at a time
//! via a heartbeat-guarded lock; standbys serve health only.

pub mod broker;
pub mod config;
pub mod constants;
pub mod engine;
pub mod error;
pub mod feed;
pub mod gateway;
pub mod server;
pub mod store;
pub mod types;

/// Re-export the supervisor at crate root for convenience.
pub use engine::Supervisor;
/// Re-export the error type and Result alias.
pub use error::{EngineError, Result};
