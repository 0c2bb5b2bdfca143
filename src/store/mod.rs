//! Durable store access.
//!
//! The store exposes a PostgREST-style REST surface plus a realtime
//! websocket for change events. The engine treats it as the source of truth
//! for every trigger; in-memory state is a cache rebuilt from here.
//!
//! - [`client`] — the authenticated REST client core
//! - [`triggers`] — trigger reads and the four atomic status transitions
//! - [`engine_state`] — singleton lock / heartbeat procedures
//! - [`accounts`] — broker connections, risk limits, positions
//! - [`gateway`] — webhook keys, contract master, orders, notifications
//! - [`realtime`] — the change-event subscription

pub mod accounts;
pub mod client;
pub mod engine_state;
pub mod gateway;
pub mod realtime;
pub mod triggers;

pub use client::StoreClient;
pub use realtime::{ChangeEvent, RealtimeListener};
