//! Broker connections, engine state, risk limits, and positions.

use chrono::{DateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Broker connection
// ---------------------------------------------------------------------------

/// A user's broker account credentials. Read-only to the engine; the owning
/// user manages the row.
#[derive(Debug, Clone, Deserialize)]
pub struct BrokerConnection {
    pub id: Uuid,
    pub user_id: Uuid,
    pub api_key: String,
    pub access_token: String,
    pub is_active: bool,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

// ---------------------------------------------------------------------------
// Engine state row
// ---------------------------------------------------------------------------

/// The single well-known row used for singleton election and liveness.
#[derive(Debug, Clone, Deserialize)]
pub struct EngineStateRow {
    pub instance_id: Uuid,
    pub is_running: bool,
    #[serde(default)]
    pub last_heartbeat: Option<DateTime<Utc>>,
    #[serde(default)]
    pub processed_ticks: u64,
    #[serde(default)]
    pub triggers_executed: u64,
    #[serde(default)]
    pub triggers_failed: u64,
    #[serde(default)]
    pub feed_connected: bool,
    #[serde(default)]
    pub engine_error: Option<String>,
}

// ---------------------------------------------------------------------------
// Risk limits
// ---------------------------------------------------------------------------

/// Per-user risk bookkeeping, queried read-only immediately before an order
/// is placed. The counters are maintained by store procedures.
#[derive(Debug, Clone, Deserialize)]
pub struct RiskLimits {
    pub user_id: Uuid,
    /// Hard stop: no orders while set.
    #[serde(default)]
    pub kill_switch: bool,
    /// Maximum fired orders per day; `None` disables the cap.
    #[serde(default)]
    pub max_daily_trades: Option<u32>,
    #[serde(default)]
    pub daily_trade_count: u32,
    /// Daily realized-P&L floor; trading halts once breached.
    #[serde(default)]
    pub daily_loss_floor: Option<f64>,
    #[serde(default)]
    pub realized_pnl_today: f64,
    /// No orders at or after this time of day (exchange local time).
    #[serde(default)]
    pub trade_cutoff: Option<NaiveTime>,
}

// ---------------------------------------------------------------------------
// Position
// ---------------------------------------------------------------------------

/// A read-only position row; consumed only for the UI's breakeven hint,
/// never part of the fire decision.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Position {
    pub tradingsymbol: String,
    pub exchange: super::Exchange,
    pub broker_connection_id: Uuid,
    pub avg_price: f64,
    /// Signed: positive long, negative short.
    pub quantity: i64,
}

impl Position {
    /// Whether a stop at `stop_price` locks in at least breakeven.
    ///
    /// For a long that means the stop sits at or above the average entry
    /// price; for a short, at or below it.
    pub fn stop_covers_breakeven(&self, stop_price: f64) -> bool {
        if self.quantity >= 0 {
            stop_price >= self.avg_price
        } else {
            stop_price <= self.avg_price
        }
    }
}
