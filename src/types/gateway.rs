//! Webhook gateway types: signals, keys, futures contracts, audit rows.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::enums::{Exchange, TransactionType};

// ---------------------------------------------------------------------------
// Incoming signal
// ---------------------------------------------------------------------------

/// A strategy signal posted to `/webhook`, typically by a charting platform.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookSignal {
    pub webhook_key: String,
    /// Cash symbol of the underlying (e.g. `NIFTY`).
    pub symbol: String,
    /// Direction of the entry order. Charting platforms send either name.
    #[serde(alias = "action")]
    pub trade_type: TransactionType,
    /// Signal price; the reference for stop/target distances.
    pub price: f64,
    /// Average true range; sizes the stop and target distances.
    pub atr: f64,
    #[serde(default)]
    pub exchange: Option<Exchange>,
    #[serde(default)]
    pub timeframe: Option<String>,
    #[serde(default)]
    pub event_time: Option<String>,
}

impl WebhookSignal {
    /// Field-level validation; returns the reason a payload is rejected.
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.symbol.trim().is_empty() {
            return Err("symbol is required".into());
        }
        if !(self.price > 0.0) {
            return Err("price must be a positive number".into());
        }
        if !(self.atr > 0.0) {
            return Err("atr must be a positive number".into());
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Webhook key
// ---------------------------------------------------------------------------

/// An API key row authorizing webhook signals for a set of broker accounts.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookKey {
    pub id: Uuid,
    pub user_id: Uuid,
    pub webhook_key: String,
    pub is_active: bool,
    /// Accounts the key may trade; intersected with currently active ones.
    pub broker_connection_ids: Vec<Uuid>,
    #[serde(default)]
    pub sl_multiplier: Option<f64>,
    #[serde(default)]
    pub target_multiplier: Option<f64>,
    #[serde(default)]
    pub lot_multiplier: Option<u32>,
    #[serde(default)]
    pub last_used_at: Option<DateTime<Utc>>,
}

// ---------------------------------------------------------------------------
// Futures contract
// ---------------------------------------------------------------------------

/// One row of the `nfo_instruments` contract master.
#[derive(Debug, Clone, Deserialize)]
pub struct FutContract {
    pub tradingsymbol: String,
    pub instrument_token: u32,
    pub exchange: Exchange,
    /// Cash symbol of the underlying.
    pub underlying: String,
    pub expiry: NaiveDate,
    pub lot_size: u32,
    pub is_active: bool,
}

// ---------------------------------------------------------------------------
// Store write payloads
// ---------------------------------------------------------------------------

/// Insert payload for the `orders` table, written after the broker accepts
/// the entry order.
#[derive(Debug, Clone, Serialize)]
pub struct NewOrderRow {
    pub user_id: Uuid,
    pub broker_connection_id: Uuid,
    pub broker_order_id: String,
    pub tradingsymbol: String,
    pub exchange: Exchange,
    pub transaction_type: TransactionType,
    pub quantity: u32,
    pub price: f64,
    pub source: &'static str,
}

/// Insert payload for the `notifications` table.
#[derive(Debug, Clone, Serialize)]
pub struct NewNotification {
    pub user_id: Uuid,
    pub title: String,
    pub body: String,
}

/// Insert payload for the webhook audit log. Every request is recorded,
/// accepted or not.
#[derive(Debug, Clone, Serialize)]
pub struct NewWebhookLog {
    pub source_ip: String,
    pub payload: serde_json::Value,
    pub status: &'static str,
    pub reason: Option<String>,
}

// ---------------------------------------------------------------------------
// Gateway response
// ---------------------------------------------------------------------------

/// Outcome of the signal for one broker account.
#[derive(Debug, Clone, Serialize)]
pub struct AccountOutcome {
    pub broker_connection_id: Uuid,
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trigger_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Body of the 200 response: per-account outcomes plus the success count.
#[derive(Debug, Clone, Serialize)]
pub struct WebhookResponse {
    pub success_count: usize,
    pub results: Vec<AccountOutcome>,
}
