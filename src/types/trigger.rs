//! Trigger records, feed ticks, and the firing descriptor.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{EngineError, Result};
use crate::types::enums::*;

// ---------------------------------------------------------------------------
// Trigger row
// ---------------------------------------------------------------------------

/// A conditional-order record as stored in the `hmt_gtt_orders` table.
///
/// Leg 1 fields (`product_type`, `trigger_price`, `order_price`, `quantity`)
/// are always present. Leg 2 fields are present iff
/// `condition_type == TwoLeg`. `parent_id` links sibling triggers armed as an
/// OCO pair: when one fires, the other is cancelled.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trigger {
    pub id: Uuid,
    pub user_id: Uuid,
    /// Owning broker connection (account) the fired order is placed under.
    pub broker_connection_id: Uuid,
    pub exchange: Exchange,
    pub tradingsymbol: String,
    /// The feed's stable numeric identifier; subscription key.
    pub instrument_token: u32,
    pub condition_type: ConditionType,
    /// Side of the order placed when the trigger fires. For two-leg this is
    /// the exit side.
    pub transaction_type: TransactionType,

    // Leg 1 (stop-loss by convention for two-leg).
    pub product_type: ProductType,
    pub trigger_price: f64,
    /// Informational limit price shown in the UI; fired orders are MARKET.
    #[serde(default)]
    pub order_price: Option<f64>,
    pub quantity: u32,

    // Leg 2 (target), two-leg only.
    #[serde(default)]
    pub product_type_2: Option<ProductType>,
    #[serde(default)]
    pub trigger_price_2: Option<f64>,
    #[serde(default)]
    pub order_price_2: Option<f64>,
    #[serde(default)]
    pub quantity_2: Option<u32>,

    /// Links the two siblings of an OCO pair.
    #[serde(default)]
    pub parent_id: Option<Uuid>,
    /// Market price at creation; when present, firing requires a strict
    /// crossing of the threshold.
    #[serde(default)]
    pub reference_price: Option<f64>,

    pub status: TriggerStatus,
    #[serde(default)]
    pub metadata: serde_json::Value,

    // Audit fields written on terminal transitions.
    #[serde(default)]
    pub triggered_leg: Option<i16>,
    #[serde(default)]
    pub triggered_price: Option<f64>,
    #[serde(default)]
    pub broker_order_id: Option<String>,
    #[serde(default)]
    pub error_message: Option<String>,
    #[serde(default)]
    pub triggered_at: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Trigger {
    /// Whether this is a two-leg (OCO) trigger.
    pub fn is_two_leg(&self) -> bool {
        self.condition_type == ConditionType::TwoLeg
    }

    /// Validate the record's internal invariants.
    ///
    /// Trigger prices must be positive, quantities must be positive, and a
    /// two-leg trigger must carry every leg-2 attribute.
    pub fn validate(&self) -> Result<()> {
        if self.trigger_price <= 0.0 {
            return Err(EngineError::InvalidArgument(format!(
                "trigger {}: trigger_price must be positive",
                self.id
            )));
        }
        if self.quantity == 0 {
            return Err(EngineError::InvalidArgument(format!(
                "trigger {}: quantity must be positive",
                self.id
            )));
        }
        if self.is_two_leg() {
            let complete = self.trigger_price_2.is_some_and(|p| p > 0.0)
                && self.quantity_2.is_some_and(|q| q > 0)
                && self.product_type_2.is_some();
            if !complete {
                return Err(EngineError::InvalidArgument(format!(
                    "trigger {}: two-leg requires price, quantity and product for leg 2",
                    self.id
                )));
            }
        }
        Ok(())
    }

    /// Build the broker order payload for the given fired leg.
    ///
    /// Returns `None` when leg 2 is requested but its attributes are absent.
    pub fn order_params(&self, leg: TriggeredLeg) -> Option<OrderParams> {
        let (quantity, product) = match leg {
            TriggeredLeg::Leg1 => (self.quantity, self.product_type),
            TriggeredLeg::Leg2 => (self.quantity_2?, self.product_type_2?),
        };
        Some(OrderParams {
            tradingsymbol: self.tradingsymbol.clone(),
            exchange: self.exchange,
            transaction_type: self.transaction_type,
            quantity,
            order_type: OrderType::MARKET,
            product,
            validity: Validity::DAY,
        })
    }
}

// ---------------------------------------------------------------------------
// Tick
// ---------------------------------------------------------------------------

/// One decoded price update from the market-data feed. Not persisted.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tick {
    /// The feed's numeric instrument identifier.
    pub instrument_token: u32,
    /// Last-traded price in rupees.
    pub last_price: f64,
    /// Wall-clock time the packet was decoded.
    pub received_at: DateTime<Utc>,
}

impl Tick {
    /// Construct a tick stamped with the current time.
    pub fn now(instrument_token: u32, last_price: f64) -> Self {
        Self {
            instrument_token,
            last_price,
            received_at: Utc::now(),
        }
    }
}

// ---------------------------------------------------------------------------
// Firing descriptor
// ---------------------------------------------------------------------------

/// The broker order payload placed when a trigger fires.
///
/// Field names match the broker's form-encoded order endpoint, so this
/// serializes directly as the request body.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderParams {
    pub tradingsymbol: String,
    pub exchange: Exchange,
    pub transaction_type: TransactionType,
    pub quantity: u32,
    pub order_type: OrderType,
    pub product: ProductType,
    pub validity: Validity,
}

/// The evaluator's verdict that a leg has fired. Transient: produced by
/// [`evaluate`](crate::engine::evaluate), consumed by the executor.
#[derive(Debug, Clone, PartialEq)]
pub struct Firing {
    pub trigger_id: Uuid,
    pub leg: TriggeredLeg,
    /// The tick price that satisfied the condition.
    pub observed_price: f64,
    pub order: OrderParams,
}

// ---------------------------------------------------------------------------
// Store write payloads
// ---------------------------------------------------------------------------

/// Insert payload for a new trigger row. Ids and timestamps are assigned by
/// the store.
#[derive(Debug, Clone, Serialize)]
pub struct NewTrigger {
    pub user_id: Uuid,
    pub broker_connection_id: Uuid,
    pub exchange: Exchange,
    pub tradingsymbol: String,
    pub instrument_token: u32,
    pub condition_type: ConditionType,
    pub transaction_type: TransactionType,
    pub product_type: ProductType,
    pub trigger_price: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_price: Option<f64>,
    pub quantity: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub product_type_2: Option<ProductType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trigger_price_2: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_price_2: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quantity_2: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference_price: Option<f64>,
    pub status: TriggerStatus,
    pub metadata: serde_json::Value,
}

/// Audit row appended per fired trigger. Best-effort: a failed write is
/// logged and never blocks the pipeline.
#[derive(Debug, Clone, Serialize)]
pub struct TradeLogEntry {
    pub trigger_id: Uuid,
    pub user_id: Uuid,
    pub broker_connection_id: Uuid,
    pub tradingsymbol: String,
    pub exchange: Exchange,
    pub transaction_type: TransactionType,
    pub quantity: u32,
    pub triggered_leg: i16,
    pub observed_price: f64,
    pub broker_order_id: String,
}
