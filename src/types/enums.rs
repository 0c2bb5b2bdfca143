//! Shared enum types mapping to broker wire values and store row values.
//!
//! Broker-facing enums use `SCREAMING_SNAKE_CASE` variant names to match the
//! form-encoded values the order API expects, so the Rust naming lint is
//! suppressed for them. Store-facing enums serialize lowercase.
#![allow(non_camel_case_types)]

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Exchange
// ---------------------------------------------------------------------------

/// Exchange identifier used in order payloads and instrument records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Exchange {
    /// NSE cash.
    NSE,
    /// BSE cash.
    BSE,
    /// NSE futures & options.
    NFO,
    /// BSE futures & options.
    BFO,
    /// MCX commodity.
    MCX,
    /// NSE currency derivatives.
    CDS,
}

impl Exchange {
    /// The default cash exchange assumed when a webhook signal omits one.
    pub const DEFAULT_CASH: Exchange = Exchange::NSE;

    /// Wire value as sent to the broker.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NSE => "NSE",
            Self::BSE => "BSE",
            Self::NFO => "NFO",
            Self::BFO => "BFO",
            Self::MCX => "MCX",
            Self::CDS => "CDS",
        }
    }
}

impl std::fmt::Display for Exchange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Transaction Type
// ---------------------------------------------------------------------------

/// Buy or sell side of the order placed when a trigger fires.
///
/// For a two-leg trigger this is the *exit* side: `SELL` exits a long,
/// `BUY` exits a short.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransactionType {
    BUY,
    SELL,
}

impl TransactionType {
    /// The opposite side; an entry order's exit trigger uses this.
    pub fn opposite(self) -> Self {
        match self {
            Self::BUY => Self::SELL,
            Self::SELL => Self::BUY,
        }
    }

    /// Wire value as sent to the broker.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::BUY => "BUY",
            Self::SELL => "SELL",
        }
    }
}

// ---------------------------------------------------------------------------
// Condition Type
// ---------------------------------------------------------------------------

/// Shape of a trigger's firing condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConditionType {
    /// One threshold, one leg.
    #[serde(rename = "single")]
    Single,
    /// Paired stop-loss + target thresholds with OCO semantics.
    #[serde(rename = "two-leg")]
    TwoLeg,
}

// ---------------------------------------------------------------------------
// Trigger Status
// ---------------------------------------------------------------------------

/// Lifecycle status of a trigger row.
///
/// `Triggered`, `Failed`, `Cancelled` and `Expired` are terminal; rows are
/// never mutated once they reach one of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TriggerStatus {
    /// Eligible for firing.
    Active,
    /// An execution attempt is in flight.
    Processing,
    /// Fired and an order was placed.
    Triggered,
    /// Firing was attempted and rejected.
    Failed,
    /// Withdrawn by the user or an OCO sibling.
    Cancelled,
    /// Aged out without firing.
    Expired,
}

impl TriggerStatus {
    /// Whether this status is final.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Triggered | Self::Failed | Self::Cancelled | Self::Expired
        )
    }
}

// ---------------------------------------------------------------------------
// Product Type
// ---------------------------------------------------------------------------

/// Product tag carried on each leg and forwarded to the broker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProductType {
    /// Cash and carry (delivery).
    CNC,
    /// Margin intraday square-off.
    MIS,
    /// Normal margin (carry-forward derivatives).
    NRML,
}

impl ProductType {
    /// Wire value as sent to the broker.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::CNC => "CNC",
            Self::MIS => "MIS",
            Self::NRML => "NRML",
        }
    }
}

// ---------------------------------------------------------------------------
// Order Type / Validity
// ---------------------------------------------------------------------------

/// Order type on the broker wire. The engine only ever places `MARKET`
/// orders; the other variants exist to round-trip broker payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderType {
    MARKET,
    LIMIT,
    /// Stop-loss limit.
    SL,
    /// Stop-loss market.
    #[serde(rename = "SL-M")]
    SLM,
}

/// Order validity on the broker wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Validity {
    /// Good for the trading day.
    DAY,
    /// Immediate or cancel.
    IOC,
}

// ---------------------------------------------------------------------------
// Triggered Leg
// ---------------------------------------------------------------------------

/// Which leg of a trigger fired.
///
/// By convention leg 1 is the stop-loss and leg 2 the target of a two-leg
/// pair; a single trigger always fires leg 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TriggeredLeg {
    Leg1,
    Leg2,
}

impl TriggeredLeg {
    /// Numeric form persisted in the store's `triggered_leg` column.
    pub fn number(self) -> i16 {
        match self {
            Self::Leg1 => 1,
            Self::Leg2 => 2,
        }
    }
}
