//! Webhook gateway arithmetic and resolution rules: signal validation,
//! expiry-slot selection, ATR bracket sizing, lot quantities, and the
//! exit-side inversion of the armed trigger.

mod common;

use chrono::NaiveDate;
use common::{fut_contract, two_leg_trigger};
use hmt_engine::engine::evaluate;
use hmt_engine::gateway::{BracketPrices, bracket_prices, order_quantity, select_contract};
use hmt_engine::types::{TransactionType, TriggeredLeg, WebhookSignal};

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

// ---------------------------------------------------------------------------
// Signal validation
// ---------------------------------------------------------------------------

#[test]
fn signal_accepts_action_as_alias_for_trade_type() {
    let signal: WebhookSignal = serde_json::from_value(serde_json::json!({
        "webhook_key": "whk_123",
        "symbol": "NIFTY",
        "action": "BUY",
        "price": 24500.0,
        "atr": 120.0,
    }))
    .unwrap();
    assert_eq!(signal.trade_type, TransactionType::BUY);
    assert!(signal.validate().is_ok());
}

#[test]
fn signal_rejects_non_positive_numbers() {
    let mut signal: WebhookSignal = serde_json::from_value(serde_json::json!({
        "webhook_key": "whk_123",
        "symbol": "NIFTY",
        "trade_type": "SELL",
        "price": 24500.0,
        "atr": 120.0,
    }))
    .unwrap();
    assert!(signal.validate().is_ok());

    signal.price = 0.0;
    assert!(signal.validate().is_err());
    signal.price = 24500.0;
    signal.atr = -1.0;
    assert!(signal.validate().is_err());
    signal.atr = 120.0;
    signal.symbol = "  ".into();
    assert!(signal.validate().is_err());
}

#[test]
fn signal_without_required_fields_fails_to_parse() {
    let missing_atr = serde_json::json!({
        "webhook_key": "whk_123",
        "symbol": "NIFTY",
        "trade_type": "BUY",
        "price": 24500.0,
    });
    assert!(serde_json::from_value::<WebhookSignal>(missing_atr).is_err());
}

// ---------------------------------------------------------------------------
// Contract selection
// ---------------------------------------------------------------------------

#[test]
fn first_half_of_month_trades_nearest_expiry() {
    let near = fut_contract("NIFTY", date(2025, 11, 27), 75);
    let far = fut_contract("NIFTY", date(2025, 12, 24), 75);
    let contracts = vec![near.clone(), far];

    let picked = select_contract(&contracts, 10).unwrap();
    assert_eq!(picked.expiry, near.expiry);
}

#[test]
fn rollover_day_is_inclusive() {
    let near = fut_contract("NIFTY", date(2025, 11, 27), 75);
    let far = fut_contract("NIFTY", date(2025, 12, 24), 75);
    let contracts = vec![near.clone(), far.clone()];

    assert_eq!(select_contract(&contracts, 15).unwrap().expiry, near.expiry);
    assert_eq!(select_contract(&contracts, 16).unwrap().expiry, far.expiry);
}

#[test]
fn missing_expiry_slot_is_rejected() {
    let only_near = vec![fut_contract("NIFTY", date(2025, 11, 27), 75)];
    assert!(select_contract(&only_near, 20).is_none());
    assert!(select_contract(&[], 5).is_none());
}

#[test]
fn quantity_is_lot_size_times_multiplier() {
    assert_eq!(order_quantity(75, 1), 75);
    assert_eq!(order_quantity(75, 4), 300);
}

// ---------------------------------------------------------------------------
// Bracket sizing
// ---------------------------------------------------------------------------

#[test]
fn buy_entry_brackets_below_and_above() {
    // price 24500, atr 120, multipliers 1.5 / 2.0.
    let b = bracket_prices(TransactionType::BUY, 24_500.0, 120.0, 1.5, 2.0);
    assert_eq!(
        b,
        BracketPrices {
            stop: 24_320.0,
            target: 24_740.0
        }
    );
}

#[test]
fn sell_entry_mirrors_the_bracket() {
    let b = bracket_prices(TransactionType::SELL, 24_500.0, 120.0, 1.5, 2.0);
    assert_eq!(
        b,
        BracketPrices {
            stop: 24_680.0,
            target: 24_260.0
        }
    );
}

#[test]
fn exit_side_is_the_opposite_of_entry() {
    assert_eq!(TransactionType::BUY.opposite(), TransactionType::SELL);
    assert_eq!(TransactionType::SELL.opposite(), TransactionType::BUY);
}

/// The trigger a BUY signal arms must behave as a long exit: stop fires on
/// the way down, target on the way up, anchored at the signal price.
#[test]
fn armed_trigger_semantics_match_the_bracket() {
    let b = bracket_prices(TransactionType::BUY, 24_500.0, 120.0, 1.5, 2.0);
    let exit = two_leg_trigger(
        53_179_141,
        TransactionType::BUY.opposite(),
        b.stop,
        b.target,
        75,
        Some(24_500.0),
    );

    assert_eq!(
        evaluate(&exit, 24_320.0).map(|f| f.leg),
        Some(TriggeredLeg::Leg1),
        "stop leg fires at the stop price"
    );
    assert_eq!(
        evaluate(&exit, 24_740.0).map(|f| f.leg),
        Some(TriggeredLeg::Leg2),
        "target leg fires at the target price"
    );
    assert!(evaluate(&exit, 24_500.0).is_none(), "inert at the entry price");
    assert_eq!(
        evaluate(&exit, 24_320.0).unwrap().order.transaction_type,
        TransactionType::SELL
    );
}
