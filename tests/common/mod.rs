//! Shared builders for integration tests.
#![allow(dead_code)]

use chrono::Utc;
use uuid::Uuid;

use hmt_engine::types::*;

/// A minimal active single trigger on `token`.
pub fn single_trigger(
    token: u32,
    side: TransactionType,
    trigger_price: f64,
    quantity: u32,
    reference_price: Option<f64>,
) -> Trigger {
    base_trigger(token, ConditionType::Single, side, trigger_price, quantity, reference_price)
}

/// A two-leg trigger: leg 1 = stop at `t1`, leg 2 = target at `t2`,
/// `exit_side` the side of the order placed on fire.
pub fn two_leg_trigger(
    token: u32,
    exit_side: TransactionType,
    t1: f64,
    t2: f64,
    quantity: u32,
    reference_price: Option<f64>,
) -> Trigger {
    let mut t = base_trigger(token, ConditionType::TwoLeg, exit_side, t1, quantity, reference_price);
    t.trigger_price_2 = Some(t2);
    t.quantity_2 = Some(quantity);
    t.product_type_2 = Some(ProductType::MIS);
    t
}

fn base_trigger(
    token: u32,
    condition_type: ConditionType,
    side: TransactionType,
    trigger_price: f64,
    quantity: u32,
    reference_price: Option<f64>,
) -> Trigger {
    let now = Utc::now();
    Trigger {
        id: Uuid::new_v4(),
        user_id: Uuid::new_v4(),
        broker_connection_id: Uuid::new_v4(),
        exchange: Exchange::NSE,
        tradingsymbol: "TCS".into(),
        instrument_token: token,
        condition_type,
        transaction_type: side,
        product_type: ProductType::MIS,
        trigger_price,
        order_price: None,
        quantity,
        product_type_2: None,
        trigger_price_2: None,
        order_price_2: None,
        quantity_2: None,
        parent_id: None,
        reference_price,
        status: TriggerStatus::Active,
        metadata: serde_json::Value::Null,
        triggered_leg: None,
        triggered_price: None,
        broker_order_id: None,
        error_message: None,
        triggered_at: None,
        created_at: now,
        updated_at: now,
    }
}

/// A futures contract row for gateway tests.
pub fn fut_contract(symbol: &str, expiry: chrono::NaiveDate, lot_size: u32) -> FutContract {
    FutContract {
        tradingsymbol: format!("{symbol}{}FUT", expiry.format("%y%b").to_string().to_uppercase()),
        instrument_token: 53_179_141,
        exchange: Exchange::NFO,
        underlying: symbol.to_owned(),
        expiry,
        lot_size,
        is_active: true,
    }
}

/// Risk limits with everything permissive.
pub fn open_limits(user_id: Uuid) -> RiskLimits {
    RiskLimits {
        user_id,
        kill_switch: false,
        max_daily_trades: None,
        daily_trade_count: 0,
        daily_loss_floor: None,
        realized_pnl_today: 0.0,
        trade_cutoff: None,
    }
}
