//! Risk gate (kill switch, daily cap, loss floor, cutoff time) and the
//! breakeven hint computed from positions.

mod common;

use chrono::NaiveTime;
use common::open_limits;
use hmt_engine::engine::risk::check;
use hmt_engine::types::{Exchange, Position};
use uuid::Uuid;

fn t(h: u32, m: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(h, m, 0).unwrap()
}

#[test]
fn permissive_limits_pass() {
    assert!(check(&open_limits(Uuid::new_v4()), t(10, 30)).is_ok());
}

#[test]
fn kill_switch_blocks_everything() {
    let mut limits = open_limits(Uuid::new_v4());
    limits.kill_switch = true;
    let reason = check(&limits, t(10, 30)).unwrap_err();
    assert!(reason.contains("kill switch"));
}

#[test]
fn daily_cap_is_inclusive() {
    let mut limits = open_limits(Uuid::new_v4());
    limits.max_daily_trades = Some(5);

    limits.daily_trade_count = 4;
    assert!(check(&limits, t(10, 30)).is_ok());

    limits.daily_trade_count = 5;
    assert!(check(&limits, t(10, 30)).is_err());
}

#[test]
fn loss_floor_halts_once_breached() {
    let mut limits = open_limits(Uuid::new_v4());
    limits.daily_loss_floor = Some(-10_000.0);

    limits.realized_pnl_today = -9_999.0;
    assert!(check(&limits, t(10, 30)).is_ok());

    limits.realized_pnl_today = -10_000.0;
    assert!(check(&limits, t(10, 30)).is_err());
}

#[test]
fn cutoff_time_is_inclusive() {
    let mut limits = open_limits(Uuid::new_v4());
    limits.trade_cutoff = Some(t(15, 0));

    assert!(check(&limits, t(14, 59)).is_ok());
    assert!(check(&limits, t(15, 0)).is_err());
    assert!(check(&limits, t(15, 30)).is_err());
}

#[test]
fn reasons_are_human_readable() {
    let mut limits = open_limits(Uuid::new_v4());
    limits.max_daily_trades = Some(3);
    limits.daily_trade_count = 3;
    let reason = check(&limits, t(10, 30)).unwrap_err();
    assert!(reason.starts_with("risk:"), "{reason}");
}

// ---------------------------------------------------------------------------
// Breakeven hint
// ---------------------------------------------------------------------------

fn position(quantity: i64, avg_price: f64) -> Position {
    Position {
        tradingsymbol: "NIFTY25NOVFUT".into(),
        exchange: Exchange::NFO,
        broker_connection_id: Uuid::new_v4(),
        avg_price,
        quantity,
    }
}

#[test]
fn long_stop_covers_breakeven_at_or_above_entry() {
    let long = position(75, 24_400.0);
    assert!(long.stop_covers_breakeven(24_400.0));
    assert!(long.stop_covers_breakeven(24_450.0));
    assert!(!long.stop_covers_breakeven(24_320.0));
}

#[test]
fn short_stop_covers_breakeven_at_or_below_entry() {
    let short = position(-75, 24_600.0);
    assert!(short.stop_covers_breakeven(24_600.0));
    assert!(short.stop_covers_breakeven(24_550.0));
    assert!(!short.stop_covers_breakeven(24_680.0));
}
