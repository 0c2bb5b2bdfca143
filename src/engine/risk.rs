//! Per-user risk gate.
//!
//! Checked after the fire decision and immediately before the broker call:
//! risk gates the upstream order, never the evaluation. A rejection marks
//! the trigger `failed` with the reason; it is not retried.

use chrono::{FixedOffset, NaiveTime, Utc};

use crate::types::RiskLimits;

/// Exchange-local offset (IST, UTC+05:30); cutoff times are stored in it.
const IST_OFFSET_SECS: i32 = 5 * 3600 + 30 * 60;

/// Current time of day at the exchange.
pub fn exchange_time_now() -> NaiveTime {
    let ist = FixedOffset::east_opt(IST_OFFSET_SECS).unwrap();
    Utc::now().with_timezone(&ist).time()
}

/// Evaluate the user's limits. `Err` carries the human-readable reason
/// persisted on the failed trigger.
pub fn check(limits: &RiskLimits, now_time: NaiveTime) -> std::result::Result<(), String> {
    if limits.kill_switch {
        return Err("risk: kill switch engaged".into());
    }
    if let Some(cap) = limits.max_daily_trades {
        if limits.daily_trade_count >= cap {
            return Err(format!("risk: daily trade cap reached ({cap})"));
        }
    }
    if let Some(floor) = limits.daily_loss_floor {
        if limits.realized_pnl_today <= floor {
            return Err(format!(
                "risk: daily loss floor breached ({:.2} <= {:.2})",
                limits.realized_pnl_today, floor
            ));
        }
    }
    if let Some(cutoff) = limits.trade_cutoff {
        if now_time >= cutoff {
            return Err(format!("risk: past trade cutoff {cutoff}"));
        }
    }
    Ok(())
}
