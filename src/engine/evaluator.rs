//! The tick evaluator: the pure fire/skip decision.
//!
//! `evaluate` performs no I/O and mutates nothing; it inspects one trigger
//! against one last-traded price and returns the firing descriptor if a leg's
//! condition is met. The caller owns everything that follows (risk gate,
//! dispatch, persistence).
//!
//! Crossing discipline: when a trigger carries a `reference_price` (the
//! market price at creation), a leg fires only if the price has strictly
//! crossed the threshold since then — the reference must sit on the far side.
//! Triggers created before reference tracking existed carry no reference and
//! keep the legacy behavior: the plain threshold comparison.

use crate::types::{ConditionType, Firing, TransactionType, Trigger, TriggeredLeg};

/// Decide whether `ltp` fires a leg of `trigger`.
///
/// Threshold comparisons are non-strict: a tick exactly at the trigger price
/// fires. For a two-leg trigger whose both legs are satisfied by the same
/// tick, leg 1 (the stop-loss) wins.
pub fn evaluate(trigger: &Trigger, ltp: f64) -> Option<Firing> {
    match trigger.condition_type {
        ConditionType::Single => evaluate_single(trigger, ltp),
        ConditionType::TwoLeg => evaluate_two_leg(trigger, ltp),
    }
}

/// An up-cross: price at or above the threshold, reference (if any) below it.
fn crossed_up(ltp: f64, threshold: f64, reference: Option<f64>) -> bool {
    ltp >= threshold && reference.is_none_or(|r| r < threshold)
}

/// A down-cross: price at or below the threshold, reference (if any) above it.
fn crossed_down(ltp: f64, threshold: f64, reference: Option<f64>) -> bool {
    ltp <= threshold && reference.is_none_or(|r| r > threshold)
}

fn fire(trigger: &Trigger, leg: TriggeredLeg, ltp: f64) -> Option<Firing> {
    Some(Firing {
        trigger_id: trigger.id,
        leg,
        observed_price: ltp,
        order: trigger.order_params(leg)?,
    })
}

fn evaluate_single(trigger: &Trigger, ltp: f64) -> Option<Firing> {
    let t1 = trigger.trigger_price;
    let r = trigger.reference_price;
    let hit = match trigger.transaction_type {
        TransactionType::BUY => crossed_up(ltp, t1, r),
        TransactionType::SELL => crossed_down(ltp, t1, r),
    };
    if hit {
        fire(trigger, TriggeredLeg::Leg1, ltp)
    } else {
        None
    }
}

/// Two-leg semantics. `transaction_type` is the exit side: SELL exits a long
/// (stop below, target above), BUY exits a short (mirrored). Leg 2 only
/// fires when its quantity and product are present.
fn evaluate_two_leg(trigger: &Trigger, ltp: f64) -> Option<Firing> {
    let t1 = trigger.trigger_price;
    let r = trigger.reference_price;

    let leg1_hit = match trigger.transaction_type {
        TransactionType::SELL => crossed_down(ltp, t1, r),
        TransactionType::BUY => crossed_up(ltp, t1, r),
    };
    if leg1_hit {
        return fire(trigger, TriggeredLeg::Leg1, ltp);
    }

    let t2 = trigger.trigger_price_2?;
    if trigger.quantity_2.is_none() || trigger.product_type_2.is_none() {
        return None;
    }
    let leg2_hit = match trigger.transaction_type {
        TransactionType::SELL => crossed_up(ltp, t2, r),
        TransactionType::BUY => crossed_down(ltp, t2, r),
    };
    if leg2_hit {
        return fire(trigger, TriggeredLeg::Leg2, ltp);
    }
    None
}
