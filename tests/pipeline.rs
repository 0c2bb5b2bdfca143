//! The firing pipeline's decision layer: index lookup, single-flight
//! claims, evaluation, and OCO sibling eviction, driven tick by tick.
//!
//! The store and broker sides of the pipeline are exercised separately
//! (`executor.rs` covers dispatch); here the eviction that follows a
//! successful fire is applied synchronously so the index semantics are
//! deterministic.

mod common;

use common::{single_trigger, two_leg_trigger};
use hmt_engine::engine::{TriggerIndex, evaluate};
use hmt_engine::types::{Firing, TransactionType, TriggeredLeg};
use uuid::Uuid;

/// Feed one tick through the decision stage, emulating a fire's follow-up:
/// cancel+evict the OCO sibling, then evict the fired trigger.
fn drive_tick(index: &TriggerIndex, token: u32, ltp: f64) -> Vec<Firing> {
    let mut fired = Vec::new();
    for trigger in index.for_instrument(token) {
        if !index.mark_processing(trigger.id) {
            continue;
        }
        match evaluate(&trigger, ltp) {
            None => index.unmark_processing(trigger.id),
            Some(firing) => {
                if let Some(sibling) = index.oco_sibling(trigger.id) {
                    index.remove(sibling);
                }
                index.remove(trigger.id);
                index.unmark_processing(trigger.id);
                fired.push(firing);
            }
        }
    }
    fired
}

fn drive(index: &TriggerIndex, token: u32, prices: &[f64]) -> Vec<Firing> {
    prices
        .iter()
        .flat_map(|&p| drive_tick(index, token, p))
        .collect()
}

#[test]
fn single_buy_fires_once_and_is_evicted() {
    let index = TriggerIndex::new();
    let t = single_trigger(256265, TransactionType::BUY, 100.0, 10, Some(95.0));
    index.add(t);

    let fired = drive(&index, 256265, &[96.0, 99.0, 99.5, 101.0]);
    assert_eq!(fired.len(), 1);
    assert_eq!(fired[0].leg, TriggeredLeg::Leg1);
    assert_eq!(fired[0].observed_price, 101.0);
    assert_eq!(fired[0].order.quantity, 10);

    assert_eq!(index.count(), 0, "fired trigger leaves the index");
    // Later ticks find nothing.
    assert!(drive(&index, 256265, &[105.0]).is_empty());
}

#[test]
fn sell_without_crossing_stays_armed() {
    let index = TriggerIndex::new();
    let t = single_trigger(256265, TransactionType::SELL, 200.0, 5, Some(150.0));
    index.add(t);

    let fired = drive(&index, 256265, &[180.0, 195.0, 199.9]);
    assert!(fired.is_empty());
    assert_eq!(index.count(), 1, "no state change without a crossing");
}

#[test]
fn ticks_for_unknown_instruments_are_ignored() {
    let index = TriggerIndex::new();
    index.add(single_trigger(256265, TransactionType::BUY, 100.0, 10, None));
    assert!(drive(&index, 999_999, &[101.0]).is_empty());
    assert_eq!(index.count(), 1);
}

#[test]
fn oco_stop_fires_and_sibling_is_evicted() {
    let index = TriggerIndex::new();
    let parent = Uuid::new_v4();
    let mut a = two_leg_trigger(408065, TransactionType::SELL, 90.0, 110.0, 25, Some(100.0));
    let mut b = two_leg_trigger(408065, TransactionType::SELL, 90.0, 110.0, 25, Some(100.0));
    a.parent_id = Some(parent);
    b.parent_id = Some(parent);
    index.add(a);
    index.add(b);

    let fired = drive_tick(&index, 408065, 85.0);
    assert_eq!(fired.len(), 1, "one leg wins; the sibling is gone");
    assert_eq!(fired[0].leg, TriggeredLeg::Leg1);
    assert_eq!(index.count(), 0, "both legs evicted");

    // The second tick has no effect.
    assert!(drive_tick(&index, 408065, 115.0).is_empty());
}

#[test]
fn oco_target_fires_when_price_runs_up() {
    let index = TriggerIndex::new();
    let parent = Uuid::new_v4();
    let mut a = two_leg_trigger(408065, TransactionType::SELL, 90.0, 110.0, 25, Some(100.0));
    let mut b = two_leg_trigger(408065, TransactionType::SELL, 90.0, 110.0, 25, Some(100.0));
    a.parent_id = Some(parent);
    b.parent_id = Some(parent);
    index.add(a);
    index.add(b);

    let fired = drive(&index, 408065, &[99.0, 112.0]);
    assert_eq!(fired.len(), 1);
    assert_eq!(fired[0].leg, TriggeredLeg::Leg2);
    assert_eq!(fired[0].observed_price, 112.0);
    assert_eq!(index.count(), 0);
}

#[test]
fn in_flight_trigger_is_skipped_by_later_ticks() {
    let index = TriggerIndex::new();
    let t = single_trigger(256265, TransactionType::BUY, 100.0, 10, None);
    let id = t.id;
    index.add(t);

    // An execution task holds the claim; the condition holding again must
    // not produce a second firing.
    assert!(index.mark_processing(id));
    assert!(drive_tick(&index, 256265, 101.0).is_empty());
    assert!(drive_tick(&index, 256265, 102.0).is_empty());

    index.unmark_processing(id);
    assert_eq!(drive_tick(&index, 256265, 103.0).len(), 1);
}
