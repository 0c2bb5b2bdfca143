//! Trigger index invariants: single-flight, bucket pruning, idempotent
//! removal, OCO sibling lookup, and the subscription set.

mod common;

use common::{single_trigger, two_leg_trigger};
use hmt_engine::engine::TriggerIndex;
use hmt_engine::types::{TransactionType, TriggerStatus};
use uuid::Uuid;

#[test]
fn add_then_remove_restores_prior_state() {
    let index = TriggerIndex::new();
    let t = single_trigger(256265, TransactionType::BUY, 100.0, 10, None);
    let id = t.id;

    index.add(t);
    assert_eq!(index.count(), 1);
    assert_eq!(index.subscribed_instruments(), vec![256265]);

    index.remove(id);
    assert_eq!(index.count(), 0);
    assert!(index.subscribed_instruments().is_empty());
    assert!(!index.has_instrument(256265));
}

#[test]
fn remove_is_idempotent() {
    let index = TriggerIndex::new();
    let t = single_trigger(256265, TransactionType::BUY, 100.0, 10, None);
    let id = t.id;
    index.add(t);

    index.remove(id);
    index.remove(id);
    index.remove(Uuid::new_v4());
    assert_eq!(index.count(), 0);
}

#[test]
fn non_active_rows_are_not_indexed() {
    let index = TriggerIndex::new();
    let mut t = single_trigger(256265, TransactionType::BUY, 100.0, 10, None);
    t.status = TriggerStatus::Cancelled;
    index.add(t);
    assert_eq!(index.count(), 0);
}

#[test]
fn for_instrument_returns_only_that_bucket() {
    let index = TriggerIndex::new();
    let a = single_trigger(1001, TransactionType::BUY, 100.0, 10, None);
    let b = single_trigger(1001, TransactionType::SELL, 90.0, 10, None);
    let c = single_trigger(2002, TransactionType::BUY, 50.0, 5, None);
    index.add(a);
    index.add(b);
    index.add(c);

    assert_eq!(index.for_instrument(1001).len(), 2);
    assert_eq!(index.for_instrument(2002).len(), 1);
    assert!(index.for_instrument(3003).is_empty());

    let mut tokens = index.subscribed_instruments();
    tokens.sort_unstable();
    assert_eq!(tokens, vec![1001, 2002]);
}

#[test]
fn mark_processing_is_single_flight() {
    let index = TriggerIndex::new();
    let t = single_trigger(256265, TransactionType::BUY, 100.0, 10, None);
    let id = t.id;
    index.add(t);

    assert!(index.mark_processing(id), "first claim wins");
    assert!(!index.mark_processing(id), "second claim must lose");

    index.unmark_processing(id);
    assert!(index.mark_processing(id), "claim reopens after release");
}

#[test]
fn unknown_ids_cannot_be_claimed() {
    let index = TriggerIndex::new();
    assert!(!index.mark_processing(Uuid::new_v4()));
}

#[test]
fn removal_clears_the_claim() {
    let index = TriggerIndex::new();
    let t = single_trigger(256265, TransactionType::BUY, 100.0, 10, None);
    let id = t.id;
    index.add(t.clone());
    assert!(index.mark_processing(id));

    index.remove(id);
    index.add(t);
    assert!(index.mark_processing(id), "re-added row starts unclaimed");
}

#[test]
fn oco_sibling_links_through_parent_id() {
    let index = TriggerIndex::new();
    let parent = Uuid::new_v4();
    let mut a = two_leg_trigger(408065, TransactionType::SELL, 90.0, 110.0, 25, Some(100.0));
    let mut b = two_leg_trigger(408065, TransactionType::SELL, 90.0, 110.0, 25, Some(100.0));
    a.parent_id = Some(parent);
    b.parent_id = Some(parent);
    let (a_id, b_id) = (a.id, b.id);
    index.add(a);
    index.add(b);

    assert_eq!(index.oco_sibling(a_id), Some(b_id));
    assert_eq!(index.oco_sibling(b_id), Some(a_id));

    index.remove(b_id);
    assert_eq!(index.oco_sibling(a_id), None);
}

#[test]
fn sibling_lookup_without_parent_is_none() {
    let index = TriggerIndex::new();
    let t = two_leg_trigger(408065, TransactionType::SELL, 90.0, 110.0, 25, None);
    let id = t.id;
    index.add(t);
    assert_eq!(index.oco_sibling(id), None);
}

/// The feed's intended-subscription set must stay a superset of the index's
/// instruments through any add/remove sequence. Without a live connection
/// the manager just records intent, which is exactly what this checks.
#[tokio::test]
async fn feed_subscription_set_covers_index() {
    use hmt_engine::feed::{FeedConfig, FeedManager};

    let index = TriggerIndex::new();
    let feed = FeedManager::new(FeedConfig {
        url: "wss://feed.invalid".into(),
        api_key: "k".into(),
        access_token: "t".into(),
        reconnect_delay_ms: 5_000,
    });

    let a = single_trigger(1001, TransactionType::BUY, 100.0, 10, None);
    let b = single_trigger(2002, TransactionType::SELL, 90.0, 10, None);
    let (a_id, b_id) = (a.id, b.id);
    index.add(a);
    index.add(b);
    feed.subscribe(&index.subscribed_instruments()).await.unwrap();

    let covers = |feed: &FeedManager, index: &TriggerIndex| {
        let tokens = feed.subscribed_tokens();
        index.subscribed_instruments().iter().all(|t| tokens.contains(t))
    };
    assert!(covers(&feed, &index));

    index.remove(a_id);
    assert!(covers(&feed, &index), "stale feed tokens are allowed, gaps are not");

    feed.unsubscribe(&[1001]).await.unwrap();
    assert!(covers(&feed, &index));

    index.remove(b_id);
    feed.unsubscribe(&[2002]).await.unwrap();
    assert!(covers(&feed, &index));
    assert!(feed.subscribed_tokens().is_empty());
}

#[test]
fn clear_empties_everything() {
    let index = TriggerIndex::new();
    let t = single_trigger(256265, TransactionType::BUY, 100.0, 10, None);
    let id = t.id;
    index.add(t);
    index.mark_processing(id);

    index.clear();
    assert_eq!(index.count(), 0);
    assert!(index.subscribed_instruments().is_empty());
    assert!(!index.mark_processing(id), "cleared rows cannot be claimed");
}
