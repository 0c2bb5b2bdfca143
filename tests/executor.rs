//! Order executor: retry budget, backoff schedule, and the non-retryable
//! classifier, exercised against a scripted in-memory transport.

mod common;

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};

use common::single_trigger;
use hmt_engine::broker::PlaceOrder;
use hmt_engine::engine::evaluate;
use hmt_engine::engine::executor::{ExecutorConfig, backoff_delay, execute, is_retryable};
use hmt_engine::error::{BrokerErrorBody, EngineError, Result};
use hmt_engine::types::{Firing, OrderParams, TransactionType};

// ---------------------------------------------------------------------------
// Scripted transport
// ---------------------------------------------------------------------------

/// Replays a scripted sequence of outcomes and counts attempts.
struct ScriptedBroker {
    script: parking_lot::Mutex<VecDeque<Result<String>>>,
    calls: AtomicU32,
}

impl ScriptedBroker {
    fn new(script: Vec<Result<String>>) -> Self {
        Self {
            script: parking_lot::Mutex::new(script.into()),
            calls: AtomicU32::new(0),
        }
    }

    fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

impl PlaceOrder for ScriptedBroker {
    async fn place_order(&self, _params: &OrderParams) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.script
            .lock()
            .pop_front()
            .unwrap_or_else(|| Ok("fallback-order".into()))
    }
}

fn broker_error(message: &str) -> EngineError {
    EngineError::Broker(BrokerErrorBody {
        status: Some("error".into()),
        error_type: None,
        message: Some(message.into()),
    })
}

fn firing() -> Firing {
    let t = single_trigger(256265, TransactionType::BUY, 100.0, 10, None);
    evaluate(&t, 101.0).expect("fixture must fire")
}

const CFG: ExecutorConfig = ExecutorConfig {
    max_retries: 2,
    retry_backoff_ms: 1_000,
};

// ---------------------------------------------------------------------------
// Classifier
// ---------------------------------------------------------------------------

#[test]
fn margin_rejection_is_non_retryable_regardless_of_case() {
    assert!(!is_retryable(&broker_error("Insufficient margin")));
    assert!(!is_retryable(&broker_error("INSUFFICIENT MARGIN for order")));
    assert!(!is_retryable(&broker_error("insufficient funds available")));
}

#[test]
fn known_permanent_rejections_are_non_retryable() {
    for msg in [
        "Invalid quantity for lot size",
        "invalid price entered",
        "Invalid symbol",
        "Your account is blocked for trading",
        "Trading is disabled",
        "Order window closed for the day",
        "Market closed",
    ] {
        assert!(!is_retryable(&broker_error(msg)), "{msg} must abort retries");
    }
}

#[test]
fn unknown_rejections_and_transport_failures_are_retryable() {
    assert!(is_retryable(&broker_error("Gateway timed out")));
    assert!(is_retryable(&broker_error("Too many requests")));
    assert!(is_retryable(&EngineError::InvalidArgument("anything".into())));
}

#[test]
fn backoff_doubles_per_attempt() {
    assert_eq!(backoff_delay(1_000, 1).as_millis(), 1_000);
    assert_eq!(backoff_delay(1_000, 2).as_millis(), 2_000);
    assert_eq!(backoff_delay(1_000, 3).as_millis(), 4_000);
    assert_eq!(backoff_delay(250, 1).as_millis(), 250);
}

// ---------------------------------------------------------------------------
// Retry loop
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn success_on_first_attempt_makes_one_call() {
    let broker = ScriptedBroker::new(vec![Ok("251101000000001".into())]);
    let order_id = execute(CFG, &broker, &firing()).await.unwrap();
    assert_eq!(order_id, "251101000000001");
    assert_eq!(broker.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn non_retryable_rejection_stops_after_one_post() {
    let broker = ScriptedBroker::new(vec![Err(broker_error("Insufficient margin"))]);
    let err = execute(CFG, &broker, &firing()).await.unwrap_err();
    assert_eq!(broker.calls(), 1, "no retry after a permanent rejection");
    assert!(err.reason().contains("Insufficient margin"));
}

#[tokio::test(start_paused = true)]
async fn transient_failures_consume_the_whole_budget() {
    let broker = ScriptedBroker::new(vec![
        Err(broker_error("Gateway timed out")),
        Err(broker_error("Gateway timed out")),
        Err(broker_error("Gateway timed out")),
    ]);
    assert!(execute(CFG, &broker, &firing()).await.is_err());
    // max_retries = 2 means three attempts total.
    assert_eq!(broker.calls(), 3);
}

#[tokio::test(start_paused = true)]
async fn recovers_after_a_transient_failure() {
    let broker = ScriptedBroker::new(vec![
        Err(broker_error("Gateway timed out")),
        Ok("251101000000002".into()),
    ]);
    let order_id = execute(CFG, &broker, &firing()).await.unwrap();
    assert_eq!(order_id, "251101000000002");
    assert_eq!(broker.calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn zero_retry_budget_means_single_attempt() {
    let cfg = ExecutorConfig {
        max_retries: 0,
        retry_backoff_ms: 1_000,
    };
    let broker = ScriptedBroker::new(vec![Err(broker_error("Gateway timed out"))]);
    assert!(execute(cfg, &broker, &firing()).await.is_err());
    assert_eq!(broker.calls(), 1);
}
