//! Order executor: bounded-retry dispatch with error classification.
//!
//! Stateless across calls; the caller bounds concurrency to one in-flight
//! attempt per trigger via the index's single-flight guard.

use std::time::Duration;

use crate::broker::PlaceOrder;
use crate::error::{EngineError, Result};
use crate::types::Firing;

/// Broker rejections that retrying cannot fix. Matched case-insensitively as
/// substrings of the broker's error text.
const NON_RETRYABLE: &[&str] = &[
    "insufficient funds",
    "insufficient margin",
    "invalid quantity",
    "invalid price",
    "invalid symbol",
    "blocked",
    "disabled",
    "order window closed",
    "market closed",
];

/// Whether the error is worth another attempt.
///
/// Transport failures and unknown rejections are retryable; rejections whose
/// text matches [`NON_RETRYABLE`] abort the budget early.
pub fn is_retryable(err: &EngineError) -> bool {
    let text = match err {
        EngineError::Broker(body) => body.message.clone().unwrap_or_default(),
        EngineError::HttpStatus { body, .. } => body.clone(),
        // Network-level failures are always worth retrying.
        EngineError::Http(_) => return true,
        _ => return true,
    };
    let lower = text.to_lowercase();
    !NON_RETRYABLE.iter().any(|m| lower.contains(m))
}

/// Sleep before attempt `attempt` (1-based): `base · 2^(attempt-1)`.
pub fn backoff_delay(retry_backoff_ms: u64, attempt: u32) -> Duration {
    Duration::from_millis(retry_backoff_ms << (attempt - 1))
}

/// Retry budget for the executor.
#[derive(Debug, Clone, Copy)]
pub struct ExecutorConfig {
    /// Retries after the first attempt; `max_retries + 1` attempts total.
    pub max_retries: u32,
    /// Base backoff in ms, doubled per attempt.
    pub retry_backoff_ms: u64,
}

/// Dispatch the fired order, retrying transient failures.
///
/// Returns the broker order id on success. A non-retryable rejection aborts
/// immediately with the broker's reason.
pub async fn execute<B: PlaceOrder>(cfg: ExecutorConfig, broker: &B, firing: &Firing) -> Result<String> {
    let mut attempt: u32 = 0;
    loop {
        if attempt > 0 {
            tokio::time::sleep(backoff_delay(cfg.retry_backoff_ms, attempt)).await;
        }

        match broker.place_order(&firing.order).await {
            Ok(order_id) => {
                tracing::info!(
                    trigger = %firing.trigger_id,
                    leg = firing.leg.number(),
                    %order_id,
                    attempt,
                    "order placed"
                );
                return Ok(order_id);
            }
            Err(e) if attempt < cfg.max_retries && is_retryable(&e) => {
                tracing::warn!(
                    trigger = %firing.trigger_id,
                    attempt,
                    error = %e,
                    "order attempt failed; retrying"
                );
                attempt += 1;
            }
            Err(e) => {
                tracing::error!(
                    trigger = %firing.trigger_id,
                    attempt,
                    error = %e,
                    "order dispatch failed"
                );
                return Err(e);
            }
        }
    }
}
