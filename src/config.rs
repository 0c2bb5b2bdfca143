//! Engine configuration loaded from the environment.
//!
//! Every tunable documented in the deployment guide maps to one field here;
//! missing optional variables fall back to the defaults in
//! [`crate::constants`]. Only the store URL and service key are required.

use std::time::Duration;

use crate::constants::{BROKER_API_URL, FEED_WS_URL, dispatch, timing};
use crate::error::{EngineError, Result};

/// Runtime configuration for the engine process.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Master switch: when false the supervisor refuses to start.
    pub engine_enabled: bool,
    /// Maximum order-dispatch retries after the first attempt.
    pub max_retries: u32,
    /// Base backoff between dispatch attempts, in ms.
    pub retry_backoff_ms: u64,
    /// Health-check interval, in ms. Lock staleness is twice this value.
    pub health_check_interval_ms: u64,
    /// Delay before feed reconnects and start-sequence retries, in ms.
    pub reconnect_delay_ms: u64,
    /// Request deadline for broker and store calls, in ms.
    pub request_timeout_ms: u64,
    /// Base URL of the durable store.
    pub store_url: String,
    /// Service key for the durable store.
    pub store_service_key: String,
    /// Market-data feed websocket URL.
    pub feed_url: String,
    /// Broker REST API base URL.
    pub broker_api_url: String,
    /// Bind address for the health/control/webhook HTTP server.
    pub bind_addr: String,
}

impl EngineConfig {
    /// Load the configuration from environment variables.
    ///
    /// Returns [`EngineError::InvalidArgument`] when a required variable is
    /// absent or a numeric variable fails to parse.
    pub fn from_env() -> Result<Self> {
        let store_url = require("STORE_URL")?;
        url::Url::parse(&store_url)?;
        let store_service_key = require("STORE_SERVICE_KEY")?;

        Ok(Self {
            engine_enabled: parse_or("ENGINE_ENABLED", true)?,
            max_retries: parse_or("MAX_RETRIES", dispatch::MAX_RETRIES)?,
            retry_backoff_ms: parse_or("RETRY_BACKOFF_MS", dispatch::RETRY_BACKOFF_MS)?,
            health_check_interval_ms: parse_or(
                "HEALTH_CHECK_INTERVAL_MS",
                timing::HEALTH_CHECK_INTERVAL_MS,
            )?,
            reconnect_delay_ms: parse_or("RECONNECT_DELAY_MS", timing::RECONNECT_DELAY_MS)?,
            request_timeout_ms: parse_or("REQUEST_TIMEOUT_MS", timing::REQUEST_TIMEOUT_MS)?,
            store_url: store_url.trim_end_matches('/').to_owned(),
            store_service_key,
            feed_url: std::env::var("FEED_URL").unwrap_or_else(|_| FEED_WS_URL.to_owned()),
            broker_api_url: std::env::var("BROKER_API_URL")
                .unwrap_or_else(|_| BROKER_API_URL.to_owned()),
            bind_addr: std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_owned()),
        })
    }

    /// The heartbeat age beyond which another instance may seize the lock.
    pub fn stale_threshold(&self) -> Duration {
        Duration::from_millis(self.health_check_interval_ms * timing::STALE_THRESHOLD_FACTOR)
    }

    /// Reconnect/start-retry delay as a [`Duration`].
    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }

    /// Request deadline as a [`Duration`].
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

fn require(name: &str) -> Result<String> {
    std::env::var(name)
        .ok()
        .filter(|v| !v.is_empty())
        .ok_or_else(|| EngineError::InvalidArgument(format!("{name} is not set")))
}

fn parse_or<T: std::str::FromStr>(name: &str, default: T) -> Result<T> {
    match std::env::var(name) {
        Ok(raw) => raw
            .parse()
            .map_err(|_| EngineError::InvalidArgument(format!("{name}={raw} is not valid"))),
        Err(_) => Ok(default),
    }
}
