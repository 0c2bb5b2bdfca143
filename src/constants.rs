//! Constants for the trigger engine.
//!
//! Contains upstream endpoint URLs, engine timing defaults, and retry
//! parameters. These are used internally by the [`Supervisor`](crate::engine::Supervisor),
//! [`FeedManager`](crate::feed::FeedManager) and the store/broker clients,
//! but are also exported so operators can reference the defaults.

// ---------------------------------------------------------------------------
// Upstream URLs
// ---------------------------------------------------------------------------

/// Base URL for the upstream broker REST API.
pub const BROKER_API_URL: &str = "https://api.kite.trade";

/// WebSocket endpoint for the live market-data feed (binary ticks).
pub const FEED_WS_URL: &str = "wss://ws.kite.trade";

/// Path of the broker's regular order placement endpoint.
pub const ORDER_ENDPOINT: &str = "/orders/regular";

// ---------------------------------------------------------------------------
// Engine timing
// ---------------------------------------------------------------------------

/// Timing defaults for the engine lifecycle. All overridable through the
/// environment (see [`EngineConfig`](crate::config::EngineConfig)).
pub mod timing {
    /// Interval between heartbeat writes to the engine-state row, in ms.
    pub const HEARTBEAT_INTERVAL_MS: u64 = 10_000;

    /// Health-check interval, in ms. A lock holder whose heartbeat is older
    /// than twice this value is considered stale and may be evicted.
    pub const HEALTH_CHECK_INTERVAL_MS: u64 = 30_000;

    /// Multiplier applied to the health-check interval to derive lock
    /// staleness. Six missed heartbeats at the default rates.
    pub const STALE_THRESHOLD_FACTOR: u64 = 2;

    /// Delay before feed reconnect attempts and start-sequence retries, in ms.
    pub const RECONNECT_DELAY_MS: u64 = 5_000;

    /// Request-scoped deadline for broker and store calls, in ms.
    pub const REQUEST_TIMEOUT_MS: u64 = 10_000;
}

// ---------------------------------------------------------------------------
// Order dispatch
// ---------------------------------------------------------------------------

/// Retry parameters for the order executor.
pub mod dispatch {
    /// Maximum retries after the first attempt.
    pub const MAX_RETRIES: u32 = 2;

    /// Base backoff in ms; attempt `n` sleeps `base · 2^(n-1)` before running.
    pub const RETRY_BACKOFF_MS: u64 = 1_000;
}

// ---------------------------------------------------------------------------
// Webhook gateway
// ---------------------------------------------------------------------------

/// Sizing defaults for the strategy-signal gateway.
pub mod gateway {
    /// Stop distance as a multiple of the signal's ATR.
    pub const SL_MULTIPLIER: f64 = 1.5;

    /// Target distance as a multiple of the signal's ATR.
    pub const TARGET_MULTIPLIER: f64 = 2.0;

    /// Lots per order unless the webhook key overrides it.
    pub const LOT_MULTIPLIER: u32 = 1;

    /// Day of month up to which the nearest futures expiry is traded;
    /// afterwards the gateway rolls to the next expiry.
    pub const ROLLOVER_DAY: u32 = 15;
}

// ---------------------------------------------------------------------------
// Feed limits
// ---------------------------------------------------------------------------

/// Feed subscription constraints.
pub mod feed_limits {
    /// Maximum instrument tokens per single subscribe/unsubscribe message.
    pub const MAX_TOKENS_PER_MESSAGE: usize = 100;

    /// Minimum packet length that carries a token + price pair.
    pub const MIN_TICK_PACKET_LEN: usize = 8;
}

// ---------------------------------------------------------------------------
// Store paths
// ---------------------------------------------------------------------------

/// Path fragments of the durable store's REST and realtime surfaces.
pub mod store_paths {
    /// Prefix for table access.
    pub const REST_PREFIX: &str = "/rest/v1";

    /// Prefix for stored-procedure calls.
    pub const RPC_PREFIX: &str = "/rest/v1/rpc";

    /// Realtime websocket path.
    pub const REALTIME_PATH: &str = "/realtime/v1/websocket";
}
