//! Engine counters, shared lock-free between the tick handler, execution
//! tasks, and the health/heartbeat surfaces.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Monotonic counters for one engine process lifetime.
#[derive(Debug, Default)]
pub struct EngineStats {
    pub processed_ticks: AtomicU64,
    pub triggers_executed: AtomicU64,
    pub triggers_failed: AtomicU64,
    pub feed_reconnects: AtomicU64,
}

impl EngineStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tick_processed(&self) {
        self.processed_ticks.fetch_add(1, Ordering::Relaxed);
    }

    pub fn trigger_executed(&self) {
        self.triggers_executed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn trigger_failed(&self) {
        self.triggers_failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Point-in-time copy for serialization.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            processed_ticks: self.processed_ticks.load(Ordering::Relaxed),
            triggers_executed: self.triggers_executed.load(Ordering::Relaxed),
            triggers_failed: self.triggers_failed.load(Ordering::Relaxed),
            feed_reconnects: self.feed_reconnects.load(Ordering::Relaxed),
        }
    }
}

/// Serializable view of [`EngineStats`], embedded in `/health`, `/stats`,
/// and heartbeat writes.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct StatsSnapshot {
    pub processed_ticks: u64,
    pub triggers_executed: u64,
    pub triggers_failed: u64,
    pub feed_reconnects: u64,
}
