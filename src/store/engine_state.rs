//! Singleton election and heartbeat procedures.
//!
//! The `hmt_engine_state` row is the cluster-wide lock: acquisition succeeds
//! iff no row exists or the holder's heartbeat has gone stale. The store
//! procedures perform the compare-and-set so two racing instances cannot
//! both win.

use serde::Serialize;
use uuid::Uuid;

use crate::engine::stats::StatsSnapshot;
use crate::error::Result;
use crate::store::client::StoreClient;
use crate::types::EngineStateRow;

/// Logical table name.
pub const ENGINE_STATE_TABLE: &str = "hmt_engine_state";

#[derive(Serialize)]
struct LockArgs {
    p_instance_id: Uuid,
    p_stale_after_seconds: u64,
}

/// Heartbeat payload: counters plus feed status.
#[derive(Debug, Serialize)]
pub struct HeartbeatArgs {
    pub p_instance_id: Uuid,
    pub p_processed_ticks: u64,
    pub p_triggers_executed: u64,
    pub p_triggers_failed: u64,
    pub p_feed_connected: bool,
    pub p_active_triggers: u64,
}

impl StoreClient {
    /// Try to become the leader. Returns `true` when this instance now holds
    /// the lock.
    pub async fn acquire_engine_lock(
        &self,
        instance_id: Uuid,
        stale_after_seconds: u64,
    ) -> Result<bool> {
        self.rpc(
            "acquire_engine_lock",
            &LockArgs {
                p_instance_id: instance_id,
                p_stale_after_seconds: stale_after_seconds,
            },
        )
        .await
    }

    /// Refresh the leader heartbeat with the current counters.
    pub async fn update_engine_heartbeat(&self, args: &HeartbeatArgs) -> Result<()> {
        self.rpc_void("update_engine_heartbeat", args).await
    }

    /// Release the lock on graceful shutdown.
    pub async fn release_engine_lock(&self, instance_id: Uuid) -> Result<()> {
        self.rpc_void(
            "release_engine_lock",
            &serde_json::json!({ "p_instance_id": instance_id }),
        )
        .await
    }

    /// Read the engine-state row; `None` before first election.
    pub async fn get_engine_state(&self) -> Result<Option<EngineStateRow>> {
        let rows: Vec<EngineStateRow> = self.select(ENGINE_STATE_TABLE, "select=*&limit=1").await?;
        Ok(rows.into_iter().next())
    }

    /// Zero every user's daily risk counters; run once per trading day.
    pub async fn reset_daily_risk_counters(&self) -> Result<()> {
        self.rpc_void("reset_daily_risk_counters", &serde_json::json!({}))
            .await
    }
}

/// Build heartbeat args from a stats snapshot.
impl HeartbeatArgs {
    pub fn new(
        instance_id: Uuid,
        stats: StatsSnapshot,
        feed_connected: bool,
        active_triggers: u64,
    ) -> Self {
        Self {
            p_instance_id: instance_id,
            p_processed_ticks: stats.processed_ticks,
            p_triggers_executed: stats.triggers_executed,
            p_triggers_failed: stats.triggers_failed,
            p_feed_connected: feed_connected,
            p_active_triggers: active_triggers,
        }
    }
}
