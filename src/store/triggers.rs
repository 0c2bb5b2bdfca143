//! Trigger rows: reads and the four atomic status transitions.
//!
//! The transitions are the engine's only writes to `hmt_gtt_orders`. Cancel
//! is conditional on `status=active` — the OCO atomicity guard: when the
//! sibling already fired and left `active`, the cancel matches no row and is
//! a store-level no-op.

use chrono::Utc;
use uuid::Uuid;

use crate::error::Result;
use crate::store::client::StoreClient;
use crate::types::{NewTrigger, TradeLogEntry, Trigger, TriggeredLeg};

/// Logical table names.
pub const TRIGGERS_TABLE: &str = "hmt_gtt_orders";
pub const TRADE_LOG_TABLE: &str = "hmt_trade_log";

impl StoreClient {
    /// Load every `active` trigger; the start-sequence index rebuild.
    pub async fn load_active_triggers(&self) -> Result<Vec<Trigger>> {
        self.select(TRIGGERS_TABLE, "status=eq.active&select=*")
            .await
    }

    /// Fetch one trigger row by id.
    pub async fn get_trigger(&self, id: Uuid) -> Result<Option<Trigger>> {
        let rows: Vec<Trigger> = self
            .select(TRIGGERS_TABLE, &format!("id=eq.{id}&select=*"))
            .await?;
        Ok(rows.into_iter().next())
    }

    /// Create a trigger row; returns the stored record.
    pub async fn insert_trigger(&self, new: &NewTrigger) -> Result<Trigger> {
        let rows: Vec<Trigger> = self.insert(TRIGGERS_TABLE, new).await?;
        rows.into_iter().next().ok_or_else(|| {
            crate::error::EngineError::InvalidArgument(
                "store returned no representation for inserted trigger".into(),
            )
        })
    }

    /// Transition to `triggered` with the audit fields. Unconditional.
    pub async fn mark_triggered(
        &self,
        id: Uuid,
        leg: TriggeredLeg,
        observed_price: f64,
        broker_order_id: &str,
    ) -> Result<()> {
        let now = Utc::now();
        let body = serde_json::json!({
            "status": "triggered",
            "triggered_leg": leg.number(),
            "triggered_price": observed_price,
            "broker_order_id": broker_order_id,
            "triggered_at": now,
            "updated_at": now,
        });
        let _rows: Vec<serde_json::Value> = self
            .update(TRIGGERS_TABLE, &format!("id=eq.{id}"), &body)
            .await?;
        Ok(())
    }

    /// Transition to `failed` with the human-readable reason.
    pub async fn mark_failed(&self, id: Uuid, reason: &str) -> Result<()> {
        let body = serde_json::json!({
            "status": "failed",
            "error_message": reason,
            "updated_at": Utc::now(),
        });
        let _rows: Vec<serde_json::Value> = self
            .update(TRIGGERS_TABLE, &format!("id=eq.{id}"), &body)
            .await?;
        Ok(())
    }

    /// Transition to `cancelled` iff the row is still `active`.
    ///
    /// Returns whether this writer won the row. Idempotent: once the row has
    /// left `active`, repeated calls match nothing.
    pub async fn cancel_if_active(&self, id: Uuid, reason: &str) -> Result<bool> {
        let body = serde_json::json!({
            "status": "cancelled",
            "error_message": reason,
            "updated_at": Utc::now(),
        });
        let rows: Vec<serde_json::Value> = self
            .update(
                TRIGGERS_TABLE,
                &format!("id=eq.{id}&status=eq.active"),
                &body,
            )
            .await?;
        Ok(!rows.is_empty())
    }

    /// Append the per-fire audit row. Callers treat failures as best-effort.
    pub async fn append_trade_log(&self, entry: &TradeLogEntry) -> Result<()> {
        let _rows: Vec<serde_json::Value> = self.insert(TRADE_LOG_TABLE, entry).await?;
        Ok(())
    }
}
