//! Broker connections, risk limits, and positions (all read-mostly).

use uuid::Uuid;

use crate::error::Result;
use crate::store::client::StoreClient;
use crate::types::{BrokerConnection, Position, RiskLimits};

pub const BROKER_CONNECTIONS_TABLE: &str = "broker_connections";
pub const RISK_LIMITS_TABLE: &str = "risk_limits";
pub const POSITIONS_TABLE: &str = "positions";

impl StoreClient {
    /// Every currently active broker connection.
    pub async fn list_active_broker_connections(&self) -> Result<Vec<BrokerConnection>> {
        self.select(BROKER_CONNECTIONS_TABLE, "is_active=eq.true&select=*")
            .await
    }

    /// One broker connection by id, active or not.
    pub async fn get_broker_connection(&self, id: Uuid) -> Result<Option<BrokerConnection>> {
        let rows: Vec<BrokerConnection> = self
            .select(BROKER_CONNECTIONS_TABLE, &format!("id=eq.{id}&select=*"))
            .await?;
        Ok(rows.into_iter().next())
    }

    /// The user's risk limits; absent row means no limits are configured.
    pub async fn get_risk_limits(&self, user_id: Uuid) -> Result<Option<RiskLimits>> {
        let rows: Vec<RiskLimits> = self
            .select(RISK_LIMITS_TABLE, &format!("user_id=eq.{user_id}&select=*"))
            .await?;
        Ok(rows.into_iter().next())
    }

    /// Bump the user's fired-order count for today.
    pub async fn increment_daily_trade_count(&self, user_id: Uuid) -> Result<()> {
        self.rpc_void(
            "increment_daily_trade_count",
            &serde_json::json!({ "p_user_id": user_id }),
        )
        .await
    }

    /// Positions for one broker account. Read-only; feeds the UI's
    /// breakeven hint, never the fire decision.
    pub async fn list_positions(&self, broker_connection_id: Uuid) -> Result<Vec<Position>> {
        self.select(
            POSITIONS_TABLE,
            &format!("broker_connection_id=eq.{broker_connection_id}&select=*"),
        )
        .await
    }
}
