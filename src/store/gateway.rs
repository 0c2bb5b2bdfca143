//! Store access for the webhook gateway: keys, contract master, order and
//! notification rows, and the request audit log.

use chrono::{NaiveDate, Utc};
use uuid::Uuid;

use crate::error::Result;
use crate::store::client::StoreClient;
use crate::types::{FutContract, NewNotification, NewOrderRow, NewWebhookLog, WebhookKey};

pub const WEBHOOK_KEYS_TABLE: &str = "webhook_keys";
pub const INSTRUMENTS_TABLE: &str = "nfo_instruments";
pub const ORDERS_TABLE: &str = "orders";
pub const NOTIFICATIONS_TABLE: &str = "notifications";
pub const WEBHOOK_LOG_TABLE: &str = "tradingview_webhook_logs";

impl StoreClient {
    /// Look up a webhook key by its secret value.
    pub async fn find_webhook_key(&self, key: &str) -> Result<Option<WebhookKey>> {
        let rows: Vec<WebhookKey> = self
            .select(WEBHOOK_KEYS_TABLE, &format!("webhook_key=eq.{key}&select=*"))
            .await?;
        Ok(rows.into_iter().next())
    }

    /// Stamp the key's `last_used_at`.
    pub async fn touch_webhook_key(&self, id: Uuid) -> Result<()> {
        let _rows: Vec<serde_json::Value> = self
            .update(
                WEBHOOK_KEYS_TABLE,
                &format!("id=eq.{id}"),
                &serde_json::json!({ "last_used_at": Utc::now() }),
            )
            .await?;
        Ok(())
    }

    /// Active futures contracts for the underlying with expiry on or after
    /// `today`, nearest first. Two rows suffice for the rollover rule.
    pub async fn nearest_futures(
        &self,
        underlying: &str,
        today: NaiveDate,
    ) -> Result<Vec<FutContract>> {
        self.select(
            INSTRUMENTS_TABLE,
            &format!(
                "underlying=eq.{underlying}&is_active=eq.true&expiry=gte.{today}&order=expiry.asc&limit=2&select=*"
            ),
        )
        .await
    }

    /// Record a placed entry order.
    pub async fn insert_order(&self, row: &NewOrderRow) -> Result<()> {
        let _rows: Vec<serde_json::Value> = self.insert(ORDERS_TABLE, row).await?;
        Ok(())
    }

    /// Queue a user notification.
    pub async fn insert_notification(&self, row: &NewNotification) -> Result<()> {
        let _rows: Vec<serde_json::Value> = self.insert(NOTIFICATIONS_TABLE, row).await?;
        Ok(())
    }

    /// Append a webhook audit row. Every request is recorded, accepted or
    /// rejected; failures here are logged by the caller and never fail the
    /// request itself.
    pub async fn append_webhook_log(&self, row: &NewWebhookLog) -> Result<()> {
        let _rows: Vec<serde_json::Value> = self.insert(WEBHOOK_LOG_TABLE, row).await?;
        Ok(())
    }
}
