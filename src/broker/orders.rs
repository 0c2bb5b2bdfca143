//! Order placement.

use serde::Deserialize;

use crate::broker::client::BrokerClient;
use crate::constants::ORDER_ENDPOINT;
use crate::error::{BrokerErrorBody, EngineError, Result};
use crate::types::OrderParams;

/// Response envelope of the broker's order endpoint.
#[derive(Debug, Deserialize)]
struct OrderResponse {
    status: String,
    #[serde(default)]
    data: Option<OrderResponseData>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OrderResponseData {
    #[serde(default)]
    order_id: Option<String>,
}

/// The executor's transport seam: anything that can place a market order.
///
/// Implemented by [`BrokerClient`]; tests substitute a counting fake.
pub trait PlaceOrder {
    /// Place the order; resolves to the broker-assigned order id.
    fn place_order(&self, params: &OrderParams) -> impl Future<Output = Result<String>> + Send;
}

impl PlaceOrder for BrokerClient {
    /// Place a regular order.
    ///
    /// **Endpoint:** `POST /orders/regular` (form-encoded)
    ///
    /// Success requires a 2xx reply *and* `status == "success"` *and* a
    /// present `order_id`; anything else is an error carrying the broker's
    /// message for the retry classifier.
    async fn place_order(&self, params: &OrderParams) -> Result<String> {
        let resp: OrderResponse = self.post_form(ORDER_ENDPOINT, params).await?;

        if resp.status == "success" {
            if let Some(order_id) = resp.data.and_then(|d| d.order_id) {
                return Ok(order_id);
            }
        }
        Err(EngineError::Broker(BrokerErrorBody {
            status: Some(resp.status),
            error_type: None,
            message: resp.message.or(Some("order rejected without message".into())),
        }))
    }
}
