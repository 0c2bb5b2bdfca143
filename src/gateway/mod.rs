//! Webhook gateway: strategy signals in, entry order + bracket trigger out.
//!
//! A signal names a cash underlying; the gateway resolves the futures
//! contract to trade, places the market entry order, and — only after the
//! broker accepts it — persists the order row and arms a two-leg exit
//! trigger (leg 1 stop-loss, leg 2 target) sized from the signal's ATR.
//! Account failures are isolated: the response enumerates per-account
//! outcomes and the overall success count.

use std::time::Duration;

use chrono::{Datelike, FixedOffset, NaiveDate, Utc};

use crate::broker::{BrokerClient, PlaceOrder};
use crate::constants::gateway as defaults;
use crate::error::EngineError;
use crate::store::StoreClient;
use crate::types::{
    AccountOutcome, BrokerConnection, ConditionType, Exchange, FutContract, NewNotification,
    NewOrderRow, NewTrigger, OrderParams, OrderType, ProductType, TransactionType, TriggerStatus,
    Validity, WebhookKey, WebhookResponse, WebhookSignal,
};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Rejection categories mapped to HTTP codes by the server layer.
#[derive(Debug)]
pub enum GatewayError {
    /// 401 — unknown or inactive webhook key.
    Unauthorized(String),
    /// 400 — payload or resolution failure.
    BadRequest(String),
    /// 500 — unexpected upstream failure.
    Internal(EngineError),
}

impl GatewayError {
    /// The reason string recorded in the audit log.
    pub fn reason(&self) -> String {
        match self {
            Self::Unauthorized(r) | Self::BadRequest(r) => r.clone(),
            Self::Internal(e) => e.to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Pure pieces
// ---------------------------------------------------------------------------

/// Stop and target prices derived from the signal.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BracketPrices {
    pub stop: f64,
    pub target: f64,
}

/// Size the bracket from the ATR: stop at `atr · sl_mult` against the entry,
/// target at `atr · target_mult` in its favor.
pub fn bracket_prices(
    entry_side: TransactionType,
    price: f64,
    atr: f64,
    sl_mult: f64,
    target_mult: f64,
) -> BracketPrices {
    let sl = atr * sl_mult;
    let tgt = atr * target_mult;
    match entry_side {
        TransactionType::BUY => BracketPrices {
            stop: price - sl,
            target: price + tgt,
        },
        TransactionType::SELL => BracketPrices {
            stop: price + sl,
            target: price - tgt,
        },
    }
}

/// Pick the contract to trade from the expiry-ascending list: the nearest
/// expiry through the rollover day of the month, the second-nearest after.
pub fn select_contract(contracts: &[FutContract], day_of_month: u32) -> Option<&FutContract> {
    let slot = if day_of_month <= defaults::ROLLOVER_DAY {
        0
    } else {
        1
    };
    contracts.get(slot)
}

/// Order quantity: contract lot size times the key's lot multiplier.
pub fn order_quantity(lot_size: u32, lot_multiplier: u32) -> u32 {
    lot_size * lot_multiplier
}

/// Today's date at the exchange (IST), for expiry filtering.
pub fn exchange_today() -> NaiveDate {
    let ist = FixedOffset::east_opt(5 * 3600 + 30 * 60).unwrap();
    Utc::now().with_timezone(&ist).date_naive()
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

/// Process one validated-JSON signal end to end.
///
/// The caller owns audit logging (every request is recorded regardless of
/// outcome) and the HTTP mapping of [`GatewayError`].
pub async fn process_signal(
    store: &StoreClient,
    broker_api_url: &str,
    request_timeout: Duration,
    signal: &WebhookSignal,
) -> Result<WebhookResponse, GatewayError> {
    signal.validate().map_err(GatewayError::BadRequest)?;

    // Key validation.
    let key = store
        .find_webhook_key(&signal.webhook_key)
        .await
        .map_err(GatewayError::Internal)?
        .filter(|k| k.is_active)
        .ok_or_else(|| GatewayError::Unauthorized("unknown or inactive webhook key".into()))?;
    if let Err(e) = store.touch_webhook_key(key.id).await {
        tracing::warn!(error = %e, "failed to stamp webhook key usage");
    }

    // Account resolution: the key's accounts that are currently active.
    let active = store
        .list_active_broker_connections()
        .await
        .map_err(GatewayError::Internal)?;
    let accounts: Vec<&BrokerConnection> = active
        .iter()
        .filter(|c| key.broker_connection_ids.contains(&c.id))
        .collect();
    if accounts.is_empty() {
        return Err(GatewayError::BadRequest(
            "no active broker account for this key".into(),
        ));
    }

    // Derivatives resolution.
    let today = exchange_today();
    let contracts = store
        .nearest_futures(&signal.symbol, today)
        .await
        .map_err(GatewayError::Internal)?;
    let contract = select_contract(&contracts, today.day()).ok_or_else(|| {
        GatewayError::BadRequest(format!(
            "no active futures contract for {} in the selected expiry slot",
            signal.symbol
        ))
    })?;

    let quantity = order_quantity(
        contract.lot_size,
        key.lot_multiplier.unwrap_or(defaults::LOT_MULTIPLIER),
    );
    let bracket = bracket_prices(
        signal.trade_type,
        signal.price,
        signal.atr,
        key.sl_multiplier.unwrap_or(defaults::SL_MULTIPLIER),
        key.target_multiplier.unwrap_or(defaults::TARGET_MULTIPLIER),
    );

    let mut results = Vec::with_capacity(accounts.len());
    for account in accounts {
        results.push(
            place_for_account(
                store,
                broker_api_url,
                request_timeout,
                &key,
                signal,
                contract,
                quantity,
                bracket,
                account,
            )
            .await,
        );
    }

    let success_count = results.iter().filter(|r| r.status == "success").count();
    Ok(WebhookResponse {
        success_count,
        results,
    })
}

/// Entry order + bracket trigger for one account. Never propagates; the
/// outcome records what happened.
#[allow(clippy::too_many_arguments)]
async fn place_for_account(
    store: &StoreClient,
    broker_api_url: &str,
    request_timeout: Duration,
    key: &WebhookKey,
    signal: &WebhookSignal,
    contract: &FutContract,
    quantity: u32,
    bracket: BracketPrices,
    account: &BrokerConnection,
) -> AccountOutcome {
    let fail = |error: String| AccountOutcome {
        broker_connection_id: account.id,
        status: "error",
        order_id: None,
        trigger_id: None,
        error: Some(error),
    };

    let broker = match BrokerClient::new(
        broker_api_url,
        &account.api_key,
        &account.access_token,
        request_timeout,
    ) {
        Ok(b) => b,
        Err(e) => return fail(e.to_string()),
    };

    // The entry order comes first; nothing is persisted unless the broker
    // accepts it.
    let entry = OrderParams {
        tradingsymbol: contract.tradingsymbol.clone(),
        exchange: contract.exchange,
        transaction_type: signal.trade_type,
        quantity,
        order_type: OrderType::MARKET,
        product: ProductType::MIS,
        validity: Validity::DAY,
    };
    let order_id = match broker.place_order(&entry).await {
        Ok(id) => id,
        Err(e) => {
            tracing::error!(account = %account.id, error = %e, "webhook entry order rejected");
            return fail(e.reason());
        }
    };

    if let Err(e) = store
        .insert_order(&NewOrderRow {
            user_id: key.user_id,
            broker_connection_id: account.id,
            broker_order_id: order_id.clone(),
            tradingsymbol: contract.tradingsymbol.clone(),
            exchange: contract.exchange,
            transaction_type: signal.trade_type,
            quantity,
            price: signal.price,
            source: "webhook",
        })
        .await
    {
        tracing::error!(account = %account.id, error = %e, "failed to persist entry order row");
    }

    // The exit trigger inverts the side: it closes what the entry opened.
    let new_trigger = NewTrigger {
        user_id: key.user_id,
        broker_connection_id: account.id,
        exchange: contract.exchange,
        tradingsymbol: contract.tradingsymbol.clone(),
        instrument_token: contract.instrument_token,
        condition_type: ConditionType::TwoLeg,
        transaction_type: signal.trade_type.opposite(),
        product_type: ProductType::MIS,
        trigger_price: bracket.stop,
        order_price: None,
        quantity,
        product_type_2: Some(ProductType::MIS),
        trigger_price_2: Some(bracket.target),
        order_price_2: None,
        quantity_2: Some(quantity),
        parent_id: None,
        reference_price: Some(signal.price),
        status: TriggerStatus::Active,
        metadata: serde_json::json!({
            "source": "webhook",
            "webhook_key_id": key.id,
            "underlying": signal.symbol,
            "cash_exchange": signal.exchange.unwrap_or(Exchange::DEFAULT_CASH),
            "timeframe": signal.timeframe,
            "event_time": signal.event_time,
            "atr": signal.atr,
        }),
    };
    let trigger = match store.insert_trigger(&new_trigger).await {
        Ok(t) => t,
        Err(e) => {
            tracing::error!(account = %account.id, error = %e, "entry placed but bracket trigger creation failed");
            return AccountOutcome {
                broker_connection_id: account.id,
                status: "partial",
                order_id: Some(order_id),
                trigger_id: None,
                error: Some(format!("order placed but trigger creation failed: {e}")),
            };
        }
    };

    let note = NewNotification {
        user_id: key.user_id,
        title: format!("{:?} {} x{}", signal.trade_type, contract.tradingsymbol, quantity),
        body: format!(
            "Entry at market (signal {:.2}); stop {:.2}, target {:.2}; order {order_id}",
            signal.price, bracket.stop, bracket.target
        ),
    };
    if let Err(e) = store.insert_notification(&note).await {
        tracing::warn!(account = %account.id, error = %e, "failed to queue notification");
    }

    AccountOutcome {
        broker_connection_id: account.id,
        status: "success",
        order_id: Some(order_id),
        trigger_id: Some(trigger.id),
        error: None,
    }
}
