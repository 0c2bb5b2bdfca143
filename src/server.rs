//! HTTP control surface and webhook endpoint.
//!
//! - `GET  /health` — lifecycle status, last error, counters, instance id
//! - `POST /start`  — idempotent start attempt
//! - `POST /stop`   — graceful shutdown
//! - `GET  /stats`  — current counters
//! - `POST /webhook` — strategy-signal intake (see [`crate::gateway`])
//!
//! Standby instances serve all of these too; only the leader evaluates.

use std::net::SocketAddr;

use axum::Router;
use axum::extract::{ConnectInfo, Json, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};

use crate::engine::Supervisor;
use crate::error::Result;
use crate::gateway::{self, GatewayError};
use crate::types::{NewWebhookLog, WebhookSignal};

/// Build the router over a supervisor handle.
pub fn router(sup: Supervisor) -> Router {
    Router::new()
        .route("/health", get(get_health))
        .route("/start", post(post_start))
        .route("/stop", post(post_stop))
        .route("/stats", get(get_stats))
        .route("/webhook", post(post_webhook))
        .with_state(sup)
}

/// Bind and serve until the process exits.
pub async fn serve(sup: Supervisor, addr: &str) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| crate::error::EngineError::InvalidArgument(format!("bind {addr}: {e}")))?;
    tracing::info!(%addr, "control server listening");
    axum::serve(
        listener,
        router(sup).into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .map_err(|e| crate::error::EngineError::InvalidArgument(format!("server error: {e}")))?;
    Ok(())
}

async fn get_health(State(sup): State<Supervisor>) -> impl IntoResponse {
    Json(sup.health())
}

async fn get_stats(State(sup): State<Supervisor>) -> impl IntoResponse {
    Json(sup.stats())
}

async fn post_start(State(sup): State<Supervisor>) -> impl IntoResponse {
    if let Err(e) = sup.start().await {
        tracing::warn!(error = %e, "start request failed");
    }
    Json(sup.health())
}

async fn post_stop(State(sup): State<Supervisor>) -> impl IntoResponse {
    sup.stop().await;
    Json(sup.health())
}

/// The webhook intake. Every request — accepted or rejected — lands in the
/// audit log with its source address, raw payload, and outcome.
async fn post_webhook(
    State(sup): State<Supervisor>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    Json(raw): Json<serde_json::Value>,
) -> axum::response::Response {
    let source_ip = peer.ip().to_string();

    let signal: WebhookSignal = match serde_json::from_value(raw.clone()) {
        Ok(s) => s,
        Err(e) => {
            let reason = format!("malformed signal: {e}");
            audit(&sup, &source_ip, raw, "rejected", Some(reason.clone())).await;
            return (StatusCode::BAD_REQUEST, Json(serde_json::json!({ "error": reason })))
                .into_response();
        }
    };

    match gateway::process_signal(
        sup.store(),
        &sup.config().broker_api_url,
        sup.config().request_timeout(),
        &signal,
    )
    .await
    {
        Ok(resp) => {
            audit(&sup, &source_ip, raw, "success", None).await;
            (StatusCode::OK, Json(resp)).into_response()
        }
        Err(err) => {
            let (code, status) = match &err {
                GatewayError::Unauthorized(_) => (StatusCode::UNAUTHORIZED, "rejected"),
                GatewayError::BadRequest(_) => (StatusCode::BAD_REQUEST, "rejected"),
                GatewayError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "error"),
            };
            let reason = err.reason();
            audit(&sup, &source_ip, raw, status, Some(reason.clone())).await;
            (code, Json(serde_json::json!({ "error": reason }))).into_response()
        }
    }
}

async fn audit(
    sup: &Supervisor,
    source_ip: &str,
    payload: serde_json::Value,
    status: &'static str,
    reason: Option<String>,
) {
    let row = NewWebhookLog {
        source_ip: source_ip.to_owned(),
        payload,
        status,
        reason,
    };
    if let Err(e) = sup.store().append_webhook_log(&row).await {
        tracing::warn!(error = %e, "webhook audit write failed");
    }
}
