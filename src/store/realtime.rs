//! Store change-event subscription.
//!
//! The store's realtime surface is a phoenix-channel websocket: the client
//! joins one topic per table, answers with periodic heartbeats, and receives
//! `INSERT`/`UPDATE`/`DELETE` messages carrying the new and old rows.
//!
//! This module only transports events; applying them to the index is the
//! change listener's job ([`crate::engine::listener`]). The connection task
//! reconnects forever with the configured delay until the receiver is
//! dropped.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use uuid::Uuid;

use crate::constants::store_paths::REALTIME_PATH;
use crate::error::Result;
use crate::store::accounts::BROKER_CONNECTIONS_TABLE;
use crate::store::triggers::TRIGGERS_TABLE;
use crate::types::Trigger;

/// Heartbeat cadence required by the realtime endpoint.
const HEARTBEAT_SECS: u64 = 30;

/// One change observed on a subscribed table.
#[derive(Debug, Clone)]
pub enum ChangeEvent {
    TriggerInserted(Trigger),
    TriggerUpdated { new: Box<Trigger>, old_id: Uuid },
    TriggerDeleted { old_id: Uuid },
    /// Something changed on `broker_connections`; coarse by design, the
    /// engine re-reads what it needs.
    BrokerConnectionsChanged,
}

/// Incoming phoenix frame.
#[derive(Debug, Deserialize)]
struct PhoenixMessage {
    topic: String,
    event: String,
    #[serde(default)]
    payload: serde_json::Value,
}

/// Configuration for the realtime subscription.
#[derive(Debug, Clone)]
pub struct RealtimeListener {
    store_url: String,
    service_key: String,
    reconnect_delay_ms: u64,
}

impl RealtimeListener {
    pub fn new(store_url: &str, service_key: &str, reconnect_delay_ms: u64) -> Self {
        Self {
            store_url: store_url.trim_end_matches('/').to_owned(),
            service_key: service_key.to_owned(),
            reconnect_delay_ms,
        }
    }

    /// Spawn the subscription task. Events arrive on the returned channel;
    /// dropping the receiver ends the task at its next send.
    pub fn start(self) -> (mpsc::Receiver<ChangeEvent>, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(256);
        let task = tokio::spawn(async move { self.run(tx).await });
        (rx, task)
    }

    fn ws_url(&self) -> String {
        let ws_base = self
            .store_url
            .replacen("https://", "wss://", 1)
            .replacen("http://", "ws://", 1);
        format!(
            "{ws_base}{REALTIME_PATH}?apikey={}&vsn=1.0.0",
            self.service_key
        )
    }

    async fn run(self, tx: mpsc::Sender<ChangeEvent>) {
        loop {
            match self.session(&tx).await {
                Ok(()) => {
                    // Receiver dropped; we're shutting down.
                    return;
                }
                Err(e) => {
                    tracing::error!(error = %e, "realtime subscription lost; reconnecting");
                }
            }
            tokio::time::sleep(Duration::from_millis(self.reconnect_delay_ms)).await;
        }
    }

    /// One websocket session: join topics, pump heartbeats, forward events.
    ///
    /// Returns `Ok(())` only when the event receiver is gone; any transport
    /// end is an error so the caller reconnects.
    async fn session(&self, tx: &mpsc::Sender<ChangeEvent>) -> Result<()> {
        let (ws, _resp) = connect_async(&self.ws_url()).await?;
        let (mut write, mut read) = ws.split();

        for (i, table) in [TRIGGERS_TABLE, BROKER_CONNECTIONS_TABLE].iter().enumerate() {
            let join = serde_json::json!({
                "topic": format!("realtime:public:{table}"),
                "event": "phx_join",
                "payload": {},
                "ref": (i + 1).to_string(),
            });
            write
                .send(Message::Text(serde_json::to_string(&join)?.into()))
                .await?;
        }
        tracing::info!("realtime subscription joined");

        let mut heartbeat = tokio::time::interval(Duration::from_secs(HEARTBEAT_SECS));
        heartbeat.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        let mut hb_ref: u64 = 100;

        loop {
            tokio::select! {
                _ = heartbeat.tick() => {
                    hb_ref += 1;
                    let beat = serde_json::json!({
                        "topic": "phoenix",
                        "event": "heartbeat",
                        "payload": {},
                        "ref": hb_ref.to_string(),
                    });
                    write
                        .send(Message::Text(serde_json::to_string(&beat)?.into()))
                        .await?;
                }
                item = read.next() => {
                    let msg = match item {
                        Some(Ok(m)) => m,
                        Some(Err(e)) => return Err(e.into()),
                        None => {
                            return Err(crate::error::EngineError::InvalidArgument(
                                "realtime stream ended".into(),
                            ));
                        }
                    };
                    if let Message::Text(text) = msg {
                        if let Some(event) = decode_event(&text) {
                            if tx.send(event).await.is_err() {
                                return Ok(());
                            }
                        }
                    }
                }
            }
        }
    }
}

/// Decode one phoenix frame into a [`ChangeEvent`]. Control frames
/// (`phx_reply`, presence) and unparseable rows yield `None`.
fn decode_event(text: &str) -> Option<ChangeEvent> {
    let msg: PhoenixMessage = match serde_json::from_str(text) {
        Ok(m) => m,
        Err(e) => {
            tracing::debug!(error = %e, "ignoring undecodable realtime frame");
            return None;
        }
    };

    if msg.topic.ends_with(&format!(":{BROKER_CONNECTIONS_TABLE}")) {
        return matches!(msg.event.as_str(), "INSERT" | "UPDATE" | "DELETE")
            .then_some(ChangeEvent::BrokerConnectionsChanged);
    }
    if !msg.topic.ends_with(&format!(":{TRIGGERS_TABLE}")) {
        return None;
    }

    match msg.event.as_str() {
        "INSERT" => {
            let trigger = parse_record(&msg.payload, "record")?;
            Some(ChangeEvent::TriggerInserted(trigger))
        }
        "UPDATE" => {
            let new = parse_record(&msg.payload, "record")?;
            let old_id = parse_row_id(&msg.payload, "old_record").unwrap_or(new.id);
            Some(ChangeEvent::TriggerUpdated {
                new: Box::new(new),
                old_id,
            })
        }
        "DELETE" => {
            let old_id = parse_row_id(&msg.payload, "old_record")?;
            Some(ChangeEvent::TriggerDeleted { old_id })
        }
        _ => None,
    }
}

fn parse_record(payload: &serde_json::Value, field: &str) -> Option<Trigger> {
    match serde_json::from_value(payload.get(field)?.clone()) {
        Ok(t) => Some(t),
        Err(e) => {
            tracing::warn!(error = %e, "realtime row failed to deserialize; skipping");
            None
        }
    }
}

fn parse_row_id(payload: &serde_json::Value, field: &str) -> Option<Uuid> {
    payload
        .get(field)?
        .get("id")?
        .as_str()?
        .parse()
        .ok()
}
