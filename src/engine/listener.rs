//! Change listener: applies store change events to the live index.
//!
//! The store is the source of truth; edits made elsewhere (the UI, another
//! node) reach this engine only through these events. The listener keeps the
//! index and the feed's subscription set consistent with them.

use std::sync::Arc;

use tokio::sync::mpsc;

use crate::engine::index::TriggerIndex;
use crate::feed::FeedManager;
use crate::store::ChangeEvent;
use crate::types::{Trigger, TriggerStatus};

/// Consume change events until the channel closes.
///
/// Runs as its own task, spawned by the supervisor while leading.
pub async fn run(
    index: Arc<TriggerIndex>,
    feed: FeedManager,
    mut rx: mpsc::Receiver<ChangeEvent>,
    on_brokers_changed: impl Fn() + Send + 'static,
) {
    while let Some(event) = rx.recv().await {
        match event {
            ChangeEvent::TriggerInserted(trigger) => {
                tracing::info!(id = %trigger.id, token = trigger.instrument_token, "trigger inserted");
                index_trigger(&index, &feed, trigger).await;
            }
            ChangeEvent::TriggerUpdated { new, old_id } => {
                tracing::info!(id = %old_id, status = ?new.status, "trigger updated");
                drop_trigger(&index, &feed, old_id).await;
                index_trigger(&index, &feed, *new).await;
            }
            ChangeEvent::TriggerDeleted { old_id } => {
                tracing::info!(id = %old_id, "trigger deleted");
                drop_trigger(&index, &feed, old_id).await;
            }
            ChangeEvent::BrokerConnectionsChanged => {
                tracing::info!("broker connections changed; clearing client cache");
                on_brokers_changed();
            }
        }
    }
    tracing::debug!("change listener channel closed");
}

/// Index an incoming row if it is active, subscribing its instrument when
/// first seen.
async fn index_trigger(index: &TriggerIndex, feed: &FeedManager, trigger: Trigger) {
    if trigger.status != TriggerStatus::Active {
        return;
    }
    if let Err(e) = trigger.validate() {
        tracing::warn!(id = %trigger.id, error = %e, "ignoring invalid trigger row");
        return;
    }
    let token = trigger.instrument_token;
    let newly_seen = !index.has_instrument(token);
    index.add(trigger);
    if newly_seen {
        if let Err(e) = feed.subscribe(&[token]).await {
            tracing::error!(token, error = %e, "failed to subscribe new instrument");
        }
    }
}

/// Remove a row from the index, unsubscribing its instrument when the last
/// trigger for it disappears.
async fn drop_trigger(index: &TriggerIndex, feed: &FeedManager, id: uuid::Uuid) {
    let token = index.get(id).map(|t| t.instrument_token);
    index.remove(id);
    if let Some(token) = token {
        if !index.has_instrument(token) {
            if let Err(e) = feed.unsubscribe(&[token]).await {
                tracing::warn!(token, error = %e, "failed to unsubscribe instrument");
            }
        }
    }
}
