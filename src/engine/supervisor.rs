//! Engine supervisor: singleton election, lifecycle, and the firing pipeline.
//!
//! Exactly one engine instance leads the cluster at a time. Leadership is a
//! heartbeat-guarded lock in the store; an instance that loses the election
//! becomes a standby that keeps serving its health endpoint and re-contests
//! once the holder's heartbeat could have gone stale.
//!
//! While leading, the supervisor owns:
//! - the in-memory [`TriggerIndex`] rebuilt from the store
//! - the [`FeedManager`] and its tick handler (the firing pipeline's entry)
//! - the change-listener task applying out-of-band CRUD
//! - the heartbeat ticker
//! - a start-retry task that re-runs the start sequence after failures, so a
//!   missing broker or a transient store outage heals without operator action

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::broker::BrokerClient;
use crate::config::EngineConfig;
use crate::engine::executor::{self, ExecutorConfig};
use crate::engine::index::TriggerIndex;
use crate::engine::stats::{EngineStats, StatsSnapshot};
use crate::engine::{evaluator, listener, risk};
use crate::error::{EngineError, Result};
use crate::feed::{FeedConfig, FeedManager};
use crate::store::engine_state::HeartbeatArgs;
use crate::store::{RealtimeListener, StoreClient};
use crate::types::{Firing, Tick, Trigger};

// ---------------------------------------------------------------------------
// Phase / health
// ---------------------------------------------------------------------------

/// Coarse lifecycle phase of this instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Stopped,
    Starting,
    Running,
    Standby,
}

/// Body of `GET /health`.
#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    /// `running`, `stopped`, `stale`, or `standby`.
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub stats: StatsSnapshot,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub heartbeat: Option<DateTime<Utc>>,
    pub instance: Uuid,
    /// The leader seen while in standby.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub peer_instance: Option<Uuid>,
    pub active_triggers: usize,
    pub feed_connected: bool,
}

// ---------------------------------------------------------------------------
// Supervisor
// ---------------------------------------------------------------------------

struct Tasks {
    heartbeat: Option<JoinHandle<()>>,
    listener: Option<JoinHandle<()>>,
    realtime: Option<JoinHandle<()>>,
    retry: Option<JoinHandle<()>>,
}

struct Inner {
    cfg: EngineConfig,
    store: StoreClient,
    instance_id: Uuid,
    index: Arc<TriggerIndex>,
    stats: EngineStats,
    phase: parking_lot::Mutex<Phase>,
    engine_error: parking_lot::Mutex<Option<String>>,
    feed: parking_lot::Mutex<Option<FeedManager>>,
    /// Broker clients per connection id, invalidated on connection changes.
    brokers: parking_lot::Mutex<std::collections::HashMap<Uuid, BrokerClient>>,
    last_heartbeat: parking_lot::Mutex<Option<DateTime<Utc>>>,
    standby_peer: parking_lot::Mutex<Option<Uuid>>,
    tasks: parking_lot::Mutex<Tasks>,
}

/// Handle to the engine. Cheap to clone; the HTTP server and every spawned
/// task share the same instance.
#[derive(Clone)]
pub struct Supervisor(Arc<Inner>);

impl Supervisor {
    /// Build a supervisor from configuration. No I/O happens here.
    pub fn new(cfg: EngineConfig) -> Result<Self> {
        let store = StoreClient::new(&cfg.store_url, &cfg.store_service_key, cfg.request_timeout())?;
        Ok(Self(Arc::new(Inner {
            cfg,
            store,
            instance_id: Uuid::new_v4(),
            index: Arc::new(TriggerIndex::new()),
            stats: EngineStats::new(),
            phase: parking_lot::Mutex::new(Phase::Stopped),
            engine_error: parking_lot::Mutex::new(None),
            feed: parking_lot::Mutex::new(None),
            brokers: parking_lot::Mutex::new(std::collections::HashMap::new()),
            last_heartbeat: parking_lot::Mutex::new(None),
            standby_peer: parking_lot::Mutex::new(None),
            tasks: parking_lot::Mutex::new(Tasks {
                heartbeat: None,
                listener: None,
                realtime: None,
                retry: None,
            }),
        })))
    }

    /// This instance's id, as written to the engine-state row.
    pub fn instance_id(&self) -> Uuid {
        self.0.instance_id
    }

    /// Store client shared with the webhook gateway.
    pub fn store(&self) -> &StoreClient {
        &self.0.store
    }

    /// Engine configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.0.cfg
    }

    /// Current counters.
    pub fn stats(&self) -> StatsSnapshot {
        self.0.stats.snapshot()
    }

    // -----------------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------------

    /// Idempotent start attempt.
    ///
    /// Failures are recorded on the health surface and retried in the
    /// background; standby is a success from the caller's point of view.
    pub async fn start(&self) -> Result<()> {
        {
            let phase = self.0.phase.lock();
            if matches!(*phase, Phase::Running | Phase::Starting) {
                return Ok(());
            }
        }
        if !self.0.cfg.engine_enabled {
            let reason = "engine is disabled (ENGINE_ENABLED=false)".to_owned();
            *self.0.engine_error.lock() = Some(reason.clone());
            return Err(EngineError::InvalidArgument(reason));
        }

        match self.try_start().await {
            Ok(()) => Ok(()),
            Err(e) => {
                let reason = e.to_string();
                tracing::error!(error = %reason, "engine start failed");
                *self.0.engine_error.lock() = Some(reason);
                *self.0.phase.lock() = Phase::Stopped;
                self.arm_retry();
                Err(e)
            }
        }
    }

    /// Graceful shutdown: stop heartbeating, close the feed, clear the
    /// index, release the lock.
    pub async fn stop(&self) {
        {
            let mut tasks = self.0.tasks.lock();
            for t in [
                tasks.heartbeat.take(),
                tasks.listener.take(),
                tasks.realtime.take(),
                tasks.retry.take(),
            ]
            .into_iter()
            .flatten()
            {
                t.abort();
            }
        }

        let feed = self.0.feed.lock().take();
        if let Some(feed) = feed {
            feed.disconnect().await;
        }
        // The feed is closed; late ticks can no longer race index teardown.
        self.0.index.clear();

        let was_leading = *self.0.phase.lock() == Phase::Running;
        if was_leading {
            if let Err(e) = self.0.store.release_engine_lock(self.0.instance_id).await {
                tracing::warn!(error = %e, "failed to release engine lock");
            }
        }
        *self.0.phase.lock() = Phase::Stopped;
        tracing::info!("engine stopped");
    }

    /// Health snapshot for the control surface.
    pub fn health(&self) -> HealthReport {
        let phase = *self.0.phase.lock();
        let heartbeat = *self.0.last_heartbeat.lock();
        let feed_connected = self.sync_feed_stats();

        let status = match phase {
            Phase::Standby => "standby",
            Phase::Stopped | Phase::Starting => "stopped",
            Phase::Running => {
                let stale = heartbeat.is_none_or(|hb| {
                    Utc::now().signed_duration_since(hb).to_std().is_ok_and(|d| {
                        d > self.0.cfg.stale_threshold()
                    })
                });
                if stale { "stale" } else { "running" }
            }
        };

        HealthReport {
            status,
            error: self.0.engine_error.lock().clone(),
            stats: self.0.stats.snapshot(),
            heartbeat,
            instance: self.0.instance_id,
            peer_instance: *self.0.standby_peer.lock(),
            active_triggers: self.0.index.count(),
            feed_connected,
        }
    }

    // -----------------------------------------------------------------------
    // Start sequence
    // -----------------------------------------------------------------------

    async fn try_start(&self) -> Result<()> {
        *self.0.phase.lock() = Phase::Starting;

        let stale_secs = self.0.cfg.stale_threshold().as_secs();
        let acquired = self
            .0
            .store
            .acquire_engine_lock(self.0.instance_id, stale_secs)
            .await?;

        if !acquired {
            let peer = self
                .0
                .store
                .get_engine_state()
                .await
                .ok()
                .flatten()
                .map(|row| row.instance_id);
            *self.0.standby_peer.lock() = peer;
            *self.0.phase.lock() = Phase::Standby;
            tracing::info!(?peer, "another instance leads; standing by");
            self.arm_retry();
            return Ok(());
        }
        *self.0.standby_peer.lock() = None;

        self.maybe_reset_daily_counters().await;

        // Rebuild the index from the store's active rows.
        let triggers = self.0.store.load_active_triggers().await?;
        self.0.index.clear();
        for t in triggers {
            if let Err(e) = t.validate() {
                tracing::warn!(id = %t.id, error = %e, "skipping invalid trigger row");
                continue;
            }
            self.0.index.add(t);
        }
        tracing::info!(count = self.0.index.count(), "loaded active triggers");

        // Any active account authenticates the feed.
        let connections = self.0.store.list_active_broker_connections().await?;
        let feed_account = connections.first().ok_or_else(|| {
            EngineError::InvalidArgument("no active broker connection for the feed".into())
        })?;

        let feed = FeedManager::new(FeedConfig {
            url: self.0.cfg.feed_url.clone(),
            api_key: feed_account.api_key.clone(),
            access_token: feed_account.access_token.clone(),
            reconnect_delay_ms: self.0.cfg.reconnect_delay_ms,
        });

        let weak = Arc::downgrade(&self.0);
        feed.set_tick_handler(Arc::new(move |tick| {
            if let Some(inner) = weak.upgrade() {
                Supervisor(inner).on_tick(tick);
            }
        }));

        feed.connect().await?;
        if let Err(e) = feed.subscribe(&self.0.index.subscribed_instruments()).await {
            feed.disconnect().await;
            return Err(e);
        }
        *self.0.feed.lock() = Some(feed.clone());

        // External CRUD reaches us through the realtime channel.
        let realtime = RealtimeListener::new(
            &self.0.cfg.store_url,
            &self.0.cfg.store_service_key,
            self.0.cfg.reconnect_delay_ms,
        );
        let (rx, realtime_task) = realtime.start();
        let listener_task = {
            let index = Arc::clone(&self.0.index);
            let weak = Arc::downgrade(&self.0);
            tokio::spawn(listener::run(index, feed, rx, move || {
                if let Some(inner) = weak.upgrade() {
                    inner.brokers.lock().clear();
                }
            }))
        };

        let heartbeat_task = tokio::spawn(self.clone().heartbeat_loop());

        {
            let mut tasks = self.0.tasks.lock();
            tasks.realtime = Some(realtime_task);
            tasks.listener = Some(listener_task);
            tasks.heartbeat = Some(heartbeat_task);
        }

        *self.0.engine_error.lock() = None;
        *self.0.phase.lock() = Phase::Running;
        tracing::info!(instance = %self.0.instance_id, "engine leading");
        Ok(())
    }

    /// Reset per-user daily counters when the previous leader's heartbeat
    /// was on an earlier calendar day.
    async fn maybe_reset_daily_counters(&self) {
        let last = match self.0.store.get_engine_state().await {
            Ok(row) => row.and_then(|r| r.last_heartbeat),
            Err(e) => {
                tracing::warn!(error = %e, "could not read engine state for daily reset");
                return;
            }
        };
        let needs_reset = last.is_none_or(|hb| hb.date_naive() < Utc::now().date_naive());
        if needs_reset {
            if let Err(e) = self.0.store.reset_daily_risk_counters().await {
                tracing::warn!(error = %e, "daily risk counter reset failed");
            } else {
                tracing::info!("daily risk counters reset");
            }
        }
    }

    /// Arm the background start-retry task if none is running.
    ///
    /// Standby instances re-contest after the stale threshold; failed starts
    /// retry after the reconnect delay.
    fn arm_retry(&self) {
        let mut tasks = self.0.tasks.lock();
        if tasks
            .retry
            .as_ref()
            .is_some_and(|t| !t.is_finished())
        {
            return;
        }
        let sup = self.clone();
        tasks.retry = Some(tokio::spawn(async move {
            loop {
                let delay = match *sup.0.phase.lock() {
                    Phase::Standby => sup.0.cfg.stale_threshold(),
                    _ => sup.0.cfg.reconnect_delay(),
                };
                tokio::time::sleep(delay).await;
                if *sup.0.phase.lock() == Phase::Running {
                    return;
                }
                match sup.try_start().await {
                    Ok(()) => {
                        if *sup.0.phase.lock() == Phase::Running {
                            return;
                        }
                    }
                    Err(e) => {
                        *sup.0.engine_error.lock() = Some(e.to_string());
                        *sup.0.phase.lock() = Phase::Stopped;
                        tracing::warn!(error = %e, "start retry failed");
                    }
                }
            }
        }));
    }

    /// Mirror the feed's reconnect counter into the shared stats; returns
    /// whether the feed is currently connected.
    fn sync_feed_stats(&self) -> bool {
        let feed = self.0.feed.lock().clone();
        match feed {
            Some(f) => {
                self.0
                    .stats
                    .feed_reconnects
                    .store(f.reconnect_count(), std::sync::atomic::Ordering::Relaxed);
                f.is_connected()
            }
            None => false,
        }
    }

    async fn heartbeat_loop(self) {
        let mut interval = tokio::time::interval(std::time::Duration::from_millis(
            crate::constants::timing::HEARTBEAT_INTERVAL_MS,
        ));
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            let feed_connected = self.sync_feed_stats();
            let args = HeartbeatArgs::new(
                self.0.instance_id,
                self.0.stats.snapshot(),
                feed_connected,
                self.0.index.count() as u64,
            );
            match self.0.store.update_engine_heartbeat(&args).await {
                Ok(()) => {
                    *self.0.last_heartbeat.lock() = Some(Utc::now());
                }
                Err(e) => {
                    tracing::warn!(error = %e, "heartbeat write failed");
                }
            }
        }
    }

    // -----------------------------------------------------------------------
    // Firing pipeline
    // -----------------------------------------------------------------------

    /// The tick handler: index lookups and in-memory claims only; everything
    /// that blocks runs in a spawned execution task.
    fn on_tick(&self, tick: Tick) {
        self.0.stats.tick_processed();

        let candidates = self.0.index.for_instrument(tick.instrument_token);
        if candidates.is_empty() {
            return;
        }
        for trigger in candidates {
            if !self.0.index.mark_processing(trigger.id) {
                continue;
            }
            match evaluator::evaluate(&trigger, tick.last_price) {
                None => self.0.index.unmark_processing(trigger.id),
                Some(firing) => {
                    tracing::info!(
                        id = %trigger.id,
                        leg = firing.leg.number(),
                        price = firing.observed_price,
                        "trigger fired"
                    );
                    let sup = self.clone();
                    tokio::spawn(async move { sup.execute_firing(trigger, firing).await });
                }
            }
        }
    }

    /// Everything that happens after the fire decision, off the tick path.
    async fn execute_firing(&self, trigger: Trigger, firing: Firing) {
        let id = trigger.id;

        // Risk gates the upstream call, not the evaluation.
        if let Err(reason) = self.check_risk(&trigger).await {
            tracing::warn!(%id, %reason, "trigger blocked by risk limits");
            if let Err(e) = self.0.store.mark_failed(id, &reason).await {
                tracing::error!(%id, error = %e, "failed to persist risk rejection");
            }
            self.0.stats.trigger_failed();
            self.evict(&trigger).await;
            return;
        }

        let broker = match self.broker_for(trigger.broker_connection_id).await {
            Ok(b) => b,
            Err(e) => {
                let reason = e.reason();
                tracing::error!(%id, error = %reason, "no usable broker connection");
                if let Err(e) = self.0.store.mark_failed(id, &reason).await {
                    tracing::error!(%id, error = %e, "failed to persist broker failure");
                }
                self.0.stats.trigger_failed();
                self.evict(&trigger).await;
                return;
            }
        };

        let exec_cfg = ExecutorConfig {
            max_retries: self.0.cfg.max_retries,
            retry_backoff_ms: self.0.cfg.retry_backoff_ms,
        };
        match executor::execute(exec_cfg, &broker, &firing).await {
            Ok(order_id) => {
                // An order is out; a failed write here is reconciled by the
                // next leader's index rebuild.
                if let Err(e) = self
                    .0
                    .store
                    .mark_triggered(id, firing.leg, firing.observed_price, &order_id)
                    .await
                {
                    tracing::error!(%id, error = %e, "failed to persist triggered status");
                }
                self.append_trade_log(&trigger, &firing, &order_id).await;
                if let Err(e) = self
                    .0
                    .store
                    .increment_daily_trade_count(trigger.user_id)
                    .await
                {
                    tracing::warn!(%id, error = %e, "failed to bump daily trade count");
                }
                self.0.stats.trigger_executed();
                self.cancel_sibling(&trigger).await;
            }
            Err(e) => {
                let reason = e.reason();
                if let Err(e) = self.0.store.mark_failed(id, &reason).await {
                    tracing::error!(%id, error = %e, "failed to persist failed status");
                }
                self.0.stats.trigger_failed();
            }
        }

        self.evict(&trigger).await;
    }

    async fn check_risk(&self, trigger: &Trigger) -> std::result::Result<(), String> {
        let limits = self
            .0
            .store
            .get_risk_limits(trigger.user_id)
            .await
            .map_err(|e| format!("risk: limits unavailable: {e}"))?;
        match limits {
            Some(limits) => risk::check(&limits, risk::exchange_time_now()),
            None => Ok(()),
        }
    }

    /// After a leg fires, the other side of the pair is cancelled and
    /// evicted. The conditional store write arbitrates races: if the sibling
    /// fired first, this cancel is a no-op.
    async fn cancel_sibling(&self, trigger: &Trigger) {
        let Some(sibling) = self.0.index.oco_sibling(trigger.id) else {
            return;
        };
        match self
            .0
            .store
            .cancel_if_active(sibling, "OCO sibling executed")
            .await
        {
            Ok(true) => tracing::info!(%sibling, "OCO sibling cancelled"),
            Ok(false) => tracing::info!(%sibling, "OCO sibling already settled"),
            Err(e) => tracing::error!(%sibling, error = %e, "failed to cancel OCO sibling"),
        }
        self.0.index.remove(sibling);
    }

    async fn append_trade_log(&self, trigger: &Trigger, firing: &Firing, order_id: &str) {
        let entry = crate::types::TradeLogEntry {
            trigger_id: trigger.id,
            user_id: trigger.user_id,
            broker_connection_id: trigger.broker_connection_id,
            tradingsymbol: trigger.tradingsymbol.clone(),
            exchange: trigger.exchange,
            transaction_type: trigger.transaction_type,
            quantity: firing.order.quantity,
            triggered_leg: firing.leg.number(),
            observed_price: firing.observed_price,
            broker_order_id: order_id.to_owned(),
        };
        if let Err(e) = self.0.store.append_trade_log(&entry).await {
            tracing::warn!(id = %trigger.id, error = %e, "trade log append failed");
        }
    }

    /// Remove the trigger from the index, release its claim, and drop the
    /// feed subscription when its instrument has no triggers left.
    async fn evict(&self, trigger: &Trigger) {
        self.0.index.remove(trigger.id);
        self.0.index.unmark_processing(trigger.id);

        if !self.0.index.has_instrument(trigger.instrument_token) {
            let feed = self.0.feed.lock().clone();
            if let Some(feed) = feed {
                if let Err(e) = feed.unsubscribe(&[trigger.instrument_token]).await {
                    tracing::warn!(
                        token = trigger.instrument_token,
                        error = %e,
                        "failed to unsubscribe fired instrument"
                    );
                }
            }
        }
    }

    /// Broker client for the trigger's account, built lazily and cached.
    async fn broker_for(&self, connection_id: Uuid) -> Result<BrokerClient> {
        if let Some(client) = self.0.brokers.lock().get(&connection_id) {
            return Ok(client.clone());
        }
        let conn = self
            .0
            .store
            .get_broker_connection(connection_id)
            .await?
            .ok_or_else(|| {
                EngineError::InvalidArgument(format!("broker connection {connection_id} not found"))
            })?;
        if !conn.is_active {
            return Err(EngineError::InvalidArgument(format!(
                "broker connection {connection_id} is inactive"
            )));
        }
        let client = BrokerClient::new(
            &self.0.cfg.broker_api_url,
            &conn.api_key,
            &conn.access_token,
            self.0.cfg.request_timeout(),
        )?;
        self.0
            .brokers
            .lock()
            .insert(connection_id, client.clone());
        Ok(client)
    }
}
