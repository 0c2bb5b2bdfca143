//! Market-data feed manager.
//!
//! Owns one websocket connection to the upstream feed. Responsibilities:
//!
//! - connect / disconnect with explicit intent (disconnect suppresses
//!   reconnection)
//! - subscribe / unsubscribe instrument tokens; the subscription set survives
//!   reconnects and is replayed after every successful connect
//! - decode binary tick frames (see [`packet`]) and hand each tick to the
//!   registered handler
//! - automatic reconnect with a fixed delay; at most one reconnect timer is
//!   armed at a time
//!
//! The read loop runs in a dedicated Tokio task and is the sole caller of the
//! tick handler. The handler performs only in-memory work; anything that
//! blocks is spawned by the handler itself.

pub mod packet;

use std::collections::HashSet;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU8, AtomicU64, Ordering};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

use crate::constants::feed_limits::MAX_TOKENS_PER_MESSAGE;
use crate::error::Result;
use crate::types::Tick;

type WriterHalf =
    futures_util::stream::SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, Message>;

/// Callback invoked for every decoded tick, on the feed-reader task.
pub type TickHandler = Arc<dyn Fn(Tick) + Send + Sync>;

// ---------------------------------------------------------------------------
// Connection state
// ---------------------------------------------------------------------------

/// Lifecycle of the feed connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum FeedState {
    Disconnected = 0,
    Connecting = 1,
    Connected = 2,
}

impl FeedState {
    fn from_u8(v: u8) -> Self {
        match v {
            2 => Self::Connected,
            1 => Self::Connecting,
            _ => Self::Disconnected,
        }
    }
}

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Connection parameters for the feed.
#[derive(Debug, Clone)]
pub struct FeedConfig {
    /// Websocket endpoint.
    pub url: String,
    /// Broker api key of the account the feed authenticates as.
    pub api_key: String,
    /// Broker access token of that account.
    pub access_token: String,
    /// Delay before reconnect attempts, in ms.
    pub reconnect_delay_ms: u64,
}

// ---------------------------------------------------------------------------
// FeedManager
// ---------------------------------------------------------------------------

/// Manages the long-lived market-data connection.
///
/// Cheap to clone; all state is shared behind `Arc`s so the supervisor and
/// the change listener can both drive subscriptions.
#[derive(Clone)]
pub struct FeedManager {
    cfg: FeedConfig,
    writer: Arc<Mutex<Option<WriterHalf>>>,
    /// Tokens we intend to be subscribed to; replayed on every connect.
    subscribed: Arc<parking_lot::Mutex<HashSet<u32>>>,
    handler: Arc<parking_lot::RwLock<Option<TickHandler>>>,
    state: Arc<AtomicU8>,
    /// Cleared by `disconnect()`; the read loop checks it before rearming.
    should_reconnect: Arc<AtomicBool>,
    /// Ensures a single armed reconnect timer.
    reconnect_armed: Arc<AtomicBool>,
    reconnects: Arc<AtomicU64>,
    task: Arc<parking_lot::Mutex<Option<JoinHandle<()>>>>,
}

impl FeedManager {
    /// Create a manager; no connection is made until [`connect`](Self::connect).
    pub fn new(cfg: FeedConfig) -> Self {
        Self {
            cfg,
            writer: Arc::new(Mutex::new(None)),
            subscribed: Arc::new(parking_lot::Mutex::new(HashSet::new())),
            handler: Arc::new(parking_lot::RwLock::new(None)),
            state: Arc::new(AtomicU8::new(FeedState::Disconnected as u8)),
            should_reconnect: Arc::new(AtomicBool::new(false)),
            reconnect_armed: Arc::new(AtomicBool::new(false)),
            reconnects: Arc::new(AtomicU64::new(0)),
            task: Arc::new(parking_lot::Mutex::new(None)),
        }
    }

    /// Register the tick handler. Must be set before `connect` for ticks to
    /// be delivered; ticks arriving without a handler are dropped.
    pub fn set_tick_handler(&self, handler: TickHandler) {
        *self.handler.write() = Some(handler);
    }

    /// Current connection state.
    pub fn state(&self) -> FeedState {
        FeedState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Whether the websocket is currently established.
    pub fn is_connected(&self) -> bool {
        self.state() == FeedState::Connected
    }

    /// Number of successful reconnections since construction.
    pub fn reconnect_count(&self) -> u64 {
        self.reconnects.load(Ordering::Relaxed)
    }

    /// Tokens currently intended to be subscribed.
    pub fn subscribed_tokens(&self) -> Vec<u32> {
        self.subscribed.lock().iter().copied().collect()
    }

    /// Establish the connection and spawn the read loop.
    ///
    /// Replays any tokens subscribed before or between connections.
    pub async fn connect(&self) -> Result<()> {
        self.should_reconnect.store(true, Ordering::Release);
        self.state
            .store(FeedState::Connecting as u8, Ordering::Release);

        let read = match self.dial().await {
            Ok(read) => read,
            Err(e) => {
                self.state
                    .store(FeedState::Disconnected as u8, Ordering::Release);
                return Err(e);
            }
        };
        self.resubscribe_all().await;

        let mgr = self.clone();
        let task = tokio::spawn(async move { mgr.read_loop(read).await });
        if let Some(old) = self.task.lock().replace(task) {
            old.abort();
        }

        tracing::info!(url = %self.cfg.url, "feed connected");
        Ok(())
    }

    /// Close the connection and suppress reconnection.
    pub async fn disconnect(&self) {
        self.should_reconnect.store(false, Ordering::Release);

        let mut guard = self.writer.lock().await;
        if let Some(ref mut w) = *guard {
            let _ = w.send(Message::Close(None)).await;
        }
        *guard = None;
        drop(guard);

        if let Some(task) = self.task.lock().take() {
            task.abort();
        }
        self.state
            .store(FeedState::Disconnected as u8, Ordering::Release);

        tracing::info!("feed disconnected");
    }

    /// Subscribe instrument tokens.
    ///
    /// Tokens are remembered even while disconnected and replayed on the next
    /// connect. Control messages are sent in chunks per the upstream limit.
    pub async fn subscribe(&self, tokens: &[u32]) -> Result<()> {
        if tokens.is_empty() {
            return Ok(());
        }
        {
            let mut set = self.subscribed.lock();
            set.extend(tokens.iter().copied());
        }
        self.send_subscribe(tokens).await
    }

    /// Unsubscribe instrument tokens and forget them.
    pub async fn unsubscribe(&self, tokens: &[u32]) -> Result<()> {
        if tokens.is_empty() {
            return Ok(());
        }
        {
            let mut set = self.subscribed.lock();
            for t in tokens {
                set.remove(t);
            }
        }
        for chunk in tokens.chunks(MAX_TOKENS_PER_MESSAGE) {
            self.send_control(&serde_json::json!({"a": "unsubscribe", "v": chunk}))
                .await?;
        }
        tracing::debug!(count = tokens.len(), "unsubscribed instruments");
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Internal
    // -----------------------------------------------------------------------

    async fn dial(
        &self,
    ) -> Result<futures_util::stream::SplitStream<WebSocketStream<MaybeTlsStream<TcpStream>>>> {
        let url = format!(
            "{}?api_key={}&access_token={}",
            self.cfg.url, self.cfg.api_key, self.cfg.access_token
        );
        let (ws, _resp) = connect_async(&url).await?;
        let (write, read) = ws.split();
        *self.writer.lock().await = Some(write);
        self.state
            .store(FeedState::Connected as u8, Ordering::Release);
        Ok(read)
    }

    /// Send subscribe + mode=full for the given tokens, if a writer exists.
    async fn send_subscribe(&self, tokens: &[u32]) -> Result<()> {
        for chunk in tokens.chunks(MAX_TOKENS_PER_MESSAGE) {
            self.send_control(&serde_json::json!({"a": "subscribe", "v": chunk}))
                .await?;
            self.send_control(&serde_json::json!({"a": "mode", "v": ["full", chunk]}))
                .await?;
        }
        tracing::debug!(count = tokens.len(), "subscribed instruments");
        Ok(())
    }

    /// Replay the whole subscription set after a (re)connect.
    async fn resubscribe_all(&self) {
        let tokens = self.subscribed_tokens();
        if tokens.is_empty() {
            return;
        }
        if let Err(e) = self.send_subscribe(&tokens).await {
            tracing::error!(error = %e, "failed to resubscribe after connect");
        }
    }

    /// Serialize and send one control message. A missing writer is not an
    /// error: the subscription set is replayed on the next connect.
    async fn send_control(&self, msg: &serde_json::Value) -> Result<()> {
        let json = serde_json::to_string(msg)?;
        let mut guard = self.writer.lock().await;
        if let Some(ref mut w) = *guard {
            w.send(Message::Text(json.into())).await?;
        }
        Ok(())
    }

    /// The connection's read loop, including the reconnect cycle.
    async fn read_loop(
        self,
        mut read: futures_util::stream::SplitStream<WebSocketStream<MaybeTlsStream<TcpStream>>>,
    ) {
        loop {
            while let Some(item) = read.next().await {
                match item {
                    Ok(Message::Binary(data)) => self.handle_frame(&data),
                    Ok(Message::Text(text)) => self.handle_text(&text),
                    Ok(Message::Ping(_) | Message::Pong(_)) => {}
                    Ok(Message::Close(frame)) => {
                        tracing::info!(?frame, "feed closed by server");
                        break;
                    }
                    Ok(_) => {}
                    Err(e) => {
                        tracing::error!(error = %e, "feed websocket error");
                        break;
                    }
                }
            }

            self.state
                .store(FeedState::Disconnected as u8, Ordering::Release);
            *self.writer.lock().await = None;

            if !self.should_reconnect.load(Ordering::Acquire) {
                return;
            }
            // One armed timer at a time; a racing loop instance gives up.
            if self.reconnect_armed.swap(true, Ordering::AcqRel) {
                return;
            }

            loop {
                tokio::time::sleep(Duration::from_millis(self.cfg.reconnect_delay_ms)).await;
                if !self.should_reconnect.load(Ordering::Acquire) {
                    self.reconnect_armed.store(false, Ordering::Release);
                    return;
                }
                self.state
                    .store(FeedState::Connecting as u8, Ordering::Release);
                match self.dial().await {
                    Ok(new_read) => {
                        read = new_read;
                        self.reconnects.fetch_add(1, Ordering::Relaxed);
                        self.reconnect_armed.store(false, Ordering::Release);
                        self.resubscribe_all().await;
                        tracing::info!("feed reconnected");
                        break;
                    }
                    Err(e) => {
                        self.state
                            .store(FeedState::Disconnected as u8, Ordering::Release);
                        tracing::error!(error = %e, "feed reconnect failed");
                    }
                }
            }
        }
    }

    /// Decode one binary frame and dispatch its ticks.
    ///
    /// Malformed frames are logged and dropped; the decoder resynchronizes on
    /// the next frame boundary. They never tear down the connection.
    fn handle_frame(&self, data: &[u8]) {
        match packet::decode_frame(data) {
            Ok(ticks) => {
                for t in ticks {
                    self.dispatch(Tick::now(t.instrument_token, t.last_price));
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, len = data.len(), "malformed feed frame skipped");
            }
        }
    }

    /// JSON fallback for environments where binary mode is disabled.
    fn handle_text(&self, text: &str) {
        #[derive(Deserialize)]
        struct JsonTick {
            instrument_token: u32,
            last_price: f64,
        }
        match serde_json::from_str::<Vec<JsonTick>>(text) {
            Ok(ticks) => {
                for t in ticks {
                    self.dispatch(Tick::now(t.instrument_token, t.last_price));
                }
            }
            Err(_) => {
                tracing::debug!(%text, "ignoring non-tick text message");
            }
        }
    }

    /// Hand a tick to the handler. Handler panics are caught and logged so
    /// the read loop keeps running.
    fn dispatch(&self, tick: Tick) {
        let handler = self.handler.read().clone();
        if let Some(h) = handler {
            if catch_unwind(AssertUnwindSafe(|| h(tick))).is_err() {
                tracing::error!(
                    token = tick.instrument_token,
                    "tick handler panicked; tick dropped"
                );
            }
        }
    }
}

impl Drop for FeedManager {
    fn drop(&mut self) {
        // Last clone going away aborts the read task.
        if Arc::strong_count(&self.task) == 1 {
            if let Some(task) = self.task.lock().take() {
                task.abort();
            }
        }
    }
}
