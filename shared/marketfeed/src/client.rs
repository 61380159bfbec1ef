use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use serde::Serialize;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, Mutex, Notify, RwLock};
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tracing::{debug, error, info, warn};

use crate::buffer::OutboundBuffer;
use crate::config::FeedConfig;
use crate::error::FeedError;
use crate::metrics::FeedMetrics;
use crate::registry::{Callback, SubscriptionRegistry};
use crate::types::{FeedCommand, FeedEvent};

type WsSink = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, Message>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Open,
    Closing,
}

pub type ErrorHook = Arc<dyn Fn(&FeedError) + Send + Sync>;

/// One persistent feed connection multiplexed to many consumers.
///
/// Cheap to clone; every clone shares the same connection, subscription
/// registry and outbound buffer. The application entry point constructs one
/// and owns it for the process lifetime -- there is no hidden singleton.
#[derive(Clone)]
pub struct FeedClient {
    inner: Arc<ClientShared>,
}

struct ClientShared {
    config: FeedConfig,
    registry: SubscriptionRegistry,
    buffer: OutboundBuffer,
    metrics: Arc<FeedMetrics>,
    state: RwLock<ConnectionState>,
    writer: Mutex<Option<mpsc::UnboundedSender<Message>>>,
    attempts: AtomicUsize,
    started: AtomicBool,
    shutdown: AtomicBool,
    retry_wake: Notify,
    error_hook: RwLock<Option<ErrorHook>>,
    last_connected_at: RwLock<Option<DateTime<Utc>>>,
}

impl FeedClient {
    pub fn new(config: FeedConfig) -> Self {
        Self {
            inner: Arc::new(ClientShared {
                config,
                registry: SubscriptionRegistry::new(),
                buffer: OutboundBuffer::new(),
                metrics: Arc::new(FeedMetrics::new()),
                state: RwLock::new(ConnectionState::Disconnected),
                writer: Mutex::new(None),
                attempts: AtomicUsize::new(0),
                started: AtomicBool::new(false),
                shutdown: AtomicBool::new(false),
                retry_wake: Notify::new(),
                error_hook: RwLock::new(None),
                last_connected_at: RwLock::new(None),
            }),
        }
    }

    pub fn metrics(&self) -> Arc<FeedMetrics> {
        self.inner.metrics.clone()
    }

    pub async fn state(&self) -> ConnectionState {
        *self.inner.state.read().await
    }

    pub async fn is_connected(&self) -> bool {
        self.state().await == ConnectionState::Open
    }

    /// True once connect() has been called, whatever the transport is doing.
    pub fn is_initialized(&self) -> bool {
        self.inner.started.load(Ordering::SeqCst)
    }

    pub async fn last_connected_at(&self) -> Option<DateTime<Utc>> {
        *self.inner.last_connected_at.read().await
    }

    /// Installs the hook through which transport errors are surfaced. They
    /// are never raised into a caller's stack.
    pub async fn on_error(&self, hook: ErrorHook) {
        *self.inner.error_hook.write().await = Some(hook);
    }

    /// Starts (or resumes) the connection supervisor. A no-op while the
    /// transport is already Open or Connecting, so concurrent callers never
    /// produce a duplicate socket.
    pub async fn connect(&self) {
        if self.inner.shutdown.load(Ordering::SeqCst) {
            return;
        }
        let state = self.state().await;
        if matches!(state, ConnectionState::Open | ConnectionState::Connecting) {
            return;
        }
        if !self.inner.started.swap(true, Ordering::SeqCst) {
            let supervisor = self.inner.clone();
            tokio::spawn(async move {
                supervise(supervisor).await;
            });
            let liveness = self.inner.clone();
            tokio::spawn(async move {
                liveness_loop(liveness).await;
            });
        } else {
            self.inner.attempts.store(0, Ordering::SeqCst);
            self.inner.retry_wake.notify_one();
        }
    }

    /// Tears down any current transport and reconnects with a fresh retry
    /// budget. This is the only way back once the automatic retry budget is
    /// spent.
    pub async fn force_reconnect(&self) {
        if self.inner.shutdown.load(Ordering::SeqCst) {
            return;
        }
        if !self.is_initialized() {
            self.connect().await;
            return;
        }
        self.inner.attempts.store(0, Ordering::SeqCst);
        // dropping the write half ends the running session, if any
        self.inner.writer.lock().await.take();
        self.inner.retry_wake.notify_one();
    }

    /// Host notification that the UI returned to the foreground. Reconnects
    /// immediately when the transport is not open, without waiting for the
    /// next liveness tick.
    pub async fn notify_foreground(&self) {
        if !self.is_initialized() || self.inner.shutdown.load(Ordering::SeqCst) {
            return;
        }
        if !self.is_connected().await {
            debug!("foreground notification with transport down, forcing reconnect");
            self.force_reconnect().await;
        }
    }

    /// Transmits immediately when the transport is open; otherwise the
    /// serialized frame joins the outbound buffer until the next open.
    pub async fn send<T: Serialize>(&self, message: &T) -> Result<(), FeedError> {
        if self.inner.shutdown.load(Ordering::SeqCst) {
            return Err(FeedError::Shutdown);
        }
        let frame = serde_json::to_string(message)?;
        self.inner.send_or_buffer(frame).await;
        Ok(())
    }

    /// Registers a consumer callback for `topic` and issues the SUBSCRIBE
    /// control frame. Registering the same (topic, consumer) pair again
    /// replaces the previous callback.
    pub async fn subscribe<F>(
        &self,
        topic: &str,
        consumer_id: &str,
        callback: F,
    ) -> Result<(), FeedError>
    where
        F: Fn(FeedEvent) + Send + Sync + 'static,
    {
        self.inner
            .registry
            .register(topic, consumer_id, Arc::new(callback) as Callback)
            .await;
        self.send(&FeedCommand::subscribe(topic)).await
    }

    pub async fn unsubscribe(&self, topic: &str, consumer_id: &str) -> Result<(), FeedError> {
        self.inner.registry.deregister(topic, consumer_id).await;
        self.send(&FeedCommand::unsubscribe(topic)).await
    }

    /// Caller-initiated close. Sends a normal close frame and suppresses any
    /// further reconnects; the client is unusable afterwards.
    pub async fn shutdown(&self) {
        self.inner.shutdown.store(true, Ordering::SeqCst);
        if self.is_initialized() {
            *self.inner.state.write().await = ConnectionState::Closing;
        } else {
            *self.inner.state.write().await = ConnectionState::Disconnected;
        }
        self.inner.writer.lock().await.take();
        self.inner.retry_wake.notify_one();
    }
}

impl ClientShared {
    async fn send_or_buffer(&self, frame: String) {
        if let Some(writer) = self.writer.lock().await.as_ref() {
            if writer.send(Message::Text(frame.clone())).is_ok() {
                return;
            }
        }
        self.buffer.push(frame).await;
    }

    async fn emit_error(&self, error: &FeedError) {
        if let Some(hook) = self.error_hook.read().await.as_ref() {
            hook(error);
        }
    }

    async fn dispatch_frame(&self, text: &str) {
        self.metrics.record_frame();
        let Some(event) = FeedEvent::from_wire(text) else {
            self.metrics.record_dropped_frame();
            debug!("dropping malformed feed frame");
            return;
        };
        let listeners = self.registry.snapshot(event.message_type()).await;
        for (consumer_id, callback) in listeners {
            let delivered = event.clone();
            if catch_unwind(AssertUnwindSafe(move || callback(delivered))).is_err() {
                self.metrics.record_dispatch_panic();
                error!(consumer = %consumer_id, "feed consumer callback panicked");
            } else {
                self.metrics.record_dispatch();
            }
        }
    }
}

async fn supervise(inner: Arc<ClientShared>) {
    loop {
        if inner.shutdown.load(Ordering::SeqCst) {
            break;
        }
        *inner.state.write().await = ConnectionState::Connecting;
        match connect_async(&inner.config.url).await {
            Ok((socket, _)) => {
                info!(url = %inner.config.url, "feed connection open");
                inner.attempts.store(0, Ordering::SeqCst);
                inner.metrics.record_connection();
                *inner.last_connected_at.write().await = Some(Utc::now());
                run_session(&inner, socket).await;
            }
            Err(e) => {
                warn!("feed connect failed: {}", e);
                inner.emit_error(&FeedError::Transport(e)).await;
            }
        }
        inner.writer.lock().await.take();
        if inner.shutdown.load(Ordering::SeqCst) {
            break;
        }
        *inner.state.write().await = ConnectionState::Disconnected;

        let attempts = inner.attempts.fetch_add(1, Ordering::SeqCst) + 1;
        inner.metrics.record_reconnect_attempt();
        if attempts >= inner.config.max_reconnect_attempts {
            warn!(
                attempts,
                "reconnect budget exhausted, waiting for force_reconnect"
            );
            inner.retry_wake.notified().await;
            continue;
        }
        tokio::select! {
            _ = tokio::time::sleep(inner.config.reconnect_interval) => {}
            _ = inner.retry_wake.notified() => {}
        }
    }
    *inner.state.write().await = ConnectionState::Disconnected;
    inner.writer.lock().await.take();
    debug!("feed supervisor stopped");
}

async fn run_session(inner: &Arc<ClientShared>, socket: WebSocketStream<MaybeTlsStream<TcpStream>>) {
    let (mut sink, mut source) = socket.split();
    let (writer, mut outbound) = mpsc::unbounded_channel::<Message>();
    *inner.writer.lock().await = Some(writer);
    *inner.state.write().await = ConnectionState::Open;

    if !flush_buffer(inner, &mut sink).await {
        return;
    }
    if !replay_subscriptions(inner, &mut sink).await {
        return;
    }

    loop {
        tokio::select! {
            queued = outbound.recv() => match queued {
                Some(message) => {
                    if sink.send(message).await.is_err() {
                        break;
                    }
                }
                // writer dropped: shutdown or force-reconnect
                None => {
                    let close = Message::Close(Some(CloseFrame {
                        code: CloseCode::Normal,
                        reason: "".into(),
                    }));
                    let _ = sink.send(close).await;
                    break;
                }
            },
            frame = source.next() => match frame {
                Some(Ok(Message::Text(text))) => inner.dispatch_frame(&text).await,
                Some(Ok(Message::Ping(payload))) => {
                    let _ = sink.send(Message::Pong(payload)).await;
                }
                Some(Ok(Message::Close(_))) | None => {
                    warn!("feed connection closed by upstream");
                    break;
                }
                Some(Err(e)) => {
                    error!("feed transport error: {}", e);
                    inner.emit_error(&FeedError::Transport(e)).await;
                    break;
                }
                Some(Ok(_)) => {}
            },
        }
    }
}

/// Sends every buffered frame in FIFO order. Returns false if the transport
/// died mid-flush.
async fn flush_buffer(inner: &Arc<ClientShared>, sink: &mut WsSink) -> bool {
    let frames = inner.buffer.drain().await;
    if frames.is_empty() {
        return true;
    }
    debug!(count = frames.len(), "flushing buffered frames");
    for frame in frames {
        if sink.send(Message::Text(frame)).await.is_err() {
            warn!("transport dropped while flushing buffered frames");
            return false;
        }
    }
    true
}

/// Re-issues one SUBSCRIBE per topic that still has a live consumer. The
/// registry itself is untouched; only the wire-level intent is replayed.
async fn replay_subscriptions(inner: &Arc<ClientShared>, sink: &mut WsSink) -> bool {
    for topic in inner.registry.topics().await {
        let Ok(frame) = serde_json::to_string(&FeedCommand::subscribe(&topic)) else {
            continue;
        };
        if sink.send(Message::Text(frame)).await.is_err() {
            warn!("transport dropped while replaying subscriptions");
            return false;
        }
        debug!(%topic, "replayed subscription");
    }
    true
}

async fn liveness_loop(inner: Arc<ClientShared>) {
    let mut ticker = tokio::time::interval(inner.config.liveness_interval);
    ticker.tick().await; // the first tick completes immediately
    loop {
        ticker.tick().await;
        if inner.shutdown.load(Ordering::SeqCst) {
            break;
        }
        let state = *inner.state.read().await;
        if state != ConnectionState::Open {
            debug!(?state, "liveness check found transport down, forcing reconnect");
            inner.attempts.store(0, Ordering::SeqCst);
            inner.retry_wake.notify_one();
        }
    }
}
