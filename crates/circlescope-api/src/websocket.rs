//! Live event stream with bounded auto-reconnect.
//!
//! Connects to the dashboard server's `/ws/live` endpoint and dispatches
//! every decoded `{event, data}` envelope to the handler registered for
//! that event, in arrival order, one at a time. Every decoded envelope is
//! also published on a [`tokio::sync::broadcast`] channel for raw taps.
//!
//! Reconnection uses a fixed delay and gives up permanently after
//! `max_attempts` consecutive failures; only an explicit
//! [`StreamClient::connect`] starts a new run after that.
//!
//! # Example
//!
//! ```rust,ignore
//! use circlescope_api::websocket::{EventKind, ReconnectConfig, StreamClient};
//!
//! let client = StreamClient::new(ws_url, ReconnectConfig::default());
//! client.on(EventKind::DetectionResult, |data| println!("{data}"));
//! client.connect();
//! // ...
//! client.disconnect();
//! ```

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};
use url::Url;

use crate::error::Error;
use crate::transport::{Link, Transport, WsTransport};

// ── Broadcast channel capacity ───────────────────────────────────────

const ENVELOPE_CHANNEL_CAPACITY: usize = 256;

/// Keepalive text the server answers with `pong`.
const PING_TEXT: &str = "ping";

// ── ConnectionState ──────────────────────────────────────────────────

/// Observable state of the stream connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

// ── EventKind / Envelope ─────────────────────────────────────────────

/// Stream event names the dashboard understands.
///
/// Unknown wire names still decode as an [`Envelope`]; they just have no
/// `EventKind` and are ignored by dispatch.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    strum::Display,
    strum::EnumString,
    strum::AsRefStr,
    strum::EnumIter,
)]
#[strum(serialize_all = "snake_case")]
pub enum EventKind {
    DetectionResult,
    StatisticsUpdate,
    IoStatus,
    SystemStatus,
    RecipeChanged,
    /// Server keepalive; recognised so it is not reported as unknown.
    Ping,
}

/// Wire wrapper around every inbound stream message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub event: String,
    #[serde(default)]
    pub data: serde_json::Value,
}

impl Envelope {
    /// Decode one inbound text message.
    pub fn decode(text: &str) -> Result<Self, Error> {
        serde_json::from_str(text).map_err(|e| Error::Decode {
            message: e.to_string(),
            body: text.to_owned(),
        })
    }

    /// The typed event name, or `None` for names this client doesn't know.
    pub fn kind(&self) -> Option<EventKind> {
        self.event.parse().ok()
    }
}

// ── ReconnectConfig ──────────────────────────────────────────────────

/// Fixed-delay reconnection policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconnectConfig {
    /// Delay before every reconnection attempt. Default: 3s.
    pub delay: Duration,

    /// Consecutive failed reconnects (since the last successful connect)
    /// before giving up. Default: 10.
    pub max_attempts: u32,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            delay: Duration::from_millis(3000),
            max_attempts: 10,
        }
    }
}

// ── StreamClient ─────────────────────────────────────────────────────

type Handler = Arc<dyn Fn(serde_json::Value) + Send + Sync>;

/// Handle to the live event stream.
///
/// Cheaply cloneable. Owns at most one live transport link at a time; the
/// link itself lives inside the background task and is never exposed.
#[derive(Clone)]
pub struct StreamClient {
    inner: Arc<Inner>,
}

struct Inner {
    url: Url,
    transport: Arc<dyn Transport>,
    reconnect: ReconnectConfig,
    state: watch::Sender<ConnectionState>,
    handlers: DashMap<EventKind, Handler>,
    envelope_tx: broadcast::Sender<Arc<Envelope>>,
    attempts: AtomicU32,
    session: Mutex<Option<Session>>,
}

/// One `connect()` run: its cancellation token and outbound queue.
struct Session {
    cancel: CancellationToken,
    outbound: mpsc::UnboundedSender<String>,
}

impl StreamClient {
    /// Create a client for `url` backed by tokio-tungstenite. Does NOT
    /// connect -- call [`connect()`](Self::connect).
    pub fn new(url: Url, reconnect: ReconnectConfig) -> Self {
        Self::with_transport(url, reconnect, Arc::new(WsTransport::default()))
    }

    /// Create a client over a custom [`Transport`].
    pub fn with_transport(
        url: Url,
        reconnect: ReconnectConfig,
        transport: Arc<dyn Transport>,
    ) -> Self {
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        let (envelope_tx, _) = broadcast::channel(ENVELOPE_CHANNEL_CAPACITY);

        Self {
            inner: Arc::new(Inner {
                url,
                transport,
                reconnect,
                state,
                handlers: DashMap::new(),
                envelope_tx,
                attempts: AtomicU32::new(0),
                session: Mutex::new(None),
            }),
        }
    }

    pub fn url(&self) -> &Url {
        &self.inner.url
    }

    pub fn reconnect_config(&self) -> &ReconnectConfig {
        &self.inner.reconnect
    }

    // ── Connection lifecycle ─────────────────────────────────────────

    /// Start connecting in the background.
    ///
    /// No-op while a run is already active (connecting, connected, or
    /// waiting to reconnect). Must be called from within a Tokio runtime.
    pub fn connect(&self) {
        let mut slot = self.inner.lock_session();
        if slot.as_ref().is_some_and(|s| !s.cancel.is_cancelled()) {
            debug!(state = %self.state(), "connect() ignored, stream already active");
            return;
        }

        let cancel = CancellationToken::new();
        let (outbound, outbound_rx) = mpsc::unbounded_channel();
        *slot = Some(Session {
            cancel: cancel.clone(),
            outbound,
        });
        drop(slot);

        self.inner.publish(&cancel, ConnectionState::Connecting);
        tokio::spawn(stream_loop(Arc::clone(&self.inner), cancel, outbound_rx));
    }

    /// Close the link on purpose. Suppresses any scheduled reconnect.
    pub fn disconnect(&self) {
        if let Some(session) = self.inner.lock_session().take() {
            session.cancel.cancel();
            info!("Live stream disconnect requested");
        }
        self.inner.state.send_if_modified(|state| {
            let changed = *state != ConnectionState::Disconnected;
            *state = ConnectionState::Disconnected;
            changed
        });
    }

    // ── Registry ─────────────────────────────────────────────────────

    /// Register the handler for `kind`, replacing any previous one.
    ///
    /// Handlers run on the stream task, synchronously, in arrival order.
    /// A handler must not call back into `on`/`off`.
    pub fn on<F>(&self, kind: EventKind, handler: F)
    where
        F: Fn(serde_json::Value) + Send + Sync + 'static,
    {
        if self.inner.handlers.insert(kind, Arc::new(handler)).is_some() {
            debug!(event = %kind, "replaced stream handler");
        }
    }

    /// Remove the handler for `kind`; matching envelopes are then dropped.
    pub fn off(&self, kind: EventKind) {
        self.inner.handlers.remove(&kind);
    }

    /// Subscribe to every decoded envelope, known or not.
    pub fn envelopes(&self) -> broadcast::Receiver<Arc<Envelope>> {
        self.inner.envelope_tx.subscribe()
    }

    // ── Outbound ─────────────────────────────────────────────────────

    /// Serialize and transmit `value` if connected; silently dropped otherwise.
    pub fn send<T: Serialize + ?Sized>(&self, value: &T) {
        if !self.is_connected() {
            trace!("send() while not connected, dropping message");
            return;
        }
        match serde_json::to_string(value) {
            Ok(text) => self.inner.enqueue(text),
            Err(e) => warn!(error = %e, "could not serialize outbound message"),
        }
    }

    /// Send the keepalive text if connected.
    pub fn ping(&self) {
        if self.is_connected() {
            self.inner.enqueue(PING_TEXT.to_owned());
        }
    }

    // ── Observation ──────────────────────────────────────────────────

    pub fn state(&self) -> ConnectionState {
        *self.inner.state.borrow()
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    /// Subscribe to connectivity changes.
    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.inner.state.subscribe()
    }

    /// Consecutive reconnect attempts since the last successful connect.
    pub fn reconnect_attempts(&self) -> u32 {
        self.inner.attempts.load(Ordering::Acquire)
    }

    /// Whether a run is active (including waiting out a reconnect delay).
    pub fn is_active(&self) -> bool {
        self.inner
            .lock_session()
            .as_ref()
            .is_some_and(|s| !s.cancel.is_cancelled())
    }
}

impl Inner {
    fn lock_session(&self) -> std::sync::MutexGuard<'_, Option<Session>> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Publish a state change unless this run has been cancelled.
    fn publish(&self, cancel: &CancellationToken, next: ConnectionState) {
        if cancel.is_cancelled() {
            return;
        }
        self.state.send_if_modified(|state| {
            let changed = *state != next;
            *state = next;
            changed
        });
    }

    fn enqueue(&self, text: String) {
        if let Some(session) = self.lock_session().as_ref() {
            // A closed queue means the run just ended; dropping is fine.
            let _ = session.outbound.send(text);
        }
    }

    /// Decode one inbound message and hand it to the registered handler.
    fn dispatch(&self, text: &str) {
        let envelope = match Envelope::decode(text) {
            Ok(envelope) => Arc::new(envelope),
            Err(e) => {
                if text == "pong" {
                    trace!("keepalive pong");
                } else {
                    warn!(error = %e, "dropping malformed stream message");
                }
                return;
            }
        };

        trace!(event = %envelope.event, data = %envelope.data, "stream event");

        match envelope.kind() {
            Some(EventKind::Ping) => trace!("server keepalive"),
            Some(kind) => {
                // Clone the handler out so no map guard is held while it runs.
                let handler = self.handlers.get(&kind).map(|h| Arc::clone(h.value()));
                match handler {
                    Some(handler) => handler(envelope.data.clone()),
                    None => debug!(event = %kind, "no handler registered, dropping event"),
                }
            }
            None => debug!(event = %envelope.event, "ignoring unknown stream event"),
        }

        // Ignore send errors -- just means no raw subscribers right now
        let _ = self.envelope_tx.send(envelope);
    }
}

// ── Background reconnection loop ─────────────────────────────────────

/// Main loop: connect → read → on close, wait `delay` → reconnect, until
/// cancelled or the attempt cap is hit.
async fn stream_loop(
    inner: Arc<Inner>,
    cancel: CancellationToken,
    mut outbound: mpsc::UnboundedReceiver<String>,
) {
    loop {
        inner.publish(&cancel, ConnectionState::Connecting);

        let result = connect_and_read(&inner, &cancel, &mut outbound).await;

        // Local disconnect: the caller already published Disconnected.
        if cancel.is_cancelled() {
            break;
        }

        inner.publish(&cancel, ConnectionState::Disconnected);
        match result {
            Ok(()) => info!("Live stream closed"),
            Err(e) => warn!(error = %e, "Live stream error"),
        }

        let attempt = inner.attempts.load(Ordering::Acquire);
        if attempt >= inner.reconnect.max_attempts {
            error!(
                max_attempts = inner.reconnect.max_attempts,
                "Live stream reconnection limit reached, giving up"
            );
            break;
        }

        let attempt = attempt + 1;
        inner.attempts.store(attempt, Ordering::Release);
        info!(
            delay_ms = u64::try_from(inner.reconnect.delay.as_millis()).unwrap_or(u64::MAX),
            attempt,
            "Reconnecting to live stream"
        );

        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            () = tokio::time::sleep(inner.reconnect.delay) => {}
        }
    }

    // Mark this run finished so a later connect() starts a fresh one.
    cancel.cancel();
    debug!("Live stream loop exiting");
}

enum Step {
    Shutdown,
    Outbound(String),
    Inbound(Result<Option<String>, Error>),
}

// ── Single connection lifecycle ──────────────────────────────────────

/// Open one link and pump it until it drops or the run is cancelled.
async fn connect_and_read(
    inner: &Inner,
    cancel: &CancellationToken,
    outbound: &mut mpsc::UnboundedReceiver<String>,
) -> Result<(), Error> {
    info!(url = %inner.url, "Connecting to live stream");

    let mut link: Box<dyn Link> = tokio::select! {
        biased;
        () = cancel.cancelled() => return Ok(()),
        opened = inner.transport.open(&inner.url) => opened?,
    };

    inner.attempts.store(0, Ordering::Release);
    // Anything queued for a previous link is stale.
    while outbound.try_recv().is_ok() {}
    inner.publish(cancel, ConnectionState::Connected);
    info!("Live stream connected");

    loop {
        let step = tokio::select! {
            biased;
            () = cancel.cancelled() => Step::Shutdown,
            Some(text) = outbound.recv() => Step::Outbound(text),
            frame = link.recv() => Step::Inbound(frame),
        };

        match step {
            Step::Shutdown => {
                if let Err(e) = link.close().await {
                    debug!(error = %e, "error while closing live stream");
                }
                return Ok(());
            }
            Step::Outbound(text) => link.send(text).await?,
            Step::Inbound(Ok(Some(text))) => inner.dispatch(&text),
            Step::Inbound(Ok(None)) => return Ok(()),
            Step::Inbound(Err(e)) => return Err(e),
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────────
