#![allow(clippy::unwrap_used)]

// Integration tests for `StreamClient` over a scripted in-memory transport.
//
// All tests run on paused Tokio time so the reconnect delay is stepped,
// not waited out.

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::BoxFuture;
use serde_json::json;
use tokio::sync::mpsc;
use url::Url;

use circlescope_api::{
    ConnectionState, Error, EventKind, Link, ReconnectConfig, StreamClient, Transport,
};

// ── Scripted transport ──────────────────────────────────────────────

enum Frame {
    Text(String),
    Close,
    Fail,
}

/// Server side of one accepted link.
struct Peer {
    to_client: mpsc::UnboundedSender<Frame>,
    from_client: mpsc::UnboundedReceiver<String>,
}

impl Peer {
    fn push(&self, text: &str) {
        self.to_client.send(Frame::Text(text.to_owned())).unwrap();
    }
}

struct ScriptedTransport {
    opens: AtomicU32,
    refuse: AtomicBool,
    peers: mpsc::UnboundedSender<Peer>,
}

impl ScriptedTransport {
    fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<Peer>) {
        let (peers, accepted) = mpsc::unbounded_channel();
        let transport = Arc::new(Self {
            opens: AtomicU32::new(0),
            refuse: AtomicBool::new(false),
            peers,
        });
        (transport, accepted)
    }

    fn opens(&self) -> u32 {
        self.opens.load(Ordering::SeqCst)
    }

    fn refuse(&self, refuse: bool) {
        self.refuse.store(refuse, Ordering::SeqCst);
    }
}

impl Transport for ScriptedTransport {
    fn open<'a>(&'a self, _url: &'a Url) -> BoxFuture<'a, Result<Box<dyn Link>, Error>> {
        Box::pin(async move {
            self.opens.fetch_add(1, Ordering::SeqCst);
            if self.refuse.load(Ordering::SeqCst) {
                return Err(Error::WebSocketConnect("connection refused".into()));
            }

            let (to_client, inbound) = mpsc::unbounded_channel();
            let (outbound, from_client) = mpsc::unbounded_channel();
            let _ = self.peers.send(Peer {
                to_client,
                from_client,
            });
            Ok(Box::new(ScriptedLink { inbound, outbound }) as Box<dyn Link>)
        })
    }
}

struct ScriptedLink {
    inbound: mpsc::UnboundedReceiver<Frame>,
    outbound: mpsc::UnboundedSender<String>,
}

impl Link for ScriptedLink {
    fn recv(&mut self) -> BoxFuture<'_, Result<Option<String>, Error>> {
        Box::pin(async move {
            match self.inbound.recv().await {
                Some(Frame::Text(text)) => Ok(Some(text)),
                Some(Frame::Close) | None => Ok(None),
                Some(Frame::Fail) => Err(Error::WebSocketConnect("connection reset".into())),
            }
        })
    }

    fn send(&mut self, text: String) -> BoxFuture<'_, Result<(), Error>> {
        Box::pin(async move {
            self.outbound
                .send(text)
                .map_err(|e| Error::Send(e.to_string()))
        })
    }

    fn close(&mut self) -> BoxFuture<'_, Result<(), Error>> {
        Box::pin(async { Ok(()) })
    }
}

// ── Helpers ─────────────────────────────────────────────────────────

fn reconnect(max_attempts: u32) -> ReconnectConfig {
    ReconnectConfig {
        delay: Duration::from_millis(3000),
        max_attempts,
    }
}

fn client_over(transport: &Arc<ScriptedTransport>, config: ReconnectConfig) -> StreamClient {
    StreamClient::with_transport(
        Url::parse("ws://inspection.local/ws/live").unwrap(),
        config,
        Arc::clone(transport) as Arc<dyn Transport>,
    )
}

/// Let spawned tasks run without moving the paused clock.
async fn settle() {
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
}

async fn step(ms: u64) {
    tokio::time::advance(Duration::from_millis(ms)).await;
    settle().await;
}

// ── Connect / dispatch ──────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn test_connect_dispatches_in_arrival_order() {
    let (transport, mut peers) = ScriptedTransport::new();
    let client = client_over(&transport, reconnect(10));

    let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    client.on(EventKind::StatisticsUpdate, move |data| {
        sink.lock().unwrap().push(data["total_inspections"].as_u64().unwrap());
    });

    client.connect();
    let peer = peers.recv().await.unwrap();
    settle().await;
    assert!(client.is_connected());

    for n in 1..=3 {
        peer.push(&json!({"event": "statistics_update", "data": {"total_inspections": n}}).to_string());
    }
    settle().await;

    assert_eq!(*seen.lock().unwrap(), vec![1, 2, 3]);
}

#[tokio::test(start_paused = true)]
async fn test_connect_while_connected_is_noop() {
    let (transport, mut peers) = ScriptedTransport::new();
    let client = client_over(&transport, reconnect(10));

    client.connect();
    let _peer = peers.recv().await.unwrap();
    settle().await;

    client.connect();
    client.connect();
    settle().await;

    assert_eq!(transport.opens(), 1);
    assert!(client.is_connected());
}

#[tokio::test(start_paused = true)]
async fn test_malformed_message_keeps_connection() {
    let (transport, mut peers) = ScriptedTransport::new();
    let client = client_over(&transport, reconnect(10));
    let hits = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&hits);
    client.on(EventKind::DetectionResult, move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    client.connect();
    let peer = peers.recv().await.unwrap();
    settle().await;

    peer.push("{\"event\":\"detection_result\",");
    peer.push("pong");
    settle().await;

    assert!(client.is_connected());
    assert_eq!(hits.load(Ordering::SeqCst), 0);
    assert_eq!(transport.opens(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_send_reaches_peer_only_when_connected() {
    let (transport, mut peers) = ScriptedTransport::new();
    let client = client_over(&transport, reconnect(10));

    client.send(&json!({"cmd": "early"}));
    client.connect();
    let mut peer = peers.recv().await.unwrap();
    settle().await;

    client.send(&json!({"cmd": "refresh"}));
    client.ping();
    settle().await;

    assert_eq!(peer.from_client.recv().await.unwrap(), r#"{"cmd":"refresh"}"#);
    assert_eq!(peer.from_client.recv().await.unwrap(), "ping");
    assert!(peer.from_client.try_recv().is_err());
}

// ── Reconnect policy ────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn test_server_close_schedules_reconnect_after_delay() {
    let (transport, mut peers) = ScriptedTransport::new();
    let client = client_over(&transport, reconnect(10));
    let mut states = client.subscribe_state();

    client.connect();
    let peer = peers.recv().await.unwrap();
    settle().await;
    let _ = states.borrow_and_update();

    peer.to_client.send(Frame::Close).unwrap();
    settle().await;

    assert_eq!(client.state(), ConnectionState::Disconnected);
    assert!(states.has_changed().unwrap());
    assert_eq!(client.reconnect_attempts(), 1);
    assert!(client.is_active());

    step(2900).await;
    assert_eq!(transport.opens(), 1);

    step(200).await;
    assert_eq!(transport.opens(), 2);
    let _second = peers.recv().await.unwrap();
    settle().await;
    assert!(client.is_connected());
    assert_eq!(client.reconnect_attempts(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_transport_error_triggers_reconnect() {
    let (transport, mut peers) = ScriptedTransport::new();
    let client = client_over(&transport, reconnect(10));

    client.connect();
    let peer = peers.recv().await.unwrap();
    settle().await;

    peer.to_client.send(Frame::Fail).unwrap();
    settle().await;
    assert!(!client.is_connected());

    let _second = peers.recv().await.unwrap();
    settle().await;
    assert!(client.is_connected());
    assert_eq!(transport.opens(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_reconnect_stops_at_cap() {
    let (transport, _peers) = ScriptedTransport::new();
    transport.refuse(true);
    let client = client_over(&transport, reconnect(3));

    client.connect();
    tokio::time::sleep(Duration::from_secs(60)).await;

    // One initial attempt plus three reconnects.
    assert_eq!(transport.opens(), 4);
    assert_eq!(client.reconnect_attempts(), 3);
    assert_eq!(client.state(), ConnectionState::Disconnected);
    assert!(!client.is_active());

    // An explicit connect after the cap gets exactly one more try.
    client.connect();
    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(transport.opens(), 5);
    assert!(!client.is_active());
}

#[tokio::test(start_paused = true)]
async fn test_attempts_reset_after_successful_connect() {
    let (transport, mut peers) = ScriptedTransport::new();
    transport.refuse(true);
    let client = client_over(&transport, reconnect(3));

    client.connect();
    settle().await;
    assert_eq!(client.reconnect_attempts(), 1);

    step(3000).await;
    assert_eq!(transport.opens(), 2);
    assert_eq!(client.reconnect_attempts(), 2);

    transport.refuse(false);
    step(3000).await;
    let peer = peers.recv().await.unwrap();
    settle().await;
    assert!(client.is_connected());
    assert_eq!(client.reconnect_attempts(), 0);

    // The counter starts over: three fresh failures are allowed again.
    transport.refuse(true);
    drop(peer);
    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(transport.opens(), 3 + 3);
    assert!(!client.is_active());
}

#[tokio::test(start_paused = true)]
async fn test_disconnect_suppresses_reconnect() {
    let (transport, mut peers) = ScriptedTransport::new();
    let client = client_over(&transport, reconnect(10));

    client.connect();
    let _peer = peers.recv().await.unwrap();
    settle().await;

    client.disconnect();
    settle().await;
    tokio::time::sleep(Duration::from_secs(60)).await;

    assert_eq!(transport.opens(), 1);
    assert_eq!(client.state(), ConnectionState::Disconnected);
    assert!(!client.is_active());
}

#[tokio::test(start_paused = true)]
async fn test_disconnect_during_reconnect_wait() {
    let (transport, _peers) = ScriptedTransport::new();
    transport.refuse(true);
    let client = client_over(&transport, reconnect(10));

    client.connect();
    settle().await;
    assert_eq!(client.reconnect_attempts(), 1);

    client.disconnect();
    tokio::time::sleep(Duration::from_secs(60)).await;

    assert_eq!(transport.opens(), 1);
    assert_eq!(client.state(), ConnectionState::Disconnected);
}
