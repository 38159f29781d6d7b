// ── Sync controller ──
//
// Full lifecycle for one dashboard: live stream handlers, the startup
// load, periodic polls, connectivity forwarding, and the render loop,
// all feeding the DashboardStore.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use circlescope_api::models::{
    HistoryPage, IoStatus, RecipeDetail, RecipeList, Statistics, SystemStatus,
};
use circlescope_api::{
    ApiClient, ConnectionState, EventKind, ResourceKind, SnapshotFetcher, SnapshotSource,
    StreamClient, Transport, WsTransport, rest,
};
use serde::de::DeserializeOwned;
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::Url;

use crate::config::DashboardConfig;
use crate::error::CoreError;
use crate::model::{DashboardState, VideoStatus};
use crate::render::Renderer;
use crate::store::DashboardStore;

/// Stream events merged into the dashboard state.
const MERGED_EVENTS: [EventKind; 5] = [
    EventKind::DetectionResult,
    EventKind::StatisticsUpdate,
    EventKind::IoStatus,
    EventKind::SystemStatus,
    EventKind::RecipeChanged,
];

// ── StartupReport ────────────────────────────────────────────────────

/// Outcome of [`SyncController::load_initial`], one entry per step.
#[derive(Debug, Default)]
pub struct StartupReport {
    pub loaded: Vec<ResourceKind>,
    pub failed: Vec<(ResourceKind, CoreError)>,
}

impl StartupReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

// ── SyncController ───────────────────────────────────────────────────

/// Merges the live stream and REST snapshots into one dashboard state
/// and drives a [`Renderer`] with it.
///
/// Cheaply cloneable via `Arc<ControllerInner>`. Lifecycle is
/// `new` → [`start`](Self::start) → [`shutdown`](Self::shutdown); a
/// controller runs at most once.
#[derive(Clone)]
pub struct SyncController {
    inner: Arc<ControllerInner>,
}

struct ControllerInner {
    config: DashboardConfig,
    store: Arc<DashboardStore>,
    stream: StreamClient,
    fetcher: SnapshotFetcher,
    video_url: Url,
    renderer: Mutex<Option<Box<dyn Renderer>>>,
    cancel: CancellationToken,
    task_handles: Mutex<Vec<JoinHandle<()>>>,
    started: AtomicBool,
}

impl SyncController {
    /// Create a controller talking to `config.origin` over HTTP and
    /// WebSocket. Does NOT connect -- call [`start()`](Self::start).
    pub fn new(config: DashboardConfig, renderer: impl Renderer) -> Result<Self, CoreError> {
        let transport = config.transport();
        let api = ApiClient::new(config.origin.clone(), &transport)?;
        let ws = WsTransport::new(&transport)?;
        Self::with_parts(config, Arc::new(api), Arc::new(ws), renderer)
    }

    /// Create a controller over custom snapshot and stream transports.
    pub fn with_parts(
        config: DashboardConfig,
        source: Arc<dyn SnapshotSource>,
        transport: Arc<dyn Transport>,
        renderer: impl Renderer,
    ) -> Result<Self, CoreError> {
        let stream_url = rest::stream_url(&config.origin)?;
        let video_url = rest::video_url(&config.origin)?;

        let store = Arc::new(DashboardStore::with_video(video_url.to_string()));
        let stream = StreamClient::with_transport(stream_url, config.reconnect.clone(), transport);
        let fetcher = SnapshotFetcher::new(source);

        Ok(Self {
            inner: Arc::new(ControllerInner {
                config,
                store,
                stream,
                fetcher,
                video_url,
                renderer: Mutex::new(Some(Box::new(renderer))),
                cancel: CancellationToken::new(),
                task_handles: Mutex::new(Vec::new()),
                started: AtomicBool::new(false),
            }),
        })
    }

    pub fn config(&self) -> &DashboardConfig {
        &self.inner.config
    }

    pub fn store(&self) -> &Arc<DashboardStore> {
        &self.inner.store
    }

    pub fn stream_client(&self) -> &StreamClient {
        &self.inner.stream
    }

    pub fn fetcher(&self) -> &SnapshotFetcher {
        &self.inner.fetcher
    }

    // ── Lifecycle ────────────────────────────────────────────────────

    /// Register stream handlers, connect, and spawn the startup load,
    /// the periodic polls, connectivity forwarding and the render loop.
    ///
    /// Returns immediately; nothing here waits on the network.
    pub async fn start(&self) -> Result<(), CoreError> {
        if self.inner.started.swap(true, Ordering::AcqRel) {
            return Err(CoreError::AlreadyStarted);
        }

        self.register_handlers();

        let cancel = self.inner.cancel.clone();
        let mut handles = self.inner.task_handles.lock().await;

        // Subscribe before connecting so `Connecting` is observed.
        handles.push(tokio::spawn(connection_task(
            self.inner.stream.subscribe_state(),
            Arc::clone(&self.inner.store),
            cancel.clone(),
        )));

        if let Some(renderer) = self.inner.renderer.lock().await.take() {
            handles.push(tokio::spawn(render_task(
                renderer,
                self.inner.store.subscribe(),
                cancel.clone(),
            )));
        }

        self.inner.stream.connect();

        let ctrl = self.clone();
        let load_cancel = cancel.clone();
        handles.push(tokio::spawn(async move {
            tokio::select! {
                biased;
                () = load_cancel.cancelled() => debug!("initial load abandoned"),
                _ = ctrl.load_initial() => {}
            }
        }));

        self.schedule_polls();

        info!(origin = %self.inner.config.origin, "sync controller started");
        Ok(())
    }

    /// Disconnect the stream, stop every schedule and background task.
    pub async fn shutdown(&self) {
        self.inner.stream.disconnect();
        self.inner.fetcher.stop_all();
        self.inner.cancel.cancel();

        let mut handles = self.inner.task_handles.lock().await;
        for handle in handles.drain(..) {
            let _ = handle.await;
        }

        for kind in MERGED_EVENTS {
            self.inner.stream.off(kind);
        }
        self.inner.store.set_connection(ConnectionState::Disconnected);
        debug!("sync controller stopped");
    }

    /// One-shot startup sequence: status, statistics, recipe list,
    /// current recipe (if one is named), recent history, IO status.
    ///
    /// Every step is independent: a failure is logged and recorded in the
    /// report, and the remaining steps still run.
    pub async fn load_initial(&self) -> StartupReport {
        let store = &self.inner.store;
        let mut report = StartupReport::default();

        if let Some(status) = self
            .load_step::<SystemStatus>(ResourceKind::Status, &mut report)
            .await
        {
            store.apply_system_status(&status);
        }

        if let Some(stats) = self
            .load_step::<Statistics>(ResourceKind::Statistics, &mut report)
            .await
        {
            store.apply_statistics(&stats);
        }

        let current = match self
            .load_step::<RecipeList>(ResourceKind::Recipes, &mut report)
            .await
        {
            Some(list) => {
                store.apply_recipe_list(&list);
                list.current.filter(|name| !name.is_empty())
            }
            None => None,
        };

        if let Some(name) = current {
            if let Some(recipe) = self
                .load_step::<RecipeDetail>(ResourceKind::Recipe(name), &mut report)
                .await
            {
                store.apply_recipe(&recipe);
            }
        }

        let watermark = store.history_watermark();
        let history = ResourceKind::history(self.inner.config.history_limit);
        if let Some(page) = self.load_step::<HistoryPage>(history, &mut report).await {
            store.apply_history_snapshot(&page, watermark);
        }

        if let Some(io) = self
            .load_step::<IoStatus>(ResourceKind::IoStatus, &mut report)
            .await
        {
            store.apply_io(&io);
        }

        info!(
            loaded = report.loaded.len(),
            failed = report.failed.len(),
            "initial load complete"
        );
        report
    }

    // ── Video feed ───────────────────────────────────────────────────

    pub fn video_url(&self) -> &Url {
        &self.inner.video_url
    }

    /// The media source produced a frame; hide the overlay.
    pub fn video_loaded(&self) {
        self.inner.store.set_video_status(VideoStatus::Live);
    }

    /// The media source failed; show the overlay.
    pub fn video_failed(&self) {
        warn!(url = %self.inner.video_url, "video stream unavailable");
        self.inner.store.set_video_status(VideoStatus::Unavailable);
    }

    pub fn export_url(&self) -> Result<Url, CoreError> {
        Ok(rest::export_url(&self.inner.config.origin)?)
    }

    // ── State observation ────────────────────────────────────────────

    pub fn state(&self) -> DashboardState {
        self.inner.store.snapshot()
    }

    pub fn subscribe(&self) -> watch::Receiver<DashboardState> {
        self.inner.store.subscribe()
    }

    pub fn is_started(&self) -> bool {
        self.inner.started.load(Ordering::Acquire)
    }

    // ── Internals ────────────────────────────────────────────────────

    fn register_handlers(&self) {
        for kind in MERGED_EVENTS {
            let store = Arc::clone(&self.inner.store);
            self.inner
                .stream
                .on(kind, move |data| store.apply_event(kind, data));
        }
    }

    fn schedule_polls(&self) {
        let config = &self.inner.config;
        let polls = [
            (ResourceKind::Statistics, config.statistics_interval),
            (ResourceKind::IoStatus, config.io_interval),
        ];
        for (kind, every) in polls {
            let store = Arc::clone(&self.inner.store);
            let applied = kind.clone();
            self.inner
                .fetcher
                .schedule_periodic(kind, every, move |data| store.apply_snapshot(&applied, data));
        }
    }

    async fn load_step<T: DeserializeOwned>(
        &self,
        kind: ResourceKind,
        report: &mut StartupReport,
    ) -> Option<T> {
        match self.inner.fetcher.fetch_as::<T>(&kind).await {
            Ok(value) => {
                debug!(%kind, "startup step loaded");
                report.loaded.push(kind);
                Some(value)
            }
            Err(e) => {
                warn!(%kind, error = %e, "startup step failed");
                report.failed.push((kind, e.into()));
                None
            }
        }
    }
}

// ── Background tasks ─────────────────────────────────────────────────

/// Mirror stream connectivity into the dashboard state.
async fn connection_task(
    mut rx: watch::Receiver<ConnectionState>,
    store: Arc<DashboardStore>,
    cancel: CancellationToken,
) {
    store.set_connection(*rx.borrow_and_update());

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            changed = rx.changed() => {
                if changed.is_err() {
                    break;
                }
                let state = *rx.borrow_and_update();
                debug!(%state, "live stream connectivity");
                store.set_connection(state);
            }
        }
    }
}

/// Render the current state, then every change until cancelled.
async fn render_task(
    mut renderer: Box<dyn Renderer>,
    mut rx: watch::Receiver<DashboardState>,
    cancel: CancellationToken,
) {
    // Clone out of the channel so rendering never holds its read lock.
    let state = rx.borrow_and_update().clone();
    renderer.render(&state);

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            changed = rx.changed() => {
                if changed.is_err() {
                    break;
                }
                let state = rx.borrow_and_update().clone();
                renderer.render(&state);
            }
        }
    }

    renderer.finish();
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex as StdMutex;
    use std::time::Duration;

    use circlescope_api::models::MeasureStatus;
    use circlescope_api::{Error, Link};
    use futures_util::future::BoxFuture;
    use pretty_assertions::assert_eq;
    use serde_json::{Value, json};
    use tokio::sync::mpsc;

    use super::*;
    use crate::render::NullRenderer;

    // ── Fakes ────────────────────────────────────────────────────────

    /// Serves canned bodies by path; everything else is a 404.
    #[derive(Default)]
    struct CannedSource {
        bodies: HashMap<String, Value>,
        calls: StdMutex<Vec<ResourceKind>>,
    }

    impl CannedSource {
        fn with(mut self, kind: &ResourceKind, body: Value) -> Self {
            self.bodies.insert(kind.path(), body);
            self
        }

        fn calls(&self) -> Vec<ResourceKind> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl SnapshotSource for CannedSource {
        fn fetch<'a>(&'a self, kind: &'a ResourceKind) -> BoxFuture<'a, Result<Value, Error>> {
            Box::pin(async move {
                self.calls.lock().unwrap().push(kind.clone());
                self.bodies.get(&kind.path()).cloned().ok_or(Error::Status {
                    status: 404,
                    path: kind.path(),
                })
            })
        }
    }

    /// Each `open` yields a link fed by a channel handed to the test.
    struct ChannelTransport {
        peers: mpsc::UnboundedSender<mpsc::UnboundedSender<String>>,
    }

    struct ChannelLink {
        inbound: mpsc::UnboundedReceiver<String>,
    }

    impl Transport for ChannelTransport {
        fn open<'a>(&'a self, _url: &'a Url) -> BoxFuture<'a, Result<Box<dyn Link>, Error>> {
            Box::pin(async move {
                let (tx, inbound) = mpsc::unbounded_channel();
                self.peers
                    .send(tx)
                    .map_err(|_| Error::WebSocketConnect("test ended".into()))?;
                Ok(Box::new(ChannelLink { inbound }) as Box<dyn Link>)
            })
        }
    }

    impl Link for ChannelLink {
        fn recv(&mut self) -> BoxFuture<'_, Result<Option<String>, Error>> {
            Box::pin(async move { Ok(self.inbound.recv().await) })
        }

        fn send(&mut self, _text: String) -> BoxFuture<'_, Result<(), Error>> {
            Box::pin(async { Ok(()) })
        }

        fn close(&mut self) -> BoxFuture<'_, Result<(), Error>> {
            Box::pin(async { Ok(()) })
        }
    }

    fn config() -> DashboardConfig {
        DashboardConfig::from_origin("http://line-3.local:8000").unwrap()
    }

    fn controller(
        source: CannedSource,
        renderer: impl Renderer,
    ) -> (
        SyncController,
        Arc<CannedSource>,
        mpsc::UnboundedReceiver<mpsc::UnboundedSender<String>>,
    ) {
        let source = Arc::new(source);
        let (peers, peer_rx) = mpsc::unbounded_channel();
        let ctrl = SyncController::with_parts(
            config(),
            Arc::clone(&source) as Arc<dyn SnapshotSource>,
            Arc::new(ChannelTransport { peers }),
            renderer,
        )
        .unwrap();
        (ctrl, source, peer_rx)
    }

    async fn wait_until(ctrl: &SyncController, pred: impl FnMut(&DashboardState) -> bool) {
        let mut rx = ctrl.subscribe();
        tokio::time::timeout(Duration::from_secs(5), rx.wait_for(pred))
            .await
            .expect("state condition not reached")
            .unwrap();
    }

    fn detection(diameter: f64, status: &str) -> String {
        json!({
            "event": "detection_result",
            "data": {"circles": [{"diameter_mm": diameter, "status": status}]}
        })
        .to_string()
    }

    // ── Startup load ─────────────────────────────────────────────────

    #[tokio::test]
    async fn startup_runs_in_order_and_survives_a_failed_step() {
        let source = CannedSource::default()
            .with(&ResourceKind::Status, json!({"fps": 29.97, "camera_connected": true}))
            .with(
                &ResourceKind::Statistics,
                json!({"total_inspections": 20, "ok_count": 19}),
            )
            .with(
                &ResourceKind::Recipes,
                json!({"recipes": ["M12", "M8"], "current": "M12", "count": 2}),
            )
            .with(
                &ResourceKind::history(50),
                json!({"items": [
                    {"timestamp": "2026-03-01T10:00:02", "circles": [{"diameter_mm": 12.01}], "overall_status": "OK"},
                    {"timestamp": "2026-03-01T10:00:01", "circles": [{"diameter_mm": 12.20}], "overall_status": "NG"}
                ], "total": 2, "limit": 50, "offset": 0}),
            )
            .with(&ResourceKind::IoStatus, json!({"system_ready": true}));
        let (ctrl, source, _peers) = controller(source, NullRenderer);

        let report = ctrl.load_initial().await;

        assert_eq!(
            source.calls(),
            vec![
                ResourceKind::Status,
                ResourceKind::Statistics,
                ResourceKind::Recipes,
                ResourceKind::Recipe("M12".into()),
                ResourceKind::history(50),
                ResourceKind::IoStatus,
            ]
        );
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, ResourceKind::Recipe("M12".into()));
        assert_eq!(report.failed[0].1.status(), Some(404));
        assert!(!report.is_complete());

        let state = ctrl.state();
        assert_eq!(state.statistics.unwrap().ok_rate_display(), "95.0%");
        assert_eq!(state.system.unwrap().fps_display(), "30.0");
        assert_eq!(state.recipes, vec!["M12".to_owned(), "M8".to_owned()]);
        assert!(state.recipe.is_none());
        assert!(state.io.unwrap().system_ready);
        assert_eq!(state.history.len(), 2);
        assert_eq!(state.history.head().unwrap().status, MeasureStatus::Ok);
    }

    #[tokio::test]
    async fn startup_without_current_recipe_skips_detail() {
        let source = CannedSource::default().with(&ResourceKind::Recipes, json!({"recipes": []}));
        let (ctrl, source, _peers) = controller(source, NullRenderer);

        let report = ctrl.load_initial().await;

        assert_eq!(source.calls().len(), 5);
        assert_eq!(report.loaded, vec![ResourceKind::Recipes]);
        assert_eq!(report.failed.len(), 4);
    }

    // ── Live stream ──────────────────────────────────────────────────

    #[tokio::test]
    async fn stream_event_becomes_history_head() {
        let (ctrl, _source, mut peers) = controller(CannedSource::default(), NullRenderer);
        ctrl.start().await.unwrap();

        let peer = peers.recv().await.unwrap();
        wait_until(&ctrl, DashboardState::is_connected).await;

        peer.send(detection(12.345, "ok")).unwrap();
        wait_until(&ctrl, |s| !s.history.is_empty()).await;

        let state = ctrl.state();
        let head = state.history.head().unwrap();
        assert_eq!(head.diameter_display(), "12.345");
        assert_eq!(head.status.to_string(), "OK");

        ctrl.shutdown().await;
    }

    #[tokio::test]
    async fn sixty_events_leave_fifty_newest_first() {
        let (ctrl, _source, mut peers) = controller(CannedSource::default(), NullRenderer);
        ctrl.start().await.unwrap();
        let peer = peers.recv().await.unwrap();

        for n in 0..60u8 {
            peer.send(detection(f64::from(n), "ng")).unwrap();
        }
        wait_until(&ctrl, |s| {
            s.history.head().and_then(|e| e.diameter_mm) == Some(59.0)
        })
        .await;

        let state = ctrl.state();
        assert_eq!(state.history.len(), 50);
        assert_eq!(state.history.iter().last().unwrap().diameter_mm, Some(10.0));

        ctrl.shutdown().await;
    }

    #[tokio::test]
    async fn pushed_statistics_update_the_view() {
        let (ctrl, _source, mut peers) = controller(CannedSource::default(), NullRenderer);
        ctrl.start().await.unwrap();
        let peer = peers.recv().await.unwrap();

        peer.send(
            json!({"event": "statistics_update", "data": {"runtime_seconds": 3665}}).to_string(),
        )
        .unwrap();
        peer.send(json!({"event": "firmware_notice", "data": {}}).to_string())
            .unwrap();
        wait_until(&ctrl, |s| s.statistics.is_some()).await;

        assert_eq!(
            ctrl.state().statistics.unwrap().runtime_display(),
            "01:01:05"
        );
        ctrl.shutdown().await;
    }

    // ── Renderer and lifecycle ───────────────────────────────────────

    #[tokio::test]
    async fn renderer_sees_initial_and_merged_state() {
        let (seen_tx, mut seen) = mpsc::unbounded_channel::<DashboardState>();
        let renderer = move |state: &DashboardState| {
            let _ = seen_tx.send(state.clone());
        };
        let (ctrl, _source, mut peers) = controller(CannedSource::default(), renderer);
        ctrl.start().await.unwrap();

        let first = seen.recv().await.unwrap();
        assert!(first.history.is_empty());

        let peer = peers.recv().await.unwrap();
        peer.send(detection(7.5, "ok")).unwrap();

        loop {
            let state = tokio::time::timeout(Duration::from_secs(5), seen.recv())
                .await
                .unwrap()
                .unwrap();
            if state.history.len() == 1 {
                break;
            }
        }
        ctrl.shutdown().await;
    }

    #[tokio::test]
    async fn start_twice_is_rejected() {
        let (ctrl, _source, _peers) = controller(CannedSource::default(), NullRenderer);
        ctrl.start().await.unwrap();

        assert!(matches!(ctrl.start().await, Err(CoreError::AlreadyStarted)));
        assert!(ctrl.is_started());
        ctrl.shutdown().await;
    }

    #[tokio::test]
    async fn shutdown_stops_stream_and_schedules() {
        let (ctrl, _source, mut peers) = controller(CannedSource::default(), NullRenderer);
        ctrl.start().await.unwrap();
        let _peer = peers.recv().await.unwrap();
        assert!(ctrl.fetcher().is_scheduled(&ResourceKind::IoStatus));

        ctrl.shutdown().await;

        assert!(!ctrl.stream_client().is_active());
        assert!(!ctrl.fetcher().is_scheduled(&ResourceKind::IoStatus));
        assert!(!ctrl.fetcher().is_scheduled(&ResourceKind::Statistics));
        assert!(!ctrl.state().is_connected());
    }

    #[test]
    fn urls_derive_from_origin() {
        let (ctrl, _source, _peers) = controller(CannedSource::default(), NullRenderer);

        assert_eq!(
            ctrl.video_url().as_str(),
            "http://line-3.local:8000/stream/video"
        );
        assert_eq!(
            ctrl.stream_client().url().as_str(),
            "ws://line-3.local:8000/ws/live"
        );
        assert_eq!(
            ctrl.export_url().unwrap().as_str(),
            "http://line-3.local:8000/api/statistics/export"
        );
    }

    #[test]
    fn video_events_toggle_overlay() {
        let (ctrl, _source, _peers) = controller(CannedSource::default(), NullRenderer);
        assert!(ctrl.state().video.overlay_visible());

        ctrl.video_loaded();
        assert!(!ctrl.state().video.overlay_visible());

        ctrl.video_failed();
        assert_eq!(ctrl.state().video.status, VideoStatus::Unavailable);
    }
}
