// ── Central reactive dashboard store ──
//
// Holds the aggregate state behind a `watch` channel. Every mutation
// goes through `send_modify`/`send_if_modified`, so subscribers always see
// a complete state and slow renderers only ever observe the latest one.

use chrono::Utc;
use circlescope_api::ConnectionState;
use tokio::sync::watch;

use crate::model::{DashboardState, VideoFeed, VideoStatus};

/// Central reactive store for the dashboard.
pub struct DashboardStore {
    pub(crate) state: watch::Sender<DashboardState>,
}

impl DashboardStore {
    pub fn new() -> Self {
        let (state, _) = watch::channel(DashboardState::default());
        Self { state }
    }

    /// Store with the video feed bound to `video_url`.
    pub fn with_video(video_url: String) -> Self {
        let store = Self::new();
        store.state.send_modify(|s| {
            s.video = VideoFeed {
                url: video_url,
                status: VideoStatus::Pending,
            };
        });
        store
    }

    // ── Snapshot accessors ───────────────────────────────────────────

    /// Point-in-time copy of the whole state.
    pub fn snapshot(&self) -> DashboardState {
        self.state.borrow().clone()
    }

    pub fn connection(&self) -> ConnectionState {
        self.state.borrow().connection
    }

    pub fn history_len(&self) -> usize {
        self.state.borrow().history.len()
    }

    /// Push count used to reconcile a history snapshot fetched from now on.
    pub fn history_watermark(&self) -> u64 {
        self.state.borrow().history.watermark()
    }

    // ── Subscriptions ────────────────────────────────────────────────

    pub fn subscribe(&self) -> watch::Receiver<DashboardState> {
        self.state.subscribe()
    }

    // ── Mutation ─────────────────────────────────────────────────────

    /// Apply `f` and stamp the update time.
    pub(crate) fn update(&self, f: impl FnOnce(&mut DashboardState)) {
        self.state.send_modify(|state| {
            f(state);
            state.updated_at = Some(Utc::now());
        });
    }

    /// Like [`update`](Self::update), but `f` reports whether anything
    /// changed; an unchanged state is neither stamped nor broadcast.
    pub(crate) fn update_if(&self, f: impl FnOnce(&mut DashboardState) -> bool) {
        self.state.send_if_modified(|state| {
            if !f(state) {
                return false;
            }
            state.updated_at = Some(Utc::now());
            true
        });
    }
}

impl Default for DashboardStore {
    fn default() -> Self {
        Self::new()
    }
}
