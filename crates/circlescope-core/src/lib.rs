// circlescope-core: push/pull state synchronisation between circlescope-api and renderers.

pub mod config;
pub mod controller;
pub mod error;
pub mod format;
pub mod model;
pub mod render;
pub mod store;

// ── Primary re-exports ──────────────────────────────────────────────
pub use config::{DashboardConfig, HISTORY_CAPACITY, TlsVerification};
pub use controller::{StartupReport, SyncController};
pub use error::CoreError;
pub use render::{NullRenderer, Renderer};
pub use store::DashboardStore;

pub use model::{
    DashboardState, DataSource, DetectionView, History, HistoryEntry, IoView, RecipeView,
    StatisticsView, SystemView, VideoFeed, VideoStatus,
};

// Wire-level types consumers need alongside the state.
pub use circlescope_api::models::MeasureStatus;
pub use circlescope_api::{ApiClient, ConnectionState, ReconnectConfig};
