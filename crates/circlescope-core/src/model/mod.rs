// ── Dashboard domain model ──
//
// The merged view the renderer consumes. Wire types live in
// `circlescope_api::models`; everything here has its defaults resolved.

pub mod common;
pub mod history;
pub mod state;

// ── Re-exports ──────────────────────────────────────────────────────

pub use common::{DataSource, VideoFeed, VideoStatus};
pub use history::{History, HistoryEntry};
pub use state::{
    DashboardState, DetectionView, IoView, RecipeView, StatisticsView, SystemView,
};
