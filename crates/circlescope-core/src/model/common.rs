// ── Common types shared across the dashboard model ──

use serde::Serialize;

/// Which channel delivered a piece of data (internal bookkeeping).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DataSource {
    /// Live stream event.
    #[default]
    Push,
    /// REST snapshot.
    Pull,
}

/// Video overlay state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, strum::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum VideoStatus {
    /// Bound but no frame loaded yet.
    #[default]
    Pending,
    Live,
    /// The media source reported an error; show the overlay.
    Unavailable,
}

/// The MJPEG feed bound to the dashboard.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct VideoFeed {
    pub url: String,
    pub status: VideoStatus,
}

impl VideoFeed {
    /// Whether the "video unavailable" overlay should be shown.
    pub fn overlay_visible(&self) -> bool {
        self.status != VideoStatus::Live
    }
}
