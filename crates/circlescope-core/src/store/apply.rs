// ── Push and pull application logic ──
//
// Pushed events and pulled snapshots of the same shape go through the
// same typed appliers, so "last write wins" holds per view regardless of
// which channel delivered the data.

use chrono::{DateTime, Utc};
use circlescope_api::models::{
    DetectionPayload, DetectionResult, HistoryPage, IoStatus, RecipeDetail, RecipeList,
    Statistics, SystemStatus,
};
use circlescope_api::{ConnectionState, EventKind, ResourceKind};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, warn};

use super::DashboardStore;
use crate::model::{
    DetectionView, HistoryEntry, IoView, RecipeView, StatisticsView, SystemView, VideoStatus,
};

/// Decode a payload, logging and discarding it on failure.
pub(crate) fn decode<T: DeserializeOwned>(what: &str, value: Value) -> Option<T> {
    match serde_json::from_value(value) {
        Ok(decoded) => Some(decoded),
        Err(e) => {
            warn!(payload = what, error = %e, "discarding undecodable payload");
            None
        }
    }
}

impl DashboardStore {
    // ── Untyped entry points ─────────────────────────────────────────

    /// Apply one stream event's payload.
    pub fn apply_event(&self, kind: EventKind, data: Value) {
        match kind {
            EventKind::DetectionResult => {
                let result = if data.is_null() {
                    Some(DetectionResult::default())
                } else {
                    decode::<DetectionPayload>("detection_result", data)
                        .map(DetectionPayload::into_result)
                };
                if let Some(result) = result {
                    self.apply_detection(result, Utc::now());
                }
            }
            EventKind::StatisticsUpdate => {
                if let Some(stats) = decode::<Statistics>("statistics_update", data) {
                    self.apply_statistics(&stats);
                }
            }
            EventKind::IoStatus => {
                if let Some(io) = decode::<IoStatus>("io_status", data) {
                    self.apply_io(&io);
                }
            }
            EventKind::SystemStatus => {
                if let Some(status) = decode::<SystemStatus>("system_status", data) {
                    self.apply_system_status(&status);
                }
            }
            EventKind::RecipeChanged => {
                if let Some(recipe) = decode::<RecipeDetail>("recipe_changed", data) {
                    self.apply_recipe(&recipe);
                }
            }
            EventKind::Ping => {}
        }
    }

    /// Apply one pulled snapshot.
    ///
    /// History pages need the watermark taken before their fetch and go
    /// through [`apply_history_snapshot`](Self::apply_history_snapshot);
    /// calibration is not part of the dashboard state.
    pub fn apply_snapshot(&self, kind: &ResourceKind, data: Value) {
        match kind {
            ResourceKind::Status => {
                if let Some(status) = decode::<SystemStatus>("status", data) {
                    self.apply_system_status(&status);
                }
            }
            ResourceKind::Statistics => {
                if let Some(stats) = decode::<Statistics>("statistics", data) {
                    self.apply_statistics(&stats);
                }
            }
            ResourceKind::Recipes => {
                if let Some(list) = decode::<RecipeList>("recipes", data) {
                    self.apply_recipe_list(&list);
                }
            }
            ResourceKind::Recipe(_) => {
                if let Some(recipe) = decode::<RecipeDetail>("recipe", data) {
                    self.apply_recipe(&recipe);
                }
            }
            ResourceKind::IoStatus => {
                if let Some(io) = decode::<IoStatus>("io", data) {
                    self.apply_io(&io);
                }
            }
            ResourceKind::History { .. } | ResourceKind::Calibration => {
                debug!(%kind, "snapshot not merged into dashboard state");
            }
        }
    }

    // ── Typed appliers ───────────────────────────────────────────────

    /// Record a detection: latest-detection view plus one history row
    /// built from the first circle (an empty list still adds a row).
    pub fn apply_detection(&self, result: DetectionResult, received_at: DateTime<Utc>) {
        let entry = HistoryEntry::from_detection(&result, received_at);
        debug!(
            circles = result.circles.len(),
            diameter = %entry.diameter_display(),
            status = %entry.status,
            "detection result"
        );
        self.update(|state| {
            state.history.push(entry);
            state.detection = Some(DetectionView::new(result, received_at));
        });
    }

    /// Statistics and IO repeat unchanged between inspections; an
    /// identical view does not notify subscribers.
    pub fn apply_statistics(&self, stats: &Statistics) {
        let view = StatisticsView::from(stats);
        self.update_if(|state| replace_if_changed(&mut state.statistics, view));
    }

    pub fn apply_io(&self, io: &IoStatus) {
        let view = IoView::from(io);
        self.update_if(|state| replace_if_changed(&mut state.io, view));
    }

    pub fn apply_system_status(&self, status: &SystemStatus) {
        let view = SystemView::from(status);
        self.update(|state| state.system = Some(view));
    }

    pub fn apply_recipe(&self, recipe: &RecipeDetail) {
        let view = RecipeView::from(recipe);
        self.update(|state| state.recipe = Some(view));
    }

    pub fn apply_recipe_list(&self, list: &RecipeList) {
        self.update(|state| state.apply_recipe_list(list));
    }

    /// Replace history with a pulled page; see [`History::reconcile`].
    ///
    /// [`History::reconcile`]: crate::model::History::reconcile
    pub fn apply_history_snapshot(&self, page: &HistoryPage, watermark: u64) {
        let now = Utc::now();
        let entries: Vec<HistoryEntry> = page
            .items
            .iter()
            .map(|item| HistoryEntry::from_history_item(item, now))
            .collect();
        self.update(|state| state.history.reconcile(entries, watermark));
    }

    // ── Connectivity and video ───────────────────────────────────────

    pub fn set_connection(&self, connection: ConnectionState) {
        self.state.send_if_modified(|state| {
            if state.connection == connection {
                return false;
            }
            state.connection = connection;
            state.updated_at = Some(Utc::now());
            true
        });
    }

    pub fn set_video_status(&self, status: VideoStatus) {
        self.state.send_if_modified(|state| {
            if state.video.status == status {
                return false;
            }
            state.video.status = status;
            true
        });
    }
}

fn replace_if_changed<T: PartialEq>(slot: &mut Option<T>, view: T) -> bool {
    if slot.as_ref() == Some(&view) {
        return false;
    }
    *slot = Some(view);
    true
}
