// ── Aggregate dashboard state ──
//
// One view per snapshot kind. Every view is replaced wholesale by the
// latest snapshot from either channel; there is no cross-view
// transactionality. Absent wire fields take the documented defaults here,
// so renderers never have to interpret `None` booleans or counters.

use chrono::{DateTime, Utc};
use circlescope_api::ConnectionState;
use circlescope_api::models::{
    CircleResult, DetectionResult, IoStatus, MeasureStatus, RecipeDetail, RecipeList, Statistics,
    SystemStatus,
};
use serde::Serialize;

use super::common::VideoFeed;
use super::history::History;
use crate::format;

// ── Statistics ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StatisticsView {
    pub total_inspections: u64,
    pub ok_count: u64,
    pub ng_count: u64,
    /// Percentage, 0-100.
    pub ok_rate: f64,
    pub throughput_per_minute: f64,
    pub runtime_seconds: u64,
    pub last_result: Option<MeasureStatus>,
}

impl From<&Statistics> for StatisticsView {
    fn from(s: &Statistics) -> Self {
        Self {
            total_inspections: s.total_inspections.unwrap_or(0),
            ok_count: s.ok_count.unwrap_or(0),
            ng_count: s.ng_count.unwrap_or(0),
            ok_rate: format::ok_rate(s.ok_count, s.total_inspections, s.ok_rate),
            throughput_per_minute: s
                .throughput_per_minute
                .filter(|t| t.is_finite())
                .unwrap_or(0.0),
            runtime_seconds: format::whole_seconds(s.runtime_seconds),
            last_result: s.last_result,
        }
    }
}

impl StatisticsView {
    pub fn ok_rate_display(&self) -> String {
        format::percent(self.ok_rate)
    }

    pub fn throughput_display(&self) -> String {
        format!("{}/min", format::one_decimal(self.throughput_per_minute))
    }

    pub fn runtime_display(&self) -> String {
        format::runtime(self.runtime_seconds)
    }
}

// ── IO ───────────────────────────────────────────────────────────────

/// IO indicators; each LED is a pure function of one boolean.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IoView {
    pub connected: bool,
    pub mode: Option<String>,
    pub trigger: bool,
    pub system_ready: bool,
    pub result_ok: bool,
    pub result_ng: bool,
    pub system_enable: bool,
    pub busy: bool,
    pub error: bool,
    pub recipe_index: u32,
}

impl From<&IoStatus> for IoView {
    fn from(io: &IoStatus) -> Self {
        Self {
            connected: io.connected.unwrap_or(false),
            mode: io.mode.clone(),
            trigger: io.trigger_state.unwrap_or(false),
            system_ready: io.system_ready.unwrap_or(false),
            result_ok: io.result_ok.unwrap_or(false),
            result_ng: io.result_ng.unwrap_or(false),
            system_enable: io.system_enable.unwrap_or(false),
            busy: io.busy.unwrap_or(false),
            error: io.error.unwrap_or(false),
            recipe_index: io.recipe_index.unwrap_or(0),
        }
    }
}

// ── System ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SystemView {
    pub camera_connected: bool,
    pub is_running: bool,
    pub current_recipe: Option<String>,
    pub fps: f64,
    pub web_clients: u32,
}

impl From<&SystemStatus> for SystemView {
    fn from(s: &SystemStatus) -> Self {
        Self {
            camera_connected: s.camera_connected.unwrap_or(false),
            is_running: s.is_running.unwrap_or(false),
            current_recipe: s.current_recipe.clone(),
            fps: s.fps.filter(|f| f.is_finite()).unwrap_or(0.0),
            web_clients: s.web_clients.unwrap_or(0),
        }
    }
}

impl SystemView {
    pub fn fps_display(&self) -> String {
        format::one_decimal(self.fps)
    }

    pub fn camera_display(&self) -> &'static str {
        if self.camera_connected { "Connected" } else { "Disconnected" }
    }
}

// ── Recipe ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RecipeView {
    pub name: Option<String>,
    pub description: Option<String>,
    pub nominal_mm: Option<f64>,
    pub tolerance_mm: Option<f64>,
}

impl From<&RecipeDetail> for RecipeView {
    fn from(r: &RecipeDetail) -> Self {
        let tolerance = r.tolerance_config.as_ref();
        Self {
            name: r.name.clone(),
            description: r.description.clone(),
            nominal_mm: tolerance.and_then(|t| t.nominal_mm),
            tolerance_mm: tolerance.and_then(|t| t.tolerance_mm),
        }
    }
}

impl RecipeView {
    pub fn name_display(&self) -> String {
        format::text(self.name.as_deref())
    }

    pub fn nominal_display(&self) -> String {
        format::millimetres(self.nominal_mm)
    }

    pub fn tolerance_display(&self) -> String {
        match self.tolerance_mm {
            Some(t) => format!("±{t:.3}"),
            None => format::PLACEHOLDER.to_owned(),
        }
    }
}

// ── Latest detection ─────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DetectionView {
    pub circles: Vec<CircleResult>,
    pub overall_status: MeasureStatus,
    pub detection_time_ms: Option<f64>,
    pub received_at: Option<DateTime<Utc>>,
}

impl DetectionView {
    pub fn new(result: DetectionResult, received_at: DateTime<Utc>) -> Self {
        let overall_status = result
            .overall_status
            .or_else(|| result.circles.first().and_then(|c| c.status))
            .unwrap_or_default();
        Self {
            circles: result.circles,
            overall_status,
            detection_time_ms: result.detection_time_ms,
            received_at: Some(received_at),
        }
    }

    /// `14.2 ms`, or the placeholder.
    pub fn detection_time_display(&self) -> String {
        self.detection_time_ms
            .filter(|t| t.is_finite())
            .map_or_else(|| format::PLACEHOLDER.to_owned(), |t| format!("{t:.1} ms"))
    }

    /// "No circles detected" is a valid state, not an error.
    pub fn is_empty(&self) -> bool {
        self.circles.is_empty()
    }
}

// ── Aggregate ────────────────────────────────────────────────────────

/// Everything the renderer needs. `None` means "not received yet".
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardState {
    pub connection: ConnectionState,
    pub statistics: Option<StatisticsView>,
    pub io: Option<IoView>,
    pub system: Option<SystemView>,
    pub recipe: Option<RecipeView>,
    pub recipes: Vec<String>,
    pub detection: Option<DetectionView>,
    pub history: History,
    pub video: VideoFeed,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Default for DashboardState {
    fn default() -> Self {
        Self {
            connection: ConnectionState::Disconnected,
            statistics: None,
            io: None,
            system: None,
            recipe: None,
            recipes: Vec::new(),
            detection: None,
            history: History::new(),
            video: VideoFeed::default(),
            updated_at: None,
        }
    }
}

impl DashboardState {
    pub fn is_connected(&self) -> bool {
        self.connection == ConnectionState::Connected
    }

    pub(crate) fn apply_recipe_list(&mut self, list: &RecipeList) {
        self.recipes.clone_from(&list.recipes);
    }
}
