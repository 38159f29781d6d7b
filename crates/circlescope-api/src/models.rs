// Wire models for the dashboard server's REST and stream payloads.
//
// Every field is optional on the client side: the server omits or nulls
// fields when a service isn't running, and the dashboard must keep
// rendering with documented defaults instead of failing the whole payload.
// Scalar fields of the pushed shapes are lenient: a value of the wrong type
// decodes like a missing field.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

// ── Measurement status ───────────────────────────────────────────────

/// Pass/fail verdict for one circle or one inspection.
///
/// Decoding is case-insensitive; anything unrecognised (including the
/// server's `PARTIAL` and non-string values) normalises to
/// [`MeasureStatus::None`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "Value")]
pub enum MeasureStatus {
    #[serde(rename = "OK")]
    Ok,
    #[serde(rename = "NG")]
    Ng,
    #[default]
    #[serde(rename = "NONE")]
    None,
}

impl MeasureStatus {
    /// Normalise an optional raw status string.
    pub fn normalize(raw: Option<&str>) -> Self {
        match raw.map(|s| s.trim().to_ascii_uppercase()).as_deref() {
            Some("OK") => Self::Ok,
            Some("NG") => Self::Ng,
            _ => Self::None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ok => "OK",
            Self::Ng => "NG",
            Self::None => "NONE",
        }
    }
}

impl From<Value> for MeasureStatus {
    fn from(raw: Value) -> Self {
        Self::normalize(raw.as_str())
    }
}

impl std::fmt::Display for MeasureStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Detection ────────────────────────────────────────────────────────

/// One measured circle.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CircleResult {
    #[serde(deserialize_with = "lenient")]
    pub center_x: Option<f64>,
    #[serde(deserialize_with = "lenient")]
    pub center_y: Option<f64>,
    #[serde(deserialize_with = "lenient")]
    pub diameter_mm: Option<f64>,
    #[serde(deserialize_with = "lenient")]
    pub diameter_px: Option<f64>,
    #[serde(deserialize_with = "lenient")]
    pub circularity: Option<f64>,
    pub status: Option<MeasureStatus>,
}

/// Object form of a `detection_result` payload.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionResult {
    #[serde(deserialize_with = "lenient")]
    pub timestamp: Option<String>,
    #[serde(deserialize_with = "null_as_empty")]
    pub circles: Vec<CircleResult>,
    pub overall_status: Option<MeasureStatus>,
    #[serde(deserialize_with = "lenient")]
    pub detection_time_ms: Option<f64>,
}

/// A `detection_result` payload in either shape the server has used:
/// a bare list of circles, or an object wrapping a `circles` field.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum DetectionPayload {
    Bare(Vec<CircleResult>),
    Wrapped(DetectionResult),
}

impl DetectionPayload {
    /// Normalise both shapes into the object form.
    pub fn into_result(self) -> DetectionResult {
        match self {
            Self::Bare(circles) => DetectionResult {
                circles,
                ..DetectionResult::default()
            },
            Self::Wrapped(result) => result,
        }
    }
}

// ── Statistics ───────────────────────────────────────────────────────

/// `GET /api/statistics` and the `statistics_update` event.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Statistics {
    #[serde(deserialize_with = "lenient_count")]
    pub total_inspections: Option<u64>,
    #[serde(deserialize_with = "lenient_count")]
    pub ok_count: Option<u64>,
    #[serde(deserialize_with = "lenient_count")]
    pub ng_count: Option<u64>,
    #[serde(deserialize_with = "lenient")]
    pub ok_rate: Option<f64>,
    #[serde(deserialize_with = "lenient")]
    pub throughput_per_minute: Option<f64>,
    #[serde(deserialize_with = "lenient")]
    pub runtime_seconds: Option<f64>,
    pub last_result: Option<MeasureStatus>,
    #[serde(deserialize_with = "lenient")]
    pub session_start: Option<String>,
}

// ── IO ───────────────────────────────────────────────────────────────

/// `GET /api/io/status` and the `io_status` event.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IoStatus {
    #[serde(deserialize_with = "lenient")]
    pub connected: Option<bool>,
    #[serde(deserialize_with = "lenient")]
    pub mode: Option<String>,
    #[serde(deserialize_with = "lenient")]
    pub trigger_state: Option<bool>,
    #[serde(deserialize_with = "lenient")]
    pub system_enable: Option<bool>,
    #[serde(deserialize_with = "lenient")]
    pub system_ready: Option<bool>,
    #[serde(deserialize_with = "lenient")]
    pub result_ok: Option<bool>,
    #[serde(deserialize_with = "lenient")]
    pub result_ng: Option<bool>,
    #[serde(deserialize_with = "lenient")]
    pub busy: Option<bool>,
    #[serde(deserialize_with = "lenient")]
    pub error: Option<bool>,
    #[serde(deserialize_with = "lenient")]
    pub recipe_index: Option<u32>,
}

// ── System ───────────────────────────────────────────────────────────

/// `GET /api/status` and the `system_status` event.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SystemStatus {
    #[serde(deserialize_with = "lenient")]
    pub camera_connected: Option<bool>,
    #[serde(deserialize_with = "lenient")]
    pub is_running: Option<bool>,
    #[serde(deserialize_with = "lenient")]
    pub current_recipe: Option<String>,
    #[serde(deserialize_with = "lenient")]
    pub fps: Option<f64>,
    #[serde(deserialize_with = "lenient")]
    pub web_clients: Option<u32>,
    #[serde(deserialize_with = "lenient")]
    pub timestamp: Option<String>,
}

// ── Recipes ──────────────────────────────────────────────────────────

/// `GET /api/recipes`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecipeList {
    #[serde(deserialize_with = "null_as_empty")]
    pub recipes: Vec<String>,
    pub current: Option<String>,
    pub count: Option<usize>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    pub pixel_to_mm: Option<f64>,
    pub min_diameter_mm: Option<f64>,
    pub max_diameter_mm: Option<f64>,
    pub min_circularity: Option<f64>,
    pub blur_kernel: Option<u32>,
    pub binary_threshold: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToleranceConfig {
    #[serde(deserialize_with = "lenient")]
    pub enabled: Option<bool>,
    #[serde(deserialize_with = "lenient")]
    pub nominal_mm: Option<f64>,
    #[serde(deserialize_with = "lenient")]
    pub tolerance_mm: Option<f64>,
}

/// `GET /api/recipes/{name}` and the `recipe_changed` event.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecipeDetail {
    pub name: Option<String>,
    pub description: Option<String>,
    pub detection_config: Option<DetectionConfig>,
    pub tolerance_config: Option<ToleranceConfig>,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
}

// ── Calibration ──────────────────────────────────────────────────────

/// `GET /api/calibration`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Calibration {
    pub is_calibrated: Option<bool>,
    pub pixel_to_mm: Option<f64>,
    pub reference_size_mm: Option<f64>,
    pub reference_size_px: Option<f64>,
    pub calibrated_at: Option<String>,
}

// ── History ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryItem {
    pub timestamp: Option<String>,
    #[serde(deserialize_with = "null_as_empty")]
    pub circles: Vec<CircleResult>,
    pub overall_status: Option<MeasureStatus>,
}

/// `GET /api/history?limit=&offset=`, newest item first.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryPage {
    #[serde(deserialize_with = "null_as_empty")]
    pub items: Vec<HistoryItem>,
    pub total: Option<u64>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

// ── Helpers ──────────────────────────────────────────────────────────

/// `null` and a missing field both decode as an empty list.
fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

/// A value of the wrong type decodes as `None` instead of failing.
fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Value::deserialize(deserializer)?;
    Ok(serde_json::from_value::<Option<T>>(value).ok().flatten())
}

/// Counter field: whole numbers, with non-negative floats truncated.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn lenient_count<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    let Value::Number(n) = Value::deserialize(deserializer)? else {
        return Ok(None);
    };
    Ok(n.as_u64().or_else(|| {
        n.as_f64()
            .filter(|v| v.is_finite() && *v >= 0.0)
            .map(|v| v.floor() as u64)
    }))
}

// ── Timestamps ───────────────────────────────────────────────────────

/// Parse a server timestamp.
///
/// Accepts RFC 3339 and the naive ISO-8601 form the server emits for
/// local times (read as UTC).
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}
