// ── Display formatting ──
//
// Pure helpers shared by every renderer. Missing values render as
// `PLACEHOLDER`, never as NaN or an empty string.

/// Shown wherever a value is absent.
pub const PLACEHOLDER: &str = "--";

/// Zero-padded `HH:MM:SS`. Hours are not wrapped at 24.
pub fn runtime(seconds: u64) -> String {
    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;
    let secs = seconds % 60;
    format!("{hours:02}:{minutes:02}:{secs:02}")
}

/// Whole seconds from a reported runtime; negative or non-finite is zero.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn whole_seconds(raw: Option<f64>) -> u64 {
    match raw {
        Some(v) if v.is_finite() && v > 0.0 => v.floor() as u64,
        _ => 0,
    }
}

/// OK percentage: computed from the counters when they are usable,
/// else the server's reported rate, else zero.
#[allow(clippy::cast_precision_loss)]
pub fn ok_rate(ok: Option<u64>, total: Option<u64>, reported: Option<f64>) -> f64 {
    match (ok, total) {
        (Some(ok), Some(total)) if total > 0 => ok as f64 / total as f64 * 100.0,
        _ => reported.filter(|r| r.is_finite()).unwrap_or(0.0),
    }
}

/// One decimal place.
pub fn one_decimal(value: f64) -> String {
    format!("{value:.1}")
}

/// Percentage with one decimal, e.g. `95.0%`.
pub fn percent(value: f64) -> String {
    format!("{value:.1}%")
}

/// Millimetres with three decimals, or the placeholder.
pub fn millimetres(value: Option<f64>) -> String {
    value.map_or_else(|| PLACEHOLDER.to_owned(), |v| format!("{v:.3}"))
}

/// Placeholder for missing text.
pub fn text(value: Option<&str>) -> String {
    value
        .filter(|s| !s.is_empty())
        .unwrap_or(PLACEHOLDER)
        .to_owned()
}
