// ── Recent-results history ──
//
// Bounded, newest-first. Order is processing order: a late-arriving
// detection is still prepended regardless of its timestamp.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use circlescope_api::models::{DetectionResult, HistoryItem, MeasureStatus, parse_timestamp};
use serde::Serialize;

use super::common::DataSource;
use crate::config::HISTORY_CAPACITY;
use crate::format;

/// One row of the recent-results table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryEntry {
    /// Server timestamp when one was supplied, otherwise the time the
    /// event was processed.
    pub timestamp: DateTime<Utc>,
    /// Diameter of the first circle, if any circle was detected.
    pub diameter_mm: Option<f64>,
    pub status: MeasureStatus,
    #[serde(skip)]
    pub(crate) source: DataSource,
    /// Push sequence number; zero for pulled entries.
    #[serde(skip)]
    pub(crate) seq: u64,
    #[serde(skip)]
    pub(crate) server_time: bool,
}

impl HistoryEntry {
    /// Entry for a pushed detection, built from its first circle.
    pub fn from_detection(result: &DetectionResult, received_at: DateTime<Utc>) -> Self {
        let server_ts = result.timestamp.as_deref().and_then(parse_timestamp);
        let primary = result.circles.first();

        Self {
            timestamp: server_ts.unwrap_or(received_at),
            diameter_mm: primary.and_then(|c| c.diameter_mm),
            status: primary.and_then(|c| c.status).unwrap_or_default(),
            source: DataSource::Push,
            seq: 0,
            server_time: server_ts.is_some(),
        }
    }

    /// Entry for one item of a pulled history page.
    ///
    /// Uses the inspection's overall status, falling back to the first
    /// circle's. Items without a readable timestamp get `fallback`.
    pub fn from_history_item(item: &HistoryItem, fallback: DateTime<Utc>) -> Self {
        let server_ts = item.timestamp.as_deref().and_then(parse_timestamp);
        let primary = item.circles.first();

        Self {
            timestamp: server_ts.unwrap_or(fallback),
            diameter_mm: primary.and_then(|c| c.diameter_mm),
            status: item
                .overall_status
                .or_else(|| primary.and_then(|c| c.status))
                .unwrap_or_default(),
            source: DataSource::Pull,
            seq: 0,
            server_time: server_ts.is_some(),
        }
    }

    /// Diameter with three decimals, or `--`.
    pub fn diameter_display(&self) -> String {
        format::millimetres(self.diameter_mm)
    }

    /// Whether this entry came from the live stream.
    pub fn is_live(&self) -> bool {
        self.source == DataSource::Push
    }
}

/// Newest-first sequence capped at [`HISTORY_CAPACITY`].
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct History {
    entries: VecDeque<HistoryEntry>,
    #[serde(skip)]
    pushes: u64,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    /// Prepend a live entry, evicting the oldest past capacity.
    pub fn push(&mut self, mut entry: HistoryEntry) {
        self.pushes += 1;
        entry.seq = self.pushes;
        self.entries.push_front(entry);
        self.entries.truncate(HISTORY_CAPACITY);
    }

    /// Watermark for [`reconcile`](Self::reconcile): pushes so far.
    pub fn watermark(&self) -> u64 {
        self.pushes
    }

    /// Replace the contents with a pulled snapshot (newest first).
    ///
    /// Live entries pushed after `watermark` are kept in front, except
    /// those whose server timestamp is not newer than the snapshot's
    /// newest item (the snapshot already contains them). Everything
    /// pushed before the watermark is covered by the snapshot.
    pub fn reconcile(&mut self, snapshot: Vec<HistoryEntry>, watermark: u64) {
        let newest_pulled = snapshot
            .iter()
            .filter(|e| e.server_time)
            .map(|e| e.timestamp)
            .max();

        let mut merged: VecDeque<HistoryEntry> = self
            .entries
            .drain(..)
            .filter(|e| e.is_live() && e.seq > watermark)
            .filter(|e| match newest_pulled {
                Some(newest) if e.server_time => e.timestamp > newest,
                _ => true,
            })
            .collect();

        merged.extend(snapshot);
        merged.truncate(HISTORY_CAPACITY);
        self.entries = merged;
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Most recent entry.
    pub fn head(&self) -> Option<&HistoryEntry> {
        self.entries.front()
    }

    pub fn iter(&self) -> impl Iterator<Item = &HistoryEntry> {
        self.entries.iter()
    }
}
