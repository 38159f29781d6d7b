// ── Reactive dashboard store ──
//
// Single-writer aggregate state with push-based change notification.

mod apply;
mod dashboard_store;

pub use dashboard_store::DashboardStore;
