// ── Renderer contract ──

use crate::model::DashboardState;

/// Consumer of merged dashboard state.
///
/// Driven by the controller's render task: called once with the state at
/// start-up, then after every change. Bursts of changes are coalesced, so
/// a slow renderer only ever sees the latest state.
pub trait Renderer: Send + 'static {
    fn render(&mut self, state: &DashboardState);

    /// Called once when the controller shuts down.
    fn finish(&mut self) {}
}

impl<F> Renderer for F
where
    F: FnMut(&DashboardState) + Send + 'static,
{
    fn render(&mut self, state: &DashboardState) {
        self(state);
    }
}

/// Renderer that discards every state, for headless use.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullRenderer;

impl Renderer for NullRenderer {
    fn render(&mut self, _state: &DashboardState) {}
}
