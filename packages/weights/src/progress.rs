//! Where the overlay reports how far it has got.
//!
//! [`ExecutionContext::map_units`](crate::context::ExecutionContext::map_units)
//! announces the number of targets, then ticks once per finished target
//! from whichever worker finished it.

use std::sync::Arc;

/// Receives overlay progress. Ticks arrive concurrently from every worker.
pub trait ProgressSink: Send + Sync {
    /// `units` targets are about to be processed.
    fn start(&self, units: u64);

    /// One more unit is done.
    fn tick(&self);

    /// Replaces the label shown next to the counter.
    fn label(&self, text: &str);

    fn finish(&self, summary: &str);
}

struct Silent;

impl ProgressSink for Silent {
    fn start(&self, _units: u64) {}
    fn tick(&self) {}
    fn label(&self, _text: &str) {}
    fn finish(&self, _summary: &str) {}
}

/// A sink that drops every update, for tests and library callers.
#[must_use]
pub fn silent() -> Arc<dyn ProgressSink> {
    Arc::new(Silent)
}
