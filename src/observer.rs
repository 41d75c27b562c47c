//! Progress reporting hooks for batch runs.
use tracing::{debug, info};

/// Receives human-readable log lines, short status strings and completion fractions
/// in `[0, 1]`. All methods default to doing nothing.
pub trait ProgressObserver {
    fn on_log(&self, _message: &str) {}

    fn on_status(&self, _status: &str) {}

    fn on_progress(&self, _fraction: f32) {}
}

/// Observer that ignores everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl ProgressObserver for NoopObserver {}

/// Observer that forwards status and progress to `tracing`.
///
/// Batch drivers already emit their log lines through `tracing`, so `on_log` is not
/// repeated here.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl ProgressObserver for TracingObserver {
    fn on_status(&self, status: &str) {
        info!("{}", status);
    }

    fn on_progress(&self, fraction: f32) {
        debug!("Progress: {:.1}%", fraction * 100.0);
    }
}
