use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;

use crate::error::{ErrorCode, MonitorError};

/// Sink for metric updates that failed and were skipped.
///
/// Each report emits a `debug` event and bumps a per-code counter. Nothing
/// here ever reaches the request being measured.
#[derive(Default)]
pub struct Diagnostics {
    dropped: DashMap<ErrorCode, AtomicU64>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn report(&self, metric: &str, err: &MonitorError) {
        let code = err.code();
        tracing::debug!(metric = %metric, code = code.as_str(), error = %err, "metric update dropped");
        self.dropped
            .entry(code)
            .or_default()
            .fetch_add(1, Ordering::Relaxed);
    }

    /// Dropped updates with the given code.
    pub fn dropped(&self, code: ErrorCode) -> u64 {
        self.dropped
            .get(&code)
            .map(|c| c.load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    pub fn dropped_total(&self) -> u64 {
        self.dropped.iter().map(|c| c.value().load(Ordering::Relaxed)).sum()
    }
}
