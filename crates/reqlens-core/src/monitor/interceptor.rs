//! Per-request measurement pipeline.
//!
//! Framework bindings call [`Monitor::begin`] before handing the request on
//! and [`Monitor::record`] once the response is ready. Every metric update is
//! best-effort: failures go to [`Diagnostics`](super::Diagnostics) and the
//! remaining updates still run.

use std::time::{Duration, Instant};

use crate::error::{MonitorError, Result};
use crate::metrics::Metric;

use super::catalog::{
    METRIC_REQUEST_BODY, METRIC_REQUEST_DURATION, METRIC_REQUEST_TOTAL, METRIC_REQUEST_UV_TOTAL,
    METRIC_RESPONSE_BODY, METRIC_SLOW_REQUEST, METRIC_URI_REQUEST_TOTAL,
};
use super::Monitor;

/// What the binding knows about a finished request.
#[derive(Debug, Clone)]
pub struct RequestSample {
    /// Route template (e.g. `/product/:id`); empty when no route matched.
    pub route: String,
    pub method: String,
    pub status: u16,
    pub elapsed: Duration,
    /// Resolved client address.
    pub client_id: String,
    /// Request `Content-Length`; negative when unknown.
    pub request_content_length: i64,
    /// Bytes in the response body.
    pub response_size: i64,
}

/// Start of a measured request, returned by [`Monitor::begin`].
#[derive(Debug, Clone, Copy)]
pub struct RequestTimer {
    start: Instant,
}

impl RequestTimer {
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}

impl Monitor {
    /// Exclusion check plus start timestamp. `None` means do not measure.
    pub fn begin(&self, path: &str) -> Option<RequestTimer> {
        self.should_measure(path).then(RequestTimer::start)
    }

    /// Apply every metric update for one finished request.
    pub fn record(&self, sample: &RequestSample) {
        let status = sample.status.to_string();
        let route_labels = [sample.route.as_str(), sample.method.as_str(), status.as_str()];

        self.update(METRIC_REQUEST_TOTAL, &[], |m, v| m.inc(v));

        // The filter is only touched once the counter exists, so a client
        // seen before `init` is still counted afterwards.
        self.update(METRIC_REQUEST_UV_TOTAL, &[], |m, v| {
            if self.visitors().check_and_insert(&sample.client_id) {
                m.inc(v)
            } else {
                Ok(())
            }
        });

        self.update(METRIC_URI_REQUEST_TOTAL, &route_labels, |m, v| m.inc(v));

        if sample.request_content_length >= 0 {
            let len = sample.request_content_length as f64;
            self.update(METRIC_REQUEST_BODY, &[], |m, v| m.add(v, len));
        }

        if is_slow(sample.elapsed, self.cfg().slow_threshold_secs) {
            self.update(METRIC_SLOW_REQUEST, &route_labels, |m, v| m.inc(v));
        }

        let secs = sample.elapsed.as_secs_f64();
        self.update(METRIC_REQUEST_DURATION, &[sample.route.as_str()], |m, v| m.observe(v, secs));

        if sample.response_size > 0 {
            let size = sample.response_size as f64;
            self.update(METRIC_RESPONSE_BODY, &[], |m, v| m.add(v, size));
        }
    }

    fn update<F>(&self, name: &str, base: &[&str], op: F)
    where
        F: FnOnce(&Metric, &[String]) -> Result<()>,
    {
        let Some(metric) = self.metric(name) else {
            self.diagnostics()
                .report(name, &MonitorError::NotFound(name.to_string()));
            return;
        };
        let values = self.label_resolver().values(base);
        if let Err(e) = op(&metric, &values) {
            self.diagnostics().report(name, &e);
        }
    }
}

/// Whole elapsed seconds (truncated) strictly above the threshold.
pub fn is_slow(elapsed: Duration, threshold_secs: u64) -> bool {
    elapsed.as_secs() > threshold_secs
}
