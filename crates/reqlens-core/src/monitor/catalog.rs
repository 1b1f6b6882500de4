//! Built-in metric catalog. Names and label schemas are stable.

use crate::metrics::{MetricDef, MetricKind};

pub const METRIC_REQUEST_TOTAL: &str = "http_request_total";
pub const METRIC_REQUEST_UV_TOTAL: &str = "http_request_uv_total";
pub const METRIC_URI_REQUEST_TOTAL: &str = "http_uri_request_total";
pub const METRIC_REQUEST_BODY: &str = "http_request_body_total";
pub const METRIC_RESPONSE_BODY: &str = "http_response_body_total";
pub const METRIC_REQUEST_DURATION: &str = "http_request_duration";
pub const METRIC_SLOW_REQUEST: &str = "http_slow_request_total";

pub const LABEL_URI: &str = "uri";
pub const LABEL_METHOD: &str = "method";
pub const LABEL_CODE: &str = "code";

/// Label names owned by the built-in schemas; metadata may not reuse them.
pub const RESERVED_LABELS: [&str; 3] = [LABEL_URI, LABEL_METHOD, LABEL_CODE];

const ROUTE_LABELS: &[&str] = &[LABEL_URI, LABEL_METHOD, LABEL_CODE];
const URI_LABEL: &[&str] = &[LABEL_URI];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuiltinMetric {
    RequestTotal,
    RequestUvTotal,
    UriRequestTotal,
    RequestBody,
    ResponseBody,
    RequestDuration,
    SlowRequest,
}

impl BuiltinMetric {
    pub const ALL: [BuiltinMetric; 7] = [
        BuiltinMetric::RequestTotal,
        BuiltinMetric::RequestUvTotal,
        BuiltinMetric::UriRequestTotal,
        BuiltinMetric::RequestBody,
        BuiltinMetric::ResponseBody,
        BuiltinMetric::RequestDuration,
        BuiltinMetric::SlowRequest,
    ];

    pub fn name(self) -> &'static str {
        match self {
            BuiltinMetric::RequestTotal => METRIC_REQUEST_TOTAL,
            BuiltinMetric::RequestUvTotal => METRIC_REQUEST_UV_TOTAL,
            BuiltinMetric::UriRequestTotal => METRIC_URI_REQUEST_TOTAL,
            BuiltinMetric::RequestBody => METRIC_REQUEST_BODY,
            BuiltinMetric::ResponseBody => METRIC_RESPONSE_BODY,
            BuiltinMetric::RequestDuration => METRIC_REQUEST_DURATION,
            BuiltinMetric::SlowRequest => METRIC_SLOW_REQUEST,
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|m| m.name() == name)
    }

    pub fn kind(self) -> MetricKind {
        match self {
            BuiltinMetric::RequestDuration => MetricKind::Histogram,
            _ => MetricKind::Counter,
        }
    }

    /// Per-request labels, before metadata labels are appended.
    pub fn base_labels(self) -> &'static [&'static str] {
        match self {
            BuiltinMetric::RequestDuration => URI_LABEL,
            BuiltinMetric::UriRequestTotal | BuiltinMetric::SlowRequest => ROUTE_LABELS,
            _ => &[],
        }
    }

    pub fn help(self, slow_threshold_secs: u64) -> String {
        match self {
            BuiltinMetric::RequestTotal => "all the server received request num.".into(),
            BuiltinMetric::RequestUvTotal => "all the server received ip num.".into(),
            BuiltinMetric::UriRequestTotal => {
                "all the server received request num with every uri.".into()
            }
            BuiltinMetric::RequestBody => "the server received request body size, unit byte".into(),
            BuiltinMetric::ResponseBody => "the server send response body size, unit byte".into(),
            BuiltinMetric::RequestDuration => "the time server took to handle the request.".into(),
            BuiltinMetric::SlowRequest => format!(
                "the server handled slow requests counter, t={slow_threshold_secs}."
            ),
        }
    }

    /// Definition with the full label schema and, for the histogram, buckets.
    pub(crate) fn definition(self, labels: Vec<String>, slow_threshold_secs: u64, buckets: &[f64]) -> MetricDef {
        let help = self.help(slow_threshold_secs);
        let def = match self.kind() {
            MetricKind::Histogram => MetricDef::histogram(self.name(), help, buckets.to_vec()),
            MetricKind::Counter => MetricDef::counter(self.name(), help),
        };
        def.with_labels(labels)
    }
}
