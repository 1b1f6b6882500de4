//! Metric definitions, storage, registry, and text exposition.

pub mod metric;
pub mod registry;
pub mod render;

pub use metric::{HistogramSample, Metric, MetricDef, MetricKind, MetricSnapshot, SampleValue};
pub use registry::MetricRegistry;
