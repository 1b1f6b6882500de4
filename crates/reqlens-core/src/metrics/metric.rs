//! Labeled metric storage.
//!
//! A [`Metric`] owns one accumulator per distinct label-value tuple. Tuples
//! are created on first use. Accumulators are atomics inside `DashMap`
//! entries, so updates from many tasks never lose increments and only take a
//! shard write lock when a new tuple is inserted.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;

use crate::error::{MonitorError, Result};

/// Metric type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricKind {
    Counter,
    Histogram,
}

impl MetricKind {
    /// Name used in the exposition `# TYPE` line.
    pub fn as_str(self) -> &'static str {
        match self {
            MetricKind::Counter => "counter",
            MetricKind::Histogram => "histogram",
        }
    }
}

/// Registration-time description of a metric.
#[derive(Debug, Clone)]
pub struct MetricDef {
    pub name: String,
    pub help: String,
    pub kind: MetricKind,
    pub labels: Vec<String>,
    pub buckets: Vec<f64>,
}

impl MetricDef {
    pub fn counter(name: impl Into<String>, help: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            help: help.into(),
            kind: MetricKind::Counter,
            labels: Vec::new(),
            buckets: Vec::new(),
        }
    }

    pub fn histogram(name: impl Into<String>, help: impl Into<String>, buckets: Vec<f64>) -> Self {
        Self {
            name: name.into(),
            help: help.into(),
            kind: MetricKind::Histogram,
            labels: Vec::new(),
            buckets,
        }
    }

    /// Set the ordered label schema.
    pub fn with_labels<I, S>(mut self, labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.labels = labels.into_iter().map(Into::into).collect();
        self
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(MonitorError::invalid_definition(&self.name, "name must not be empty"));
        }

        match self.kind {
            MetricKind::Counter if !self.buckets.is_empty() => {
                return Err(MonitorError::invalid_definition(
                    &self.name,
                    "counter must not define buckets",
                ));
            }
            MetricKind::Histogram => validate_buckets(&self.buckets)
                .map_err(|reason| MonitorError::invalid_definition(&self.name, reason))?,
            MetricKind::Counter => {}
        }

        let mut seen = HashSet::with_capacity(self.labels.len());
        for l in &self.labels {
            if l.is_empty() {
                return Err(MonitorError::invalid_definition(&self.name, "empty label name"));
            }
            if !seen.insert(l.as_str()) {
                return Err(MonitorError::invalid_definition(
                    &self.name,
                    format!("duplicate label: {l}"),
                ));
            }
        }
        Ok(())
    }
}

/// Buckets must be non-empty, finite and strictly increasing.
pub(crate) fn validate_buckets(buckets: &[f64]) -> std::result::Result<(), String> {
    if buckets.is_empty() {
        return Err("histogram requires at least one bucket".into());
    }
    if buckets.iter().any(|b| !b.is_finite()) {
        return Err("buckets must be finite".into());
    }
    if buckets.windows(2).any(|w| w[0] >= w[1]) {
        return Err("buckets must be strictly increasing".into());
    }
    Ok(())
}

/// `f64` accumulator stored as bits in an `AtomicU64`.
#[derive(Default)]
struct AtomicF64(AtomicU64);

impl AtomicF64 {
    fn add(&self, v: f64) {
        // fetch_update only fails when the closure returns None.
        let _ = self
            .0
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |bits| {
                Some((f64::from_bits(bits) + v).to_bits())
            });
    }

    fn get(&self) -> f64 {
        f64::from_bits(self.0.load(Ordering::Relaxed))
    }
}

#[derive(Default)]
struct CounterVec {
    map: DashMap<Vec<String>, AtomicF64>,
}

impl CounterVec {
    fn add(&self, key: Vec<String>, v: f64) {
        if let Some(c) = self.map.get(&key) {
            c.add(v);
            return;
        }
        self.map.entry(key).or_default().add(v);
    }
}

/// Per-slot (non-cumulative) counts; the last slot is the overflow bucket.
struct AtomicHistogram {
    counts: Box<[AtomicU64]>,
    sum: AtomicF64,
}

impl AtomicHistogram {
    fn new(slots: usize) -> Self {
        Self {
            counts: (0..slots).map(|_| AtomicU64::new(0)).collect(),
            sum: AtomicF64::default(),
        }
    }
}

struct HistogramVec {
    bounds: Vec<f64>,
    map: DashMap<Vec<String>, AtomicHistogram>,
}

impl HistogramVec {
    fn observe(&self, key: Vec<String>, v: f64) {
        // First boundary >= v; past the end lands in the overflow slot.
        let slot = self.bounds.partition_point(|&b| b < v);
        let record = |h: &AtomicHistogram| {
            h.counts[slot].fetch_add(1, Ordering::Relaxed);
            h.sum.add(v);
        };

        if let Some(h) = self.map.get(&key) {
            record(h.value());
            return;
        }
        let slots = self.bounds.len() + 1;
        let h = self
            .map
            .entry(key)
            .or_insert_with(|| AtomicHistogram::new(slots));
        record(h.value());
    }
}

enum Series {
    Counter(CounterVec),
    Histogram(HistogramVec),
}

/// Point-in-time value of one label tuple.
#[derive(Debug, Clone, PartialEq)]
pub enum SampleValue {
    Counter(f64),
    Histogram(HistogramSample),
}

#[derive(Debug, Clone, PartialEq)]
pub struct HistogramSample {
    /// Non-cumulative counts per bucket, overflow slot last.
    pub counts: Vec<u64>,
    pub sum: f64,
}

impl HistogramSample {
    pub fn count(&self) -> u64 {
        self.counts.iter().sum()
    }

    /// Running totals, as rendered in `_bucket{le=..}` lines.
    pub fn cumulative(&self) -> Vec<u64> {
        self.counts
            .iter()
            .scan(0u64, |acc, c| {
                *acc += c;
                Some(*acc)
            })
            .collect()
    }
}

/// Copy of a metric's definition and all of its tuples, sorted by label values.
#[derive(Debug, Clone)]
pub struct MetricSnapshot {
    pub name: String,
    pub help: String,
    pub kind: MetricKind,
    pub labels: Vec<String>,
    pub buckets: Vec<f64>,
    pub samples: Vec<(Vec<String>, SampleValue)>,
}

/// A registered metric.
pub struct Metric {
    name: String,
    help: String,
    labels: Vec<String>,
    series: Series,
}

impl Metric {
    pub(crate) fn new(def: MetricDef) -> Self {
        let series = match def.kind {
            MetricKind::Counter => Series::Counter(CounterVec::default()),
            MetricKind::Histogram => Series::Histogram(HistogramVec {
                bounds: def.buckets,
                map: DashMap::new(),
            }),
        };
        Self {
            name: def.name,
            help: def.help,
            labels: def.labels,
            series,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn help(&self) -> &str {
        &self.help
    }

    pub fn kind(&self) -> MetricKind {
        match self.series {
            Series::Counter(_) => MetricKind::Counter,
            Series::Histogram(_) => MetricKind::Histogram,
        }
    }

    /// Ordered label schema.
    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    /// Histogram boundaries (empty for counters).
    pub fn buckets(&self) -> &[f64] {
        match &self.series {
            Series::Counter(_) => &[],
            Series::Histogram(h) => &h.bounds,
        }
    }

    /// Add 1 to a counter tuple.
    pub fn inc<S: AsRef<str>>(&self, values: &[S]) -> Result<()> {
        self.add(values, 1.0)
    }

    /// Add a non-negative delta to a counter tuple.
    pub fn add<S: AsRef<str>>(&self, values: &[S], delta: f64) -> Result<()> {
        let counters = self.counters()?;
        let key = self.key(values)?;
        if !(delta.is_finite() && delta >= 0.0) {
            return Err(MonitorError::InvalidValue {
                metric: self.name.clone(),
                value: delta,
            });
        }
        counters.add(key, delta);
        Ok(())
    }

    /// Record one observation into a histogram tuple.
    pub fn observe<S: AsRef<str>>(&self, values: &[S], value: f64) -> Result<()> {
        let Series::Histogram(h) = &self.series else {
            return Err(self.kind_mismatch(MetricKind::Histogram));
        };
        let key = self.key(values)?;
        if !value.is_finite() {
            return Err(MonitorError::InvalidValue {
                metric: self.name.clone(),
                value,
            });
        }
        h.observe(key, value);
        Ok(())
    }

    /// Current counter value; `None` if the tuple was never updated.
    pub fn counter_value<S: AsRef<str>>(&self, values: &[S]) -> Result<Option<f64>> {
        let counters = self.counters()?;
        let key = self.key(values)?;
        Ok(counters.map.get(&key).map(|c| c.get()))
    }

    /// Current histogram state; `None` if the tuple was never observed.
    pub fn histogram_value<S: AsRef<str>>(&self, values: &[S]) -> Result<Option<HistogramSample>> {
        let Series::Histogram(h) = &self.series else {
            return Err(self.kind_mismatch(MetricKind::Histogram));
        };
        let key = self.key(values)?;
        Ok(h.map.get(&key).map(|r| load_histogram(r.value())))
    }

    /// Copy every tuple. Shard read locks are held only while copying.
    pub fn snapshot(&self) -> MetricSnapshot {
        let mut samples: Vec<(Vec<String>, SampleValue)> = match &self.series {
            Series::Counter(c) => c
                .map
                .iter()
                .map(|r| (r.key().clone(), SampleValue::Counter(r.value().get())))
                .collect(),
            Series::Histogram(h) => h
                .map
                .iter()
                .map(|r| (r.key().clone(), SampleValue::Histogram(load_histogram(r.value()))))
                .collect(),
        };
        samples.sort_by(|a, b| a.0.cmp(&b.0));

        MetricSnapshot {
            name: self.name.clone(),
            help: self.help.clone(),
            kind: self.kind(),
            labels: self.labels.clone(),
            buckets: self.buckets().to_vec(),
            samples,
        }
    }

    fn counters(&self) -> Result<&CounterVec> {
        match &self.series {
            Series::Counter(c) => Ok(c),
            Series::Histogram(_) => Err(self.kind_mismatch(MetricKind::Counter)),
        }
    }

    fn key<S: AsRef<str>>(&self, values: &[S]) -> Result<Vec<String>> {
        if values.len() != self.labels.len() {
            return Err(MonitorError::LabelArity {
                metric: self.name.clone(),
                expected: self.labels.len(),
                got: values.len(),
            });
        }
        Ok(values.iter().map(|v| v.as_ref().to_string()).collect())
    }

    fn kind_mismatch(&self, requested: MetricKind) -> MonitorError {
        MonitorError::KindMismatch {
            metric: self.name.clone(),
            actual: self.kind().as_str(),
            requested: requested.as_str(),
        }
    }
}

impl std::fmt::Debug for Metric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Metric")
            .field("name", &self.name)
            .field("kind", &self.kind())
            .field("labels", &self.labels)
            .finish()
    }
}

fn load_histogram(h: &AtomicHistogram) -> HistogramSample {
    HistogramSample {
        counts: h.counts.iter().map(|c| c.load(Ordering::Relaxed)).collect(),
        sum: h.sum.get(),
    }
}
