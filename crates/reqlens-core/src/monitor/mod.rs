//! The request monitor: one explicit owner for config, registry, the
//! unique-visitor filter, and diagnostics.
//!
//! Build it once, wrap it in an `Arc`, and hand the handle to whatever
//! framework binding drives the request pipeline. [`Monitor::init`]
//! registers the built-in catalog and is safe to call from several places;
//! only the first call registers anything.

pub mod catalog;
pub mod diagnostics;
pub mod interceptor;
pub mod labels;

use std::sync::{Arc, Mutex, PoisonError};

use crate::bloom::BloomFilter;
use crate::config::MonitorConfig;
use crate::error::Result;
use crate::metrics::{Metric, MetricDef, MetricRegistry};

pub use catalog::BuiltinMetric;
pub use diagnostics::Diagnostics;
pub use interceptor::{RequestSample, RequestTimer};
pub use labels::LabelResolver;

pub struct Monitor {
    cfg: MonitorConfig,
    registry: MetricRegistry,
    visitors: BloomFilter,
    labels: LabelResolver,
    diagnostics: Diagnostics,
    initialized: Mutex<bool>,
}

impl Monitor {
    /// Validate the config and size the unique-visitor filter.
    /// Built-in metrics are registered later by [`init`](Self::init).
    pub fn new(cfg: MonitorConfig) -> Result<Self> {
        cfg.validate()?;

        let uv = &cfg.unique_visitors;
        let visitors = BloomFilter::with_capacity(uv.expected_clients, uv.false_positive_rate)?;

        if let Some(p) = &cfg.metric_path {
            if cfg.exclude_paths.contains(p) {
                tracing::warn!(metric_path = %p, "metric_path is also listed in exclude_paths");
            }
        }

        let labels = LabelResolver::new(&cfg.metadata);
        Ok(Self {
            cfg,
            registry: MetricRegistry::new(),
            visitors,
            labels,
            diagnostics: Diagnostics::new(),
            initialized: Mutex::new(false),
        })
    }

    /// Register the built-in catalog. Runs once; later calls return `Ok`
    /// without touching the registry or the visitor filter. A failed call
    /// registers nothing and may be retried.
    pub fn init(&self) -> Result<()> {
        let mut done = self.initialized.lock().unwrap_or_else(PoisonError::into_inner);
        if *done {
            return Ok(());
        }

        let defs = BuiltinMetric::ALL
            .into_iter()
            .map(|m| {
                m.definition(
                    self.labels.labels_for(m.name()),
                    self.cfg.slow_threshold_secs,
                    &self.cfg.duration_buckets,
                )
            })
            .collect();
        self.registry.register_all(defs)?;
        *done = true;

        tracing::info!(
            metrics = BuiltinMetric::ALL.len(),
            metric_path = ?self.cfg.metric_path,
            bloom_bits = self.visitors.num_bits(),
            bloom_hashes = self.visitors.num_hashes(),
            "request monitor initialized"
        );
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        *self.initialized.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn cfg(&self) -> &MonitorConfig {
        &self.cfg
    }

    pub fn registry(&self) -> &MetricRegistry {
        &self.registry
    }

    pub fn visitors(&self) -> &BloomFilter {
        &self.visitors
    }

    pub fn label_resolver(&self) -> &LabelResolver {
        &self.labels
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    /// Register an application metric next to the built-ins.
    pub fn register(&self, def: MetricDef) -> Result<Arc<Metric>> {
        self.registry.register(def)
    }

    pub fn metric(&self, name: &str) -> Option<Arc<Metric>> {
        self.registry.lookup(name)
    }

    /// False for the metric endpoint and excluded paths.
    pub fn should_measure(&self, path: &str) -> bool {
        if self.cfg.metric_path.as_deref() == Some(path) {
            return false;
        }
        !self.cfg.exclude_paths.contains(path)
    }

    /// Prometheus text exposition of every registered metric.
    pub fn render(&self) -> String {
        self.registry.render()
    }
}

impl std::fmt::Debug for Monitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Monitor")
            .field("cfg", &self.cfg)
            .field("metrics", &self.registry.len())
            .field("visitors", &self.visitors)
            .finish()
    }
}
