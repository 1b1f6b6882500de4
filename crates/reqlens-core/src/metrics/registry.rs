use std::collections::HashSet;
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use crate::error::{MonitorError, Result};

use super::metric::{Metric, MetricDef, MetricSnapshot};
use super::render;

/// Name-keyed store of metrics.
///
/// Registration happens at startup; lookups are safe from any number of
/// request tasks.
#[derive(Default)]
pub struct MetricRegistry {
    metrics: DashMap<String, Arc<Metric>>,
}

impl MetricRegistry {
    pub fn new() -> Self {
        Self {
            metrics: DashMap::new(),
        }
    }

    /// Validate and insert a metric definition.
    pub fn register(&self, def: MetricDef) -> Result<Arc<Metric>> {
        def.validate()?;
        match self.metrics.entry(def.name.clone()) {
            Entry::Occupied(_) => Err(MonitorError::DuplicateName(def.name)),
            Entry::Vacant(slot) => {
                let metric = Arc::new(Metric::new(def));
                slot.insert(Arc::clone(&metric));
                Ok(metric)
            }
        }
    }

    /// Register a batch of definitions, all or nothing. Every definition is
    /// validated and checked for duplicates before the first insert; an
    /// insert that races with a concurrent `register` rolls back the batch.
    pub fn register_all(&self, defs: Vec<MetricDef>) -> Result<Vec<Arc<Metric>>> {
        let mut seen = HashSet::with_capacity(defs.len());
        for def in &defs {
            def.validate()?;
            if !seen.insert(def.name.as_str()) || self.contains(&def.name) {
                return Err(MonitorError::DuplicateName(def.name.clone()));
            }
        }

        let mut added = Vec::with_capacity(defs.len());
        for def in defs {
            match self.register(def) {
                Ok(metric) => added.push(metric),
                Err(e) => {
                    for m in &added {
                        self.metrics.remove(m.name());
                    }
                    return Err(e);
                }
            }
        }
        Ok(added)
    }

    pub fn lookup(&self, name: &str) -> Option<Arc<Metric>> {
        self.metrics.get(name).map(|r| Arc::clone(r.value()))
    }

    /// Like [`lookup`](Self::lookup) but reports a missing metric as an error.
    pub fn get(&self, name: &str) -> Result<Arc<Metric>> {
        self.lookup(name)
            .ok_or_else(|| MonitorError::NotFound(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.metrics.contains_key(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.metrics.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.metrics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.metrics.is_empty()
    }

    /// Snapshot every metric, sorted by name.
    pub fn snapshot(&self) -> Vec<MetricSnapshot> {
        let mut metrics: Vec<Arc<Metric>> = self.metrics.iter().map(|e| Arc::clone(e.value())).collect();
        metrics.sort_by(|a, b| a.name().cmp(b.name()));
        metrics.iter().map(|m| m.snapshot()).collect()
    }

    /// Render all metrics in Prometheus text format.
    pub fn render(&self) -> String {
        render::render(&self.snapshot())
    }
}
