use std::collections::BTreeMap;

use super::catalog::BuiltinMetric;

/// Builds label schemas and value tuples: the metric's base labels followed by
/// the static metadata labels in key order.
#[derive(Debug, Clone, Default)]
pub struct LabelResolver {
    meta_names: Vec<String>,
    meta_values: Vec<String>,
}

impl LabelResolver {
    pub fn new(metadata: &BTreeMap<String, String>) -> Self {
        let (meta_names, meta_values) = metadata
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .unzip();
        Self {
            meta_names,
            meta_values,
        }
    }

    pub fn has_metadata(&self) -> bool {
        !self.meta_names.is_empty()
    }

    /// Ordered label names for `metric`. Names outside the built-in catalog
    /// carry metadata labels only.
    pub fn labels_for(&self, metric: &str) -> Vec<String> {
        let base = BuiltinMetric::from_name(metric)
            .map(BuiltinMetric::base_labels)
            .unwrap_or_default();

        let mut labels = Vec::with_capacity(base.len() + self.meta_names.len());
        labels.extend(base.iter().map(|l| l.to_string()));
        labels.extend(self.meta_names.iter().cloned());
        labels
    }

    /// Value tuple: per-request `base` values followed by metadata values.
    pub fn values<S: AsRef<str>>(&self, base: &[S]) -> Vec<String> {
        let mut values = Vec::with_capacity(base.len() + self.meta_values.len());
        values.extend(base.iter().map(|v| v.as_ref().to_string()));
        values.extend(self.meta_values.iter().cloned());
        values
    }
}
