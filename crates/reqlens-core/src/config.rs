//! Monitor configuration.
//!
//! Deserializes strictly (`deny_unknown_fields`) so typos in a config file
//! fail at startup. The `with_*` setters cover programmatic setup.

use std::collections::{BTreeMap, BTreeSet};

use serde::Deserialize;

use crate::error::{MonitorError, Result};
use crate::metrics::metric::validate_buckets;
use crate::monitor::catalog::RESERVED_LABELS;

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MonitorConfig {
    /// Route of the exposition endpoint. Never measured.
    #[serde(default)]
    pub metric_path: Option<String>,

    /// Paths exempt from measurement.
    #[serde(default)]
    pub exclude_paths: BTreeSet<String>,

    /// A request is slow when its whole elapsed seconds exceed this.
    #[serde(default = "default_slow_threshold_secs")]
    pub slow_threshold_secs: u64,

    #[serde(default = "default_duration_buckets")]
    pub duration_buckets: Vec<f64>,

    /// Static labels appended to every built-in metric, in key order.
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,

    #[serde(default)]
    pub unique_visitors: UniqueVisitorConfig,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            metric_path: None,
            exclude_paths: BTreeSet::new(),
            slow_threshold_secs: default_slow_threshold_secs(),
            duration_buckets: default_duration_buckets(),
            metadata: BTreeMap::new(),
            unique_visitors: UniqueVisitorConfig::default(),
        }
    }
}

impl MonitorConfig {
    pub fn with_metric_path(mut self, path: impl Into<String>) -> Self {
        self.metric_path = Some(path.into());
        self
    }

    pub fn with_slow_threshold_secs(mut self, secs: u64) -> Self {
        self.slow_threshold_secs = secs;
        self
    }

    pub fn with_duration_buckets(mut self, buckets: Vec<f64>) -> Self {
        self.duration_buckets = buckets;
        self
    }

    pub fn with_metadata<I, K, V>(mut self, metadata: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.metadata = metadata
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        self
    }

    pub fn with_exclude_paths<I, S>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exclude_paths = paths.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_unique_visitors(mut self, expected_clients: usize, false_positive_rate: f64) -> Self {
        self.unique_visitors = UniqueVisitorConfig {
            expected_clients,
            false_positive_rate,
        };
        self
    }

    pub fn validate(&self) -> Result<()> {
        if let Some(p) = &self.metric_path {
            if !p.starts_with('/') {
                return Err(MonitorError::Config(format!(
                    "metric_path must start with '/': {p}"
                )));
            }
        }

        if let Some(p) = self.exclude_paths.iter().find(|p| !p.starts_with('/')) {
            return Err(MonitorError::Config(format!(
                "exclude_paths entries must start with '/': {p}"
            )));
        }

        validate_buckets(&self.duration_buckets)
            .map_err(|e| MonitorError::Config(format!("duration_buckets: {e}")))?;

        for k in self.metadata.keys() {
            if !is_label_name(k) {
                return Err(MonitorError::Config(format!("invalid metadata label name: {k}")));
            }
            if RESERVED_LABELS.contains(&k.as_str()) {
                return Err(MonitorError::Config(format!(
                    "metadata label collides with a built-in label: {k}"
                )));
            }
        }

        self.unique_visitors.validate()
    }
}

/// Capacity planning for the unique-visitor Bloom filter.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UniqueVisitorConfig {
    #[serde(default = "default_expected_clients")]
    pub expected_clients: usize,

    #[serde(default = "default_false_positive_rate")]
    pub false_positive_rate: f64,
}

impl Default for UniqueVisitorConfig {
    fn default() -> Self {
        Self {
            expected_clients: default_expected_clients(),
            false_positive_rate: default_false_positive_rate(),
        }
    }
}

impl UniqueVisitorConfig {
    pub fn validate(&self) -> Result<()> {
        if self.expected_clients == 0 {
            return Err(MonitorError::Config(
                "unique_visitors.expected_clients must be > 0".into(),
            ));
        }
        if !(self.false_positive_rate > 0.0 && self.false_positive_rate < 1.0) {
            return Err(MonitorError::Config(
                "unique_visitors.false_positive_rate must be between 0 and 1 (exclusive)".into(),
            ));
        }
        Ok(())
    }
}

/// `[a-zA-Z_][a-zA-Z0-9_]*`, excluding the reserved `__` prefix.
fn is_label_name(s: &str) -> bool {
    let mut chars = s.chars();
    let Some(first) = chars.next() else { return false; };
    (first.is_ascii_alphabetic() || first == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        && !s.starts_with("__")
}

fn default_slow_threshold_secs() -> u64 {
    5
}
fn default_duration_buckets() -> Vec<f64> {
    vec![0.1, 0.3, 1.2, 5.0, 10.0]
}
fn default_expected_clients() -> usize {
    1_000_000
}
fn default_false_positive_rate() -> f64 {
    0.001
}
