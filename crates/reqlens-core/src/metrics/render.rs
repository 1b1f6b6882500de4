//! Prometheus text exposition format (0.0.4).

use std::fmt::Write;

use super::metric::{MetricSnapshot, SampleValue};

/// Content type served with [`render`] output.
pub const CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

/// Helper to escape label values.
fn escape_label(v: &str) -> String {
    v.replace('\\', "\\\\").replace('"', "\\\"").replace('\n', "\\n")
}

fn escape_help(v: &str) -> String {
    v.replace('\\', "\\\\").replace('\n', "\\n")
}

fn fmt_float(v: f64) -> String {
    if v.is_nan() {
        "NaN".into()
    } else if v == f64::INFINITY {
        "+Inf".into()
    } else if v == f64::NEG_INFINITY {
        "-Inf".into()
    } else {
        v.to_string()
    }
}

/// `k1="v1",k2="v2"` without braces.
fn label_pairs(names: &[String], values: &[String]) -> String {
    names
        .iter()
        .zip(values)
        .map(|(k, v)| format!("{}=\"{}\"", k, escape_label(v)))
        .collect::<Vec<_>>()
        .join(",")
}

fn braced(pairs: &str) -> String {
    if pairs.is_empty() {
        String::new()
    } else {
        format!("{{{pairs}}}")
    }
}

/// Render snapshots in order.
pub fn render(metrics: &[MetricSnapshot]) -> String {
    let mut out = String::new();
    for m in metrics {
        render_one(m, &mut out);
    }
    out
}

fn render_one(m: &MetricSnapshot, out: &mut String) {
    let _ = writeln!(out, "# HELP {} {}", m.name, escape_help(&m.help));
    let _ = writeln!(out, "# TYPE {} {}", m.name, m.kind.as_str());

    for (values, sample) in &m.samples {
        let pairs = label_pairs(&m.labels, values);
        match sample {
            SampleValue::Counter(v) => {
                let _ = writeln!(out, "{}{} {}", m.name, braced(&pairs), fmt_float(*v));
            }
            SampleValue::Histogram(h) => {
                let prefix = if pairs.is_empty() { String::new() } else { format!("{pairs},") };
                let cumulative = h.cumulative();
                let les = m.buckets.iter().copied().chain(std::iter::once(f64::INFINITY));
                for (le, count) in les.zip(&cumulative) {
                    let _ = writeln!(
                        out,
                        "{}_bucket{{{}le=\"{}\"}} {}",
                        m.name,
                        prefix,
                        fmt_float(le),
                        count
                    );
                }
                let _ = writeln!(out, "{}_sum{} {}", m.name, braced(&pairs), fmt_float(h.sum));
                let _ = writeln!(out, "{}_count{} {}", m.name, braced(&pairs), h.count());
            }
        }
    }
}
