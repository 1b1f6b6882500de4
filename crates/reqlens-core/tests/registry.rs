//! Registry, metric value operations, and exposition.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use std::thread;

use reqlens_core::metrics::{MetricDef, MetricKind, MetricRegistry};

#[test]
fn duplicate_names_are_rejected() {
    let reg = MetricRegistry::new();
    reg.register(MetricDef::counter("jobs_total", "jobs")).unwrap();
    let err = reg.register(MetricDef::counter("jobs_total", "again")).unwrap_err();
    assert_eq!(err.code().as_str(), "DUPLICATE_NAME");
    assert_eq!(reg.len(), 1);
}

#[test]
fn batch_registration_is_all_or_nothing() {
    let reg = MetricRegistry::new();
    reg.register(MetricDef::counter("c_total", "c")).unwrap();

    let err = reg
        .register_all(vec![
            MetricDef::counter("a_total", "a"),
            MetricDef::counter("b_total", "b"),
            MetricDef::counter("c_total", "c again"),
        ])
        .unwrap_err();
    assert_eq!(err.code().as_str(), "DUPLICATE_NAME");
    assert_eq!(reg.names(), vec!["c_total"]);

    let err = reg
        .register_all(vec![
            MetricDef::counter("a_total", "a"),
            MetricDef::histogram("b_seconds", "b", vec![2.0, 1.0]),
        ])
        .unwrap_err();
    assert_eq!(err.code().as_str(), "INVALID_DEFINITION");
    assert_eq!(reg.len(), 1);

    let err = reg
        .register_all(vec![MetricDef::counter("d_total", "d"), MetricDef::counter("d_total", "d")])
        .unwrap_err();
    assert_eq!(err.code().as_str(), "DUPLICATE_NAME");
    assert_eq!(reg.len(), 1);

    let added = reg
        .register_all(vec![MetricDef::counter("a_total", "a"), MetricDef::counter("b_total", "b")])
        .unwrap();
    assert_eq!(added.len(), 2);
    assert_eq!(reg.names(), vec!["a_total", "b_total", "c_total"]);
}

#[test]
fn bucket_rules_depend_on_kind() {
    let reg = MetricRegistry::new();

    let err = reg
        .register(MetricDef::histogram("latency", "latency", vec![]))
        .unwrap_err();
    assert_eq!(err.code().as_str(), "INVALID_DEFINITION");

    let mut counter = MetricDef::counter("hits", "hits");
    counter.buckets = vec![1.0];
    let err = reg.register(counter).unwrap_err();
    assert_eq!(err.code().as_str(), "INVALID_DEFINITION");

    let err = reg
        .register(MetricDef::histogram("latency", "latency", vec![1.0, 0.5]))
        .unwrap_err();
    assert_eq!(err.code().as_str(), "INVALID_DEFINITION");

    let err = reg
        .register(MetricDef::counter("pairs", "pairs").with_labels(["a", "a"]))
        .unwrap_err();
    assert_eq!(err.code().as_str(), "INVALID_DEFINITION");

    assert!(reg.is_empty());
}

#[test]
fn lookup_misses_are_not_found() {
    let reg = MetricRegistry::new();
    assert!(reg.lookup("nope").is_none());
    assert_eq!(reg.get("nope").unwrap_err().code().as_str(), "NOT_FOUND");
}

#[test]
fn label_arity_is_enforced() {
    let reg = MetricRegistry::new();
    let m = reg
        .register(MetricDef::counter("route_total", "r").with_labels(["uri", "method"]))
        .unwrap();

    let err = m.inc(&["/a"]).unwrap_err();
    assert_eq!(err.code().as_str(), "LABEL_ARITY");
    let err = m.add(&["/a", "GET", "200"], 2.0).unwrap_err();
    assert_eq!(err.code().as_str(), "LABEL_ARITY");

    assert!(m.snapshot().samples.is_empty());
}

#[test]
fn counter_increments_are_monotonic() {
    let reg = MetricRegistry::new();
    let m = reg.register(MetricDef::counter("hits", "hits")).unwrap();
    let none: [&str; 0] = [];

    assert_eq!(m.counter_value(&none).unwrap(), None);
    let mut last = 0.0;
    for _ in 0..10 {
        m.inc(&none).unwrap();
        let now = m.counter_value(&none).unwrap().unwrap();
        assert!(now > last);
        last = now;
    }
    m.add(&none, 0.0).unwrap();
    assert_eq!(m.counter_value(&none).unwrap(), Some(10.0));
}

#[test]
fn counter_rejects_negative_and_non_finite_deltas() {
    let reg = MetricRegistry::new();
    let m = reg.register(MetricDef::counter("bytes", "b")).unwrap();
    let none: [&str; 0] = [];

    assert_eq!(m.add(&none, -1.0).unwrap_err().code().as_str(), "INVALID_VALUE");
    assert_eq!(m.add(&none, f64::NAN).unwrap_err().code().as_str(), "INVALID_VALUE");
    assert_eq!(m.counter_value(&none).unwrap(), None);
}

#[test]
fn kind_mismatch_is_reported() {
    let reg = MetricRegistry::new();
    let c = reg.register(MetricDef::counter("c", "c")).unwrap();
    let h = reg.register(MetricDef::histogram("h", "h", vec![1.0])).unwrap();
    let none: [&str; 0] = [];

    assert_eq!(c.observe(&none, 1.0).unwrap_err().code().as_str(), "KIND_MISMATCH");
    assert_eq!(h.inc(&none).unwrap_err().code().as_str(), "KIND_MISMATCH");
    assert_eq!(h.kind(), MetricKind::Histogram);
}

#[test]
fn concurrent_increments_sum_exactly() {
    let reg = MetricRegistry::new();
    let m = reg
        .register(MetricDef::counter("uri_total", "u").with_labels(["uri"]))
        .unwrap();

    thread::scope(|s| {
        for _ in 0..16 {
            s.spawn(|| {
                for _ in 0..1000 {
                    m.inc(&["/product/:id"]).unwrap();
                }
            });
        }
    });

    assert_eq!(m.counter_value(&["/product/:id"]).unwrap(), Some(16_000.0));
}

#[test]
fn histogram_buckets_by_first_boundary_at_or_above() {
    let reg = MetricRegistry::new();
    let h = reg
        .register(MetricDef::histogram("d", "d", vec![0.1, 0.3, 1.2, 5.0, 10.0]).with_labels(["uri"]))
        .unwrap();

    for v in [0.05, 0.1, 0.2, 1.2, 7.0, 42.0] {
        h.observe(&["/x"], v).unwrap();
    }

    let s = h.histogram_value(&["/x"]).unwrap().unwrap();
    assert_eq!(s.counts, vec![2, 1, 1, 0, 1, 1]);
    assert_eq!(s.cumulative(), vec![2, 3, 4, 4, 5, 6]);
    assert_eq!(s.count(), 6);
    assert!((s.sum - 50.55).abs() < 1e-9);
}

#[test]
fn render_emits_prometheus_text() {
    let reg = MetricRegistry::new();
    let c = reg
        .register(MetricDef::counter("b_total", "Requests.\nPer route").with_labels(["uri", "code"]))
        .unwrap();
    let h = reg
        .register(MetricDef::histogram("a_seconds", "Latency.", vec![0.5, 1.0]))
        .unwrap();
    let none: [&str; 0] = [];

    c.inc(&["/b", "500"]).unwrap();
    c.inc(&["/a\"q", "200"]).unwrap();
    h.observe(&none, 0.25).unwrap();
    h.observe(&none, 3.0).unwrap();

    let text = reg.render();
    let expected = "\
# HELP a_seconds Latency.
# TYPE a_seconds histogram
a_seconds_bucket{le=\"0.5\"} 1
a_seconds_bucket{le=\"1\"} 1
a_seconds_bucket{le=\"+Inf\"} 2
a_seconds_sum 3.25
a_seconds_count 2
# HELP b_total Requests.\\nPer route
# TYPE b_total counter
b_total{uri=\"/a\\\"q\",code=\"200\"} 1
b_total{uri=\"/b\",code=\"500\"} 1
";
    assert_eq!(text, expected);
}
