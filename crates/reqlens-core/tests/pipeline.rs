//! Monitor initialization and the per-request measurement pipeline.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use reqlens_core::config::MonitorConfig;
use reqlens_core::metrics::MetricDef;
use reqlens_core::monitor::catalog::*;
use reqlens_core::monitor::interceptor::is_slow;
use reqlens_core::{ErrorCode, Monitor, RequestSample};

fn monitor(cfg: MonitorConfig) -> Monitor {
    let m = Monitor::new(cfg).unwrap();
    m.init().unwrap();
    m
}

fn sample(route: &str, elapsed: Duration) -> RequestSample {
    RequestSample {
        route: route.to_string(),
        method: "GET".to_string(),
        status: 200,
        elapsed,
        client_id: "127.0.0.1".to_string(),
        request_content_length: -1,
        response_size: 0,
    }
}

fn counter(m: &Monitor, name: &str, values: &[&str]) -> f64 {
    m.metric(name)
        .unwrap()
        .counter_value(values)
        .unwrap()
        .unwrap_or(0.0)
}

const NONE: [&str; 0] = [];

#[test]
fn init_registers_catalog_once() {
    let m = Monitor::new(MonitorConfig::default()).unwrap();
    assert!(!m.is_initialized());
    m.init().unwrap();
    m.init().unwrap();
    assert!(m.is_initialized());
    assert_eq!(
        m.registry().names(),
        vec![
            METRIC_REQUEST_BODY,
            METRIC_REQUEST_DURATION,
            METRIC_REQUEST_TOTAL,
            METRIC_REQUEST_UV_TOTAL,
            METRIC_RESPONSE_BODY,
            METRIC_SLOW_REQUEST,
            METRIC_URI_REQUEST_TOTAL,
        ]
    );
}

#[test]
fn concurrent_init_is_single_execution() {
    let m = Monitor::new(MonitorConfig::default()).unwrap();
    thread::scope(|s| {
        for _ in 0..64 {
            s.spawn(|| m.init().unwrap());
        }
    });
    assert_eq!(m.registry().len(), 7);
}

#[test]
fn reinit_keeps_tracked_visitors() {
    let m = monitor(MonitorConfig::default());
    m.record(&sample("/a", Duration::from_millis(5)));
    m.init().unwrap();
    m.record(&sample("/a", Duration::from_millis(5)));
    assert_eq!(counter(&m, METRIC_REQUEST_UV_TOTAL, &NONE), 1.0);
}

#[test]
fn label_lists_are_deterministic_and_include_metadata() {
    let cfg = MonitorConfig::default().with_metadata([("region", "eu"), ("app", "shop")]);
    let m = monitor(cfg);
    let r = m.label_resolver();

    assert_eq!(r.labels_for(METRIC_URI_REQUEST_TOTAL), r.labels_for(METRIC_URI_REQUEST_TOTAL));
    assert_eq!(
        r.labels_for(METRIC_URI_REQUEST_TOTAL),
        vec!["uri", "method", "code", "app", "region"]
    );
    assert_eq!(r.labels_for(METRIC_REQUEST_DURATION), vec!["uri", "app", "region"]);
    assert_eq!(r.labels_for(METRIC_REQUEST_TOTAL), vec!["app", "region"]);
    assert_eq!(r.labels_for("custom_metric"), vec!["app", "region"]);

    m.record(&sample("/p", Duration::from_millis(1)));
    assert_eq!(counter(&m, METRIC_REQUEST_TOTAL, &["shop", "eu"]), 1.0);
    assert_eq!(counter(&m, METRIC_URI_REQUEST_TOTAL, &["/p", "GET", "200", "shop", "eu"]), 1.0);
}

#[test]
fn excluded_paths_never_touch_metrics() {
    let cfg = MonitorConfig::default()
        .with_metric_path("/metrics")
        .with_exclude_paths(["/healthz"]);
    let m = monitor(cfg);

    assert!(m.begin("/metrics").is_none());
    assert!(m.begin("/healthz").is_none());
    assert!(m.begin("/product/1").is_some());

    let before = m.visitors().count_ones();
    let snapshot: Vec<_> = m.registry().snapshot();
    assert!(snapshot.iter().all(|s| s.samples.is_empty()));
    assert_eq!(m.visitors().count_ones(), before);
}

#[test]
fn slow_request_uses_truncated_seconds() {
    assert!(!is_slow(Duration::from_millis(10_900), 10));
    assert!(is_slow(Duration::from_secs(11), 10));

    let m = monitor(MonitorConfig::default().with_slow_threshold_secs(10));
    let slow = ["/s", "GET", "200"];

    m.record(&sample("/s", Duration::from_millis(10_900)));
    assert_eq!(counter(&m, METRIC_SLOW_REQUEST, &slow), 0.0);

    m.record(&sample("/s", Duration::from_millis(11_000)));
    assert_eq!(counter(&m, METRIC_SLOW_REQUEST, &slow), 1.0);
}

#[test]
fn body_size_boundaries() {
    let m = monitor(MonitorConfig::default());

    let mut s = sample("/u", Duration::from_millis(1));
    s.request_content_length = -1;
    s.response_size = 0;
    m.record(&s);
    assert_eq!(m.metric(METRIC_REQUEST_BODY).unwrap().counter_value(&NONE).unwrap(), None);
    assert_eq!(m.metric(METRIC_RESPONSE_BODY).unwrap().counter_value(&NONE).unwrap(), None);

    s.request_content_length = 0;
    m.record(&s);
    assert_eq!(counter(&m, METRIC_REQUEST_BODY, &NONE), 0.0);

    s.request_content_length = 128;
    s.response_size = 512;
    m.record(&s);
    assert_eq!(counter(&m, METRIC_REQUEST_BODY, &NONE), 128.0);
    assert_eq!(counter(&m, METRIC_RESPONSE_BODY, &NONE), 512.0);
}

#[test]
fn duration_lands_in_route_histogram() {
    let m = monitor(MonitorConfig::default());
    m.record(&sample("/d", Duration::from_millis(250)));

    let h = m
        .metric(METRIC_REQUEST_DURATION)
        .unwrap()
        .histogram_value(&["/d"])
        .unwrap()
        .unwrap();
    assert_eq!(h.counts, vec![0, 1, 0, 0, 0, 0]);
}

#[test]
fn failed_updates_go_to_diagnostics() {
    // Not initialized: every update misses its metric.
    let m = Monitor::new(MonitorConfig::default()).unwrap();
    m.record(&sample("/x", Duration::from_millis(1)));
    assert_eq!(m.diagnostics().dropped(ErrorCode::NotFound), 4);
    assert_eq!(m.diagnostics().dropped_total(), 4);
}

#[test]
fn visitor_seen_before_init_is_counted_after() {
    let m = Monitor::new(MonitorConfig::default()).unwrap();
    let bits = m.visitors().count_ones();
    m.record(&sample("/a", Duration::from_millis(1)));
    assert_eq!(m.visitors().count_ones(), bits);

    m.init().unwrap();
    m.record(&sample("/a", Duration::from_millis(1)));
    assert_eq!(counter(&m, METRIC_REQUEST_UV_TOTAL, &NONE), 1.0);
    assert_eq!(counter(&m, METRIC_REQUEST_TOTAL, &NONE), 1.0);
}

#[test]
fn init_name_collision_registers_nothing() {
    let m = Monitor::new(MonitorConfig::default()).unwrap();
    m.register(MetricDef::counter(METRIC_SLOW_REQUEST, "app owned"))
        .unwrap();

    for _ in 0..2 {
        let err = m.init().unwrap_err();
        assert_eq!(err.code(), ErrorCode::DuplicateName);
        assert!(err.to_string().contains(METRIC_SLOW_REQUEST));
        assert_eq!(m.registry().names(), vec![METRIC_SLOW_REQUEST.to_string()]);
        assert!(!m.is_initialized());
    }
}

#[test]
fn custom_metrics_render_with_builtins() {
    let m = monitor(MonitorConfig::default());
    let orders = m
        .register(MetricDef::counter("shop_orders_total", "orders placed").with_labels(["kind"]))
        .unwrap();
    orders.inc(&["gift"]).unwrap();

    let text = m.render();
    assert!(text.contains("# TYPE shop_orders_total counter"));
    assert!(text.contains("shop_orders_total{kind=\"gift\"} 1"));
    assert!(text.contains("# TYPE http_request_duration histogram"));
}

#[test]
fn concurrent_requests_from_one_client() {
    let cfg = MonitorConfig::default()
        .with_metric_path("/metrics")
        .with_slow_threshold_secs(10)
        .with_duration_buckets(vec![0.1, 0.3, 1.2, 5.0, 10.0]);
    let m = Arc::new(monitor(cfg));

    thread::scope(|s| {
        for _ in 0..10 {
            let m = Arc::clone(&m);
            s.spawn(move || {
                for _ in 0..100 {
                    m.record(&sample("/product/:id", Duration::from_millis(3)));
                }
            });
        }
    });

    assert_eq!(counter(&m, METRIC_REQUEST_TOTAL, &NONE), 1000.0);
    assert_eq!(counter(&m, METRIC_URI_REQUEST_TOTAL, &["/product/:id", "GET", "200"]), 1000.0);
    assert_eq!(counter(&m, METRIC_REQUEST_UV_TOTAL, &NONE), 1.0);
    assert_eq!(counter(&m, METRIC_SLOW_REQUEST, &["/product/:id", "GET", "200"]), 0.0);
    assert_eq!(m.diagnostics().dropped_total(), 0);
}
