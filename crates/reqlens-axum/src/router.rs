//! Router wiring.
//!
//! `Router::layer` only wraps routes that already exist, so attach the
//! monitor after the application routes are registered.

use std::sync::Arc;

use axum::{middleware, routing::get, Router};

use reqlens_core::error::{MonitorError, Result};
use reqlens_core::Monitor;

use crate::{middleware::track_requests, ops};

/// Initialize the monitor, measure every route of `router`, and serve the
/// metric endpoint on the same router. Call it once per router.
///
/// # Panics
///
/// Same as [`expose`].
pub fn use_monitor<S>(router: Router<S>, monitor: &Arc<Monitor>) -> Result<Router<S>>
where
    S: Clone + Send + Sync + 'static,
{
    let router = use_without_exposing_endpoint(router, monitor)?;
    expose(router, monitor)
}

/// Initialize the monitor and measure every route of `router`.
/// May be called for several routers sharing one monitor.
pub fn use_without_exposing_endpoint<S>(router: Router<S>, monitor: &Arc<Monitor>) -> Result<Router<S>>
where
    S: Clone + Send + Sync + 'static,
{
    monitor.init()?;
    Ok(router.layer(middleware::from_fn_with_state(
        Arc::clone(monitor),
        track_requests,
    )))
}

/// Add only the metric endpoint, e.g. on a router served on another port.
///
/// # Panics
///
/// axum panics on overlapping routes, so this panics if `router` already
/// serves `metric_path`, including a router returned by [`use_monitor`] or a
/// previous `expose`.
pub fn expose<S>(router: Router<S>, monitor: &Arc<Monitor>) -> Result<Router<S>>
where
    S: Clone + Send + Sync + 'static,
{
    let path = monitor
        .cfg()
        .metric_path
        .clone()
        .ok_or_else(|| MonitorError::Config("metric_path is not set".into()))?;

    tracing::info!(path = %path, "metrics endpoint exposed");
    let endpoint: Router<S> = Router::new()
        .route(&path, get(ops::metrics))
        .with_state(Arc::clone(monitor));
    Ok(router.merge(endpoint))
}
