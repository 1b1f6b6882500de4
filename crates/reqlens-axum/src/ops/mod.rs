//! Operational HTTP endpoints.
//!
//! - `/healthz` : liveness
//! - metric path : Prometheus text format

use std::sync::Arc;

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};

use reqlens_core::metrics::render::CONTENT_TYPE;
use reqlens_core::Monitor;

pub async fn healthz() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

pub async fn metrics(State(monitor): State<Arc<Monitor>>) -> Response {
    let body = monitor.render();

    (StatusCode::OK, [(header::CONTENT_TYPE, CONTENT_TYPE)], body).into_response()
}
