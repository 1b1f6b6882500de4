//! Request interceptor middleware.
//!
//! Wraps every routed request: skips excluded paths, times the downstream
//! handler, then feeds a [`RequestSample`] to the monitor. Recording happens
//! after the response is produced and can never change it.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    body::HttpBody,
    extract::{ConnectInfo, MatchedPath, Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::Response,
};

use reqlens_core::{Monitor, RequestSample};

pub async fn track_requests(
    State(monitor): State<Arc<Monitor>>,
    req: Request,
    next: Next,
) -> Response {
    let Some(timer) = monitor.begin(req.uri().path()) else {
        return next.run(req).await;
    };

    let route = req
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_owned())
        .unwrap_or_default();
    let method = req.method().to_string();
    let client_id = client_ip(&req);
    let request_content_length = content_length(req.headers())
        .or_else(|| req.body().size_hint().exact())
        .map(|n| n as i64)
        .unwrap_or(-1);

    let resp = next.run(req).await;

    let response_size = resp
        .body()
        .size_hint()
        .exact()
        .or_else(|| content_length(resp.headers()))
        .unwrap_or(0) as i64;

    monitor.record(&RequestSample {
        route,
        method,
        status: resp.status().as_u16(),
        elapsed: timer.elapsed(),
        client_id,
        request_content_length,
        response_size,
    });

    resp
}

/// First `X-Forwarded-For` hop, then `X-Real-IP`, then the peer address.
pub fn client_ip(req: &Request) -> String {
    let headers = req.headers();

    let forwarded = header_str(headers, "x-forwarded-for")
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty());
    if let Some(ip) = forwarded {
        return ip.to_string();
    }

    if let Some(ip) = header_str(headers, "x-real-ip").map(str::trim).filter(|v| !v.is_empty()) {
        return ip.to_string();
    }

    req.extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

fn content_length(headers: &HeaderMap) -> Option<u64> {
    headers
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse().ok())
}
