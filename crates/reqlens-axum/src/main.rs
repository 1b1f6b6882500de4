//! reqlens demo server.
//!
//! Serves `/product/:id` with the request monitor attached and the metrics
//! endpoint on the same listener. Pass a YAML config path as the first
//! argument; without one the built-in defaults are used.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{extract::Path, routing::get, Json, Router};
use serde_json::{json, Value};
use tracing_subscriber::{fmt, EnvFilter};

use reqlens_axum::{config, ops, router};
use reqlens_core::Monitor;

async fn product(Path(id): Path<String>) -> Json<Value> {
    Json(json!({ "productId": id }))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let cfg = match std::env::args().nth(1) {
        Some(path) => config::load_from_file(&path)?,
        None => config::FileConfig::default(),
    };
    let listen = cfg.server.listen_addr()?;

    let monitor = Arc::new(Monitor::new(cfg.monitor)?);
    let app = Router::new()
        .route("/product/:id", get(product))
        .route("/healthz", get(ops::healthz));
    let app = router::use_monitor(app, &monitor)?;

    tracing::info!(%listen, "reqlens demo starting");
    let listener = tokio::net::TcpListener::bind(listen).await?;

    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>()).await?;
    Ok(())
}
