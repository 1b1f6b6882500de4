//! reqlens axum binding.
//!
//! Attaches the request monitor to axum routers, serves the Prometheus
//! endpoint, and loads monitor configuration from YAML. Consumed by the demo
//! binary (`main.rs`) and by integration tests.

pub mod config;
pub mod middleware;
pub mod ops;
pub mod router;

pub use router::{expose, use_monitor, use_without_exposing_endpoint};
