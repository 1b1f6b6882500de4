//! Top-level facade crate for reqlens.
//!
//! Re-exports the core engine and the axum binding so users can depend on a single crate.

pub mod core {
    pub use reqlens_core::*;
}

pub mod axum {
    pub use reqlens_axum::*;
}

pub use reqlens_core::{Monitor, MonitorError, RequestSample, Result};
