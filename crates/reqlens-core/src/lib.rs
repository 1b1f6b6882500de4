//! reqlens core: request-scoped metric aggregation.
//!
//! Framework-agnostic pieces shared by the bindings: the metric registry and
//! its text exposition, the unique-visitor Bloom filter, configuration, and
//! the per-request measurement pipeline driven through [`Monitor`].
//!
//! # Defensive guarantees
//! Panics, `unwrap`, and `expect` are compile-denied here. Instrumentation
//! failures surface as `MonitorError` values and are never allowed to fail
//! the request being measured.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod bloom;
pub mod config;
pub mod error;
pub mod metrics;
pub mod monitor;

/// Shared result type.
pub use error::{ErrorCode, MonitorError, Result};
pub use monitor::{Monitor, RequestSample, RequestTimer};
