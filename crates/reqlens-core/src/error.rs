//! Shared error type across reqlens crates.

use thiserror::Error;

/// Stable error codes (used as diagnostics keys and log fields).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// Metric name already registered.
    DuplicateName,
    /// Metric definition rejected at registration.
    InvalidDefinition,
    /// Wrong number of label values for the metric's schema.
    LabelArity,
    /// No metric registered under that name.
    NotFound,
    /// Counter operation on a histogram or the reverse.
    KindMismatch,
    /// Negative or non-finite value.
    InvalidValue,
    /// Invalid configuration.
    Config,
    /// Internal error.
    Internal,
}

impl ErrorCode {
    /// String representation used in logs and diagnostics.
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::DuplicateName => "DUPLICATE_NAME",
            ErrorCode::InvalidDefinition => "INVALID_DEFINITION",
            ErrorCode::LabelArity => "LABEL_ARITY",
            ErrorCode::NotFound => "NOT_FOUND",
            ErrorCode::KindMismatch => "KIND_MISMATCH",
            ErrorCode::InvalidValue => "INVALID_VALUE",
            ErrorCode::Config => "CONFIG",
            ErrorCode::Internal => "INTERNAL",
        }
    }
}

/// Shared result type.
pub type Result<T> = std::result::Result<T, MonitorError>;

/// Unified error type used by core and the framework bindings.
#[derive(Debug, Error)]
pub enum MonitorError {
    #[error("metric already registered: {0}")]
    DuplicateName(String),
    #[error("invalid definition for metric {name}: {reason}")]
    InvalidDefinition { name: String, reason: String },
    #[error("metric {metric} expects {expected} label values, got {got}")]
    LabelArity {
        metric: String,
        expected: usize,
        got: usize,
    },
    #[error("metric not found: {0}")]
    NotFound(String),
    #[error("metric {metric} is a {actual}, not a {requested}")]
    KindMismatch {
        metric: String,
        actual: &'static str,
        requested: &'static str,
    },
    #[error("invalid value for metric {metric}: {value}")]
    InvalidValue { metric: String, value: f64 },
    #[error("config: {0}")]
    Config(String),
    #[error("internal: {0}")]
    Internal(String),
}

impl MonitorError {
    /// Map the error to its stable code.
    pub fn code(&self) -> ErrorCode {
        match self {
            MonitorError::DuplicateName(_) => ErrorCode::DuplicateName,
            MonitorError::InvalidDefinition { .. } => ErrorCode::InvalidDefinition,
            MonitorError::LabelArity { .. } => ErrorCode::LabelArity,
            MonitorError::NotFound(_) => ErrorCode::NotFound,
            MonitorError::KindMismatch { .. } => ErrorCode::KindMismatch,
            MonitorError::InvalidValue { .. } => ErrorCode::InvalidValue,
            MonitorError::Config(_) => ErrorCode::Config,
            MonitorError::Internal(_) => ErrorCode::Internal,
        }
    }

    pub(crate) fn invalid_definition(name: &str, reason: impl Into<String>) -> Self {
        MonitorError::InvalidDefinition {
            name: name.to_string(),
            reason: reason.into(),
        }
    }
}
