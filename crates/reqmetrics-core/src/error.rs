//! Shared error type across reqmetrics crates.

use thiserror::Error;

/// Stable error codes surfaced in logs and endpoint bodies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    /// Invalid configuration or malformed input.
    BadConfig,
    /// Report serialization failed.
    Serialize,
    /// Internal error.
    Internal,
}

impl ErrorCode {
    /// String representation used in logs and responses.
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::BadConfig => "BAD_CONFIG",
            ErrorCode::Serialize => "SERIALIZE",
            ErrorCode::Internal => "INTERNAL",
        }
    }
}

/// Shared result type.
pub type Result<T> = std::result::Result<T, ReqMetricsError>;

/// Unified error type used by core and the axum integration.
#[derive(Debug, Error)]
pub enum ReqMetricsError {
    #[error("bad config: {0}")]
    BadConfig(String),
    #[error("serialize: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("internal: {0}")]
    Internal(String),
}

impl ReqMetricsError {
    /// Map the error to its stable code.
    pub fn code(&self) -> ErrorCode {
        match self {
            ReqMetricsError::BadConfig(_) => ErrorCode::BadConfig,
            ReqMetricsError::Serialize(_) => ErrorCode::Serialize,
            ReqMetricsError::Internal(_) => ErrorCode::Internal,
        }
    }
}
