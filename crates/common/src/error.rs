//! Error types for curio.

use thiserror::Error;

/// Application result type.
pub type AppResult<T> = Result<T, AppError>;

/// Application error type.
///
/// The pipeline cares about three broad classes of failure:
/// invalid input (never retried), missing aggregates (skipped), and
/// transient infrastructure trouble (retried by the queue's backoff
/// policy). [`AppError::is_retryable`] encodes that split for the
/// dispatcher.
#[derive(Debug, Error)]
pub enum AppError {
    // === Caller Errors ===
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    /// The external record publisher requires re-authentication.
    ///
    /// Must propagate unchanged to the command layer; never treated as
    /// transient and never silently retried.
    #[error("Authentication required: {0}")]
    AuthenticationRequired(String),

    // === Infrastructure Errors ===
    #[error("Database error: {0}")]
    Database(String),

    #[error("Redis error: {0}")]
    Redis(String),

    #[error("Queue error: {0}")]
    Queue(String),

    #[error("Lock error: {0}")]
    Lock(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Returns the error code used in structured logs.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::NotFound(_) => "NOT_FOUND",
            Self::Conflict(_) => "CONFLICT",
            Self::AuthenticationRequired(_) => "AUTHENTICATION_REQUIRED",
            Self::Database(_) => "DATABASE_ERROR",
            Self::Redis(_) => "REDIS_ERROR",
            Self::Queue(_) => "QUEUE_ERROR",
            Self::Lock(_) => "LOCK_ERROR",
            Self::Config(_) => "CONFIG_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Whether a job failing with this error should be retried.
    ///
    /// Validation failures will fail the same way on every attempt;
    /// a missing aggregate is a skip, not a failure. Everything
    /// infrastructure-shaped is assumed transient.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::Validation(_)
            | Self::NotFound(_)
            | Self::Conflict(_)
            | Self::AuthenticationRequired(_)
            | Self::Config(_) => false,
            Self::Database(_)
            | Self::Redis(_)
            | Self::Queue(_)
            | Self::Lock(_)
            | Self::Internal(_) => true,
        }
    }
}

// === From implementations ===

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        Self::Config(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        Self::Validation(err.to_string())
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_is_not_retryable() {
        assert!(!AppError::Validation("bad id".to_string()).is_retryable());
        assert!(!AppError::NotFound("card".to_string()).is_retryable());
        assert!(!AppError::AuthenticationRequired("session expired".to_string()).is_retryable());
    }

    #[test]
    fn test_infrastructure_is_retryable() {
        assert!(AppError::Database("connection reset".to_string()).is_retryable());
        assert!(AppError::Redis("timeout".to_string()).is_retryable());
        assert!(AppError::Queue("push failed".to_string()).is_retryable());
        assert!(AppError::Lock("contended".to_string()).is_retryable());
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(
            AppError::AuthenticationRequired("x".to_string()).error_code(),
            "AUTHENTICATION_REQUIRED"
        );
        assert_eq!(AppError::Lock("x".to_string()).error_code(), "LOCK_ERROR");
    }
}
