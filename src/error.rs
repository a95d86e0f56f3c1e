//! Error types for engine groups.
//!
//! This module defines all error types using `thiserror`. Conditions the crate
//! detects itself (bad descriptors, missing master, closed engines, deadlines)
//! get their own variants; everything else the driver reports is passed
//! through untouched in [`DbError::Driver`].

use std::fmt;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Connection failed: {message}")]
    Connection { message: String, suggestion: String },

    #[error("Timeout: {operation} exceeded {elapsed_ms}ms")]
    Timeout { operation: String, elapsed_ms: u64 },

    #[error("Engine '{engine}' is already closed")]
    AlreadyClosed { engine: String },

    #[error("Failed to close {} engine(s): {}", .failures.len(), CloseFailures(.failures))]
    PartialClose { failures: Vec<CloseFailure> },

    /// Driver error passed through unmodified.
    #[error(transparent)]
    Driver(#[from] sqlx::Error),
}

/// One engine that failed to close during a group teardown.
#[derive(Debug)]
pub struct CloseFailure {
    /// Display name of the engine, e.g. `slave[1] db2:3306/test`.
    pub engine: String,
    pub error: DbError,
}

struct CloseFailures<'a>(&'a [CloseFailure]);

impl fmt::Display for CloseFailures<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, failure) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, "; ")?;
            }
            write!(f, "{}: {}", failure.engine, failure.error)?;
        }
        Ok(())
    }
}

impl DbError {
    /// Create a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create a connection error with a helpful suggestion.
    pub fn connection(message: impl Into<String>, suggestion: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
            suggestion: suggestion.into(),
        }
    }

    /// Create a timeout error.
    pub fn timeout(operation: impl Into<String>, elapsed_ms: u64) -> Self {
        Self::Timeout {
            operation: operation.into(),
            elapsed_ms,
        }
    }

    /// Create an already-closed error.
    pub fn already_closed(engine: impl Into<String>) -> Self {
        Self::AlreadyClosed {
            engine: engine.into(),
        }
    }

    /// Get the suggestion for this error, if available.
    pub fn suggestion(&self) -> Option<&str> {
        match self {
            Self::Connection { suggestion, .. } => Some(suggestion),
            _ => None,
        }
    }

    /// Check if this error is retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Connection { .. } | Self::Timeout { .. })
    }

    /// Map pool-level sqlx errors onto the conditions this crate reports itself.
    ///
    /// `PoolTimedOut` becomes [`DbError::Timeout`] and `PoolClosed` becomes
    /// [`DbError::AlreadyClosed`]; every other driver error is kept as is.
    pub(crate) fn from_driver(err: sqlx::Error, engine: &str, timeout_ms: u64) -> Self {
        match err {
            sqlx::Error::PoolTimedOut => Self::timeout("connection pool acquire", timeout_ms),
            sqlx::Error::PoolClosed => Self::already_closed(engine),
            other => Self::Driver(other),
        }
    }
}

/// Result type alias for database operations.
pub type DbResult<T> = Result<T, DbError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = DbError::connection("Failed to connect", "Check credentials");
        assert!(err.to_string().contains("Connection failed"));
    }

    #[test]
    fn test_error_suggestion() {
        let err = DbError::connection("bad dsn", "Check the host");
        assert_eq!(err.suggestion(), Some("Check the host"));
        assert_eq!(DbError::configuration("x").suggestion(), None);
    }

    #[test]
    fn test_error_retryable() {
        assert!(DbError::timeout("query", 30).is_retryable());
        assert!(DbError::connection("err", "sugg").is_retryable());
        assert!(!DbError::configuration("missing host").is_retryable());
        assert!(!DbError::already_closed("master").is_retryable());
    }

    #[test]
    fn test_partial_close_lists_every_failure() {
        let err = DbError::PartialClose {
            failures: vec![
                CloseFailure {
                    engine: "slave[0] a:3306/db".to_string(),
                    error: DbError::already_closed("a:3306/db"),
                },
                CloseFailure {
                    engine: "slave[1] b:3306/db".to_string(),
                    error: DbError::already_closed("b:3306/db"),
                },
            ],
        };
        let msg = err.to_string();
        assert!(msg.contains("2 engine(s)"));
        assert!(msg.contains("slave[0]"));
        assert!(msg.contains("slave[1]"));
    }

    #[test]
    fn test_pool_errors_are_translated() {
        let err = DbError::from_driver(sqlx::Error::PoolTimedOut, "m", 500);
        assert!(matches!(err, DbError::Timeout { elapsed_ms: 500, .. }));

        let err = DbError::from_driver(sqlx::Error::PoolClosed, "m", 500);
        assert!(matches!(err, DbError::AlreadyClosed { .. }));

        let err = DbError::from_driver(sqlx::Error::RowNotFound, "m", 500);
        assert!(matches!(err, DbError::Driver(sqlx::Error::RowNotFound)));
    }
}
