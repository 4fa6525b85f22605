//! Pool and driver error types.

use std::time::Duration;

use chrono::{DateTime, Utc};
use thiserror::Error;

/// Errors that can occur during pool operations.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum PoolError {
    /// No healthy idle connection exists, capacity is used up and the pool
    /// was told to fail instead of handing out an overflow connection.
    #[error("at {at}, all connections of pool '{pool}' are busy")]
    PoolExhausted {
        /// Name of the pool that rejected the request.
        pool: String,
        /// When the request was rejected.
        at: DateTime<Utc>,
    },

    /// The driver could not open or authenticate a new session.
    #[error("failed to connect to {uri}: {source}")]
    ConnectFailed {
        /// Endpoint the pool tried to reach.
        uri: String,
        /// Underlying driver failure.
        #[source]
        source: DriverError,
    },

    /// Pool is closed.
    #[error("pool is closed")]
    PoolClosed,

    /// Pool configuration error.
    #[error("pool configuration error: {0}")]
    Configuration(String),
}

impl PoolError {
    /// Build a [`PoolError::PoolExhausted`] stamped with the current time.
    pub fn exhausted(pool: impl Into<String>) -> Self {
        Self::PoolExhausted {
            pool: pool.into(),
            at: Utc::now(),
        }
    }

    /// Check if this error is transient and may succeed on retry.
    ///
    /// An exhausted pool frees up as soon as a holder releases a
    /// connection; connect timeouts and unreachable endpoints may recover on
    /// their own. Authentication and configuration errors will not.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::PoolExhausted { .. } => true,
            Self::ConnectFailed { source, .. } => source.is_transient(),
            Self::PoolClosed | Self::Configuration(_) => false,
        }
    }
}

/// Errors reported by a [`Driver`](crate::Driver) implementation.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum DriverError {
    /// The endpoint could not be reached or refused the session.
    #[error("connection failed: {0}")]
    Connect(String),

    /// The endpoint rejected the credentials.
    #[error("authentication failed: {0}")]
    Authentication(String),

    /// An established session stopped answering.
    #[error("session unreachable: {0}")]
    Unreachable(String),

    /// The operation did not finish within the pool timeout.
    #[error("operation timed out after {0:?}")]
    Timeout(Duration),

    /// The session was already closed.
    #[error("session closed")]
    Closed,
}

impl DriverError {
    /// Check if this error is transient and may succeed on retry.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Connect(_) | Self::Unreachable(_) | Self::Timeout(_)
        )
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_exhausted_message_names_pool() {
        let err = PoolError::exhausted("orders");
        let msg = err.to_string();
        assert!(msg.contains("orders"));
        assert!(msg.contains("are busy"));
        assert!(err.is_transient());
    }

    #[test]
    fn test_connect_failed_keeps_source() {
        let err = PoolError::ConnectFailed {
            uri: "mongodb://db:27017".into(),
            source: DriverError::Timeout(Duration::from_secs(3)),
        };
        assert!(err.to_string().contains("mongodb://db:27017"));
        let source = std::error::Error::source(&err).unwrap();
        assert!(source.to_string().contains("timed out"));
        assert!(err.is_transient());
    }

    #[test]
    fn test_authentication_is_not_transient() {
        let err = PoolError::ConnectFailed {
            uri: "mongodb://db".into(),
            source: DriverError::Authentication("bad password".into()),
        };
        assert!(!err.is_transient());
        assert!(!PoolError::PoolClosed.is_transient());
        assert!(!PoolError::Configuration("x".into()).is_transient());
    }
}
