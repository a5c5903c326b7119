//! Dispatcher error types

use std::time::Duration;

use thiserror::Error;

/// Dispatcher-specific errors
#[derive(Debug, Error)]
pub enum DispatcherError {
    /// Write did not finish within the deadline
    #[error("write to subscriber '{subscriber}' timed out after {timeout:?}")]
    WriteTimeout { subscriber: String, timeout: Duration },

    /// Write failed (from contract)
    #[error("write to subscriber '{subscriber}' failed: {source}")]
    Write {
        subscriber: String,
        #[source]
        source: contracts::ContractError,
    },

    /// Listener could not be bound
    #[error("failed to bind listener on '{addr}': {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// Dispatcher loop has stopped
    #[error("dispatcher is closed")]
    Closed,
}

impl DispatcherError {
    pub fn write_timeout(subscriber: impl Into<String>, timeout: Duration) -> Self {
        Self::WriteTimeout {
            subscriber: subscriber.into(),
            timeout,
        }
    }

    pub fn write(subscriber: impl Into<String>, source: contracts::ContractError) -> Self {
        Self::Write {
            subscriber: subscriber.into(),
            source,
        }
    }

    pub fn bind(addr: impl Into<String>, source: std::io::Error) -> Self {
        Self::Bind {
            addr: addr.into(),
            source,
        }
    }

    /// Eviction reason label for metrics
    pub fn reason(&self) -> &'static str {
        match self {
            Self::WriteTimeout { .. } => "timeout",
            Self::Write { .. } => "write_error",
            Self::Bind { .. } => "bind",
            Self::Closed => "closed",
        }
    }
}
