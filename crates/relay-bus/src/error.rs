//! Broker error taxonomy.

use std::time::Duration;
use thiserror::Error;

/// Errors from broker operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BrokerError {
    /// The broker was unreachable or rejected the command.
    #[error("transport failure on '{destination}': {reason}")]
    Transport {
        /// Destination the failing operation targeted.
        destination: String,
        /// Underlying failure description.
        reason: String,
    },

    /// No message arrived on the destination before the timeout elapsed.
    #[error("no message on '{destination}' within {timeout:?}")]
    Timeout {
        /// Destination that was waited on.
        destination: String,
        /// How long the pop waited.
        timeout: Duration,
    },

    /// The broker (or the topic) was shut down.
    #[error("broker closed")]
    Closed,
}

impl BrokerError {
    /// Build a transport error for `destination` from any displayable cause.
    pub fn transport(destination: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Self::Transport {
            destination: destination.into(),
            reason: reason.to_string(),
        }
    }

    /// Whether this error is a timeout rather than an infrastructure failure.
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}
