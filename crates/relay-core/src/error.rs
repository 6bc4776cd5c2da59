//! Error types for the request/response engine and the outbound listener.

use relay_bus::BrokerError;
use std::time::Duration;
use thiserror::Error;

/// Errors returned by [`RequestEngine::send_and_wait`](crate::RequestEngine::send_and_wait)
/// and the services built on it.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RequestError {
    /// No correlated response arrived before the deadline.
    #[error("timeout waiting for response from {correlation_key} after {timeout:?}")]
    Timeout {
        /// Key that was waited on.
        correlation_key: String,
        /// Deadline the caller supplied.
        timeout: Duration,
    },

    /// Broker infrastructure failed during publish or consume.
    #[error("transport error: {0}")]
    Transport(BrokerError),

    /// The response payload was not what the caller expected.
    #[error("unexpected response on {correlation_key}: {reason}")]
    Decode {
        /// Key the response arrived on.
        correlation_key: String,
        /// What was wrong with it.
        reason: String,
    },

    /// The request envelope could not be serialized.
    #[error("failed to encode request: {0}")]
    Encode(String),

    /// Another caller in this process is already waiting on the key.
    #[error("correlation key {0} already has an outstanding wait")]
    CorrelationConflict(String),

    /// A zero timeout would never allow a response.
    #[error("timeout must be greater than zero")]
    InvalidTimeout,
}

impl RequestError {
    /// Whether the caller may reasonably retry later.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Timeout { .. } | Self::Transport(_) | Self::CorrelationConflict(_)
        )
    }
}

impl From<serde_json::Error> for RequestError {
    fn from(err: serde_json::Error) -> Self {
        Self::Encode(err.to_string())
    }
}

/// Errors from decoding an outbound payload.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// Payload was not valid JSON of the expected shape.
    #[error("malformed outbound message: {0}")]
    Malformed(#[from] serde_json::Error),

    /// Neither `chat_id` nor `user_id` was present.
    #[error("outbound message has no chat_id or user_id")]
    MissingTarget,
}

/// Error reported by an [`OutboundHandler`](crate::OutboundHandler).
#[derive(Debug, Error)]
#[error("delivery to {target_id} failed: {reason}")]
pub struct DeliveryError {
    /// Target the message was addressed to.
    pub target_id: i64,
    /// Why delivery failed.
    pub reason: String,
}

impl DeliveryError {
    /// Create a delivery error.
    pub fn new(target_id: i64, reason: impl std::fmt::Display) -> Self {
        Self {
            target_id,
            reason: reason.to_string(),
        }
    }
}
