//! # Broker Client
//!
//! The port every relay component talks to. Implementations own the
//! transport connection; callers share one instance behind an `Arc`.

use crate::error::BrokerError;
use crate::subscription::Subscription;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

/// Shared handle to a broker client, constructed once at process start.
pub type SharedBroker = Arc<dyn BrokerClient>;

/// Publish/queue/subscribe primitives of the message broker.
#[async_trait]
pub trait BrokerClient: Send + Sync {
    /// Fan `payload` out to every current subscriber of `destination`.
    ///
    /// The destination is declared if absent. Identical payloads published
    /// twice are delivered twice.
    ///
    /// # Returns
    ///
    /// The number of subscribers that received the payload.
    async fn publish(&self, destination: &str, payload: &[u8]) -> Result<usize, BrokerError>;

    /// Append `payload` to the queue `destination`.
    ///
    /// Unlike [`publish`](Self::publish), the payload waits for a future
    /// consumer.
    async fn push(&self, destination: &str, payload: &[u8]) -> Result<(), BrokerError>;

    /// Remove and return the oldest payload in the queue `destination`,
    /// waiting up to `timeout` for one to arrive.
    ///
    /// # Errors
    ///
    /// - [`BrokerError::Timeout`] if nothing arrived in time
    /// - [`BrokerError::Transport`] if the broker failed
    async fn blocking_pop(
        &self,
        destination: &str,
        timeout: Duration,
    ) -> Result<Vec<u8>, BrokerError>;

    /// Subscribe to payloads published to `topic` from now on.
    async fn subscribe(&self, topic: &str) -> Result<Subscription, BrokerError>;
}
