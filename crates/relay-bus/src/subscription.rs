//! # Subscription
//!
//! The receiving side of a topic subscription.

use std::fmt;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio_stream::{Stream, StreamExt};
use tracing::debug;

type PayloadStream = Pin<Box<dyn Stream<Item = Vec<u8>> + Send>>;

/// A live subscription to one topic.
///
/// Yields payloads in broker delivery order. Ends (`None`) when the broker
/// closes the topic or the connection drops. When dropped, the subscription
/// is released on the broker side.
pub struct Subscription {
    /// Topic this subscription listens on.
    topic: String,

    /// Underlying payload stream.
    inner: PayloadStream,
}

impl Subscription {
    /// Wrap a payload stream for `topic`.
    pub fn new<S>(topic: impl Into<String>, stream: S) -> Self
    where
        S: Stream<Item = Vec<u8>> + Send + 'static,
    {
        Self {
            topic: topic.into(),
            inner: Box::pin(stream),
        }
    }

    /// Receive the next payload.
    ///
    /// # Returns
    ///
    /// - `Some(payload)` - The next payload on the topic
    /// - `None` - The subscription ended
    pub async fn recv(&mut self) -> Option<Vec<u8>> {
        self.inner.next().await
    }

    /// Get the topic of this subscription.
    #[must_use]
    pub fn topic(&self) -> &str {
        &self.topic
    }
}

impl Stream for Subscription {
    type Item = Vec<u8>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.as_mut().poll_next(cx)
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("topic", &self.topic)
            .finish_non_exhaustive()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        debug!(topic = %self.topic, "Subscription dropped");
    }
}
