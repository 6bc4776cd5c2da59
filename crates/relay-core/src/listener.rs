//! # Outbound Listener
//!
//! Forwards fire-and-forget messages from the backend to chat users.
//!
//! ```text
//! Broker topic ──▶ reader (decode) ──▶ bounded mpsc ──▶ worker ──▶ OutboundHandler
//! ```
//!
//! The reader never waits on delivery, and the worker delivers one message
//! at a time, so broker order is preserved end to end.

use crate::domain::OutboundMessage;
use crate::error::DeliveryError;
use async_trait::async_trait;
use relay_bus::{BrokerError, SharedBroker};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// Default capacity of the queue between reader and worker.
pub const DEFAULT_QUEUE_CAPACITY: usize = 256;

/// Delivers one outbound message to its target.
#[async_trait]
pub trait OutboundHandler: Send + Sync {
    /// Deliver `text` to `target_id`.
    async fn deliver(&self, target_id: i64, text: &str) -> Result<(), DeliveryError>;
}

/// Counters reported when the listener stops.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ListenerStats {
    /// Payloads read from the topic
    pub received: u64,
    /// Messages the handler accepted
    pub delivered: u64,
    /// Payloads that failed to decode
    pub malformed: u64,
    /// Messages the handler rejected
    pub failed: u64,
}

/// Subscribes to a topic and hands each decoded message to a handler.
pub struct OutboundListener {
    broker: SharedBroker,
    topic: String,
    queue_capacity: usize,
}

impl OutboundListener {
    /// Create a listener for `topic`.
    pub fn new(broker: SharedBroker, topic: impl Into<String>) -> Self {
        Self {
            broker,
            topic: topic.into(),
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }

    /// Override the reader/worker queue capacity (minimum 1).
    #[must_use]
    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity.max(1);
        self
    }

    /// Topic this listener reads from.
    #[must_use]
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Run until the subscription ends.
    ///
    /// Malformed payloads and handler failures are logged and skipped. In
    /// production the subscription never ends on its own; the runtime
    /// cancels this future at shutdown.
    ///
    /// # Errors
    ///
    /// Returns an error only if the subscription could not be established.
    pub async fn run<H>(self, handler: Arc<H>) -> Result<ListenerStats, BrokerError>
    where
        H: OutboundHandler + ?Sized + 'static,
    {
        let mut subscription = self.broker.subscribe(&self.topic).await?;
        info!(topic = %self.topic, "Outbound listener started");

        let (tx, rx) = mpsc::channel(self.queue_capacity);
        let worker = tokio::spawn(dispatch(rx, handler));

        let mut stats = ListenerStats::default();
        while let Some(payload) = subscription.recv().await {
            stats.received += 1;

            let message = match OutboundMessage::decode(&payload) {
                Ok(message) => message,
                Err(e) => {
                    stats.malformed += 1;
                    warn!(
                        topic = %self.topic,
                        error = %e,
                        bytes = payload.len(),
                        "Skipping malformed outbound message"
                    );
                    continue;
                }
            };

            if tx.send(message).await.is_err() {
                error!(topic = %self.topic, "Dispatch worker stopped unexpectedly");
                break;
            }
        }

        // Closing the queue lets the worker drain and exit
        drop(tx);
        match worker.await {
            Ok((delivered, failed)) => {
                stats.delivered = delivered;
                stats.failed = failed;
            }
            Err(e) => error!(error = %e, "Dispatch worker panicked"),
        }

        info!(
            topic = %self.topic,
            received = stats.received,
            delivered = stats.delivered,
            malformed = stats.malformed,
            failed = stats.failed,
            "Outbound listener stopped"
        );
        Ok(stats)
    }
}

/// Deliver queued messages one at a time. Returns `(delivered, failed)`.
async fn dispatch<H>(mut rx: mpsc::Receiver<OutboundMessage>, handler: Arc<H>) -> (u64, u64)
where
    H: OutboundHandler + ?Sized,
{
    let mut delivered = 0;
    let mut failed = 0;

    while let Some(message) = rx.recv().await {
        match handler.deliver(message.target_id, &message.text).await {
            Ok(()) => {
                delivered += 1;
                debug!(target_id = message.target_id, "Outbound message delivered");
            }
            Err(e) => {
                failed += 1;
                warn!(target_id = message.target_id, error = %e, "Outbound delivery failed");
            }
        }
    }

    (delivered, failed)
}
