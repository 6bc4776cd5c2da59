//! # In-Memory Broker
//!
//! Single-process implementation of [`BrokerClient`].
//!
//! Topics use `tokio::sync::broadcast` for multi-producer, multi-consumer
//! fan-out. Queues are `VecDeque`s paired with a `Notify` so blocked pops
//! wake as soon as a payload is pushed.

use crate::client::BrokerClient;
use crate::error::BrokerError;
use crate::subscription::Subscription;
use crate::DEFAULT_CHANNEL_CAPACITY;
use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, Notify};
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;
use tracing::debug;

/// A point-to-point queue.
#[derive(Default)]
struct Queue {
    items: Mutex<VecDeque<Vec<u8>>>,
    notify: Notify,
}

impl Queue {
    async fn pop(&self) -> Vec<u8> {
        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            // Register before checking so a push between the check and the
            // await is not missed.
            notified.as_mut().enable();

            if let Some(item) = self.items.lock().pop_front() {
                return item;
            }
            notified.await;
        }
    }
}

/// A queue held by one blocked pop.
///
/// Dropping the lease (pop finished, timed out or cancelled) removes the
/// queue from the broker once it is empty and nobody else holds it.
struct QueueLease<'a> {
    broker: &'a InMemoryBroker,
    destination: &'a str,
    queue: Option<Arc<Queue>>,
}

impl<'a> QueueLease<'a> {
    fn new(broker: &'a InMemoryBroker, destination: &'a str) -> Self {
        Self {
            broker,
            destination,
            queue: Some(broker.queue(destination)),
        }
    }

    async fn pop(&self) -> Vec<u8> {
        match &self.queue {
            Some(queue) => queue.pop().await,
            // Only taken on drop
            None => std::future::pending().await,
        }
    }
}

impl Drop for QueueLease<'_> {
    fn drop(&mut self) {
        drop(self.queue.take());

        // Clones are only handed out under this lock
        let mut queues = self.broker.queues.lock();
        let idle = queues
            .get(self.destination)
            .is_some_and(|queue| Arc::strong_count(queue) == 1 && queue.items.lock().is_empty());
        if idle {
            queues.remove(self.destination);
        }
    }
}

/// In-memory implementation of the broker.
pub struct InMemoryBroker {
    /// Broadcast sender per topic.
    topics: RwLock<HashMap<String, broadcast::Sender<Vec<u8>>>>,

    /// Queues by destination name.
    queues: Mutex<HashMap<String, Arc<Queue>>>,

    /// Total payloads published (fan-out), including undelivered ones.
    messages_published: AtomicU64,

    /// Per-topic channel capacity.
    capacity: usize,
}

impl InMemoryBroker {
    /// Create a new in-memory broker with default capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    /// Create a new in-memory broker with specified per-topic capacity.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            topics: RwLock::new(HashMap::new()),
            queues: Mutex::new(HashMap::new()),
            messages_published: AtomicU64::new(0),
            capacity,
        }
    }

    /// Declare `topic` if absent and return its sender.
    fn topic(&self, topic: &str) -> broadcast::Sender<Vec<u8>> {
        if let Some(sender) = self.topics.read().get(topic) {
            return sender.clone();
        }
        self.topics
            .write()
            .entry(topic.to_string())
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .clone()
    }

    /// Declare queue `destination` if absent and return it.
    fn queue(&self, destination: &str) -> Arc<Queue> {
        self.queues
            .lock()
            .entry(destination.to_string())
            .or_default()
            .clone()
    }

    /// Close `topic`, ending every live subscription to it once buffered
    /// payloads have been drained.
    ///
    /// Returns `false` if the topic was never declared.
    pub fn close_topic(&self, topic: &str) -> bool {
        let removed = self.topics.write().remove(topic).is_some();
        if removed {
            debug!(topic = %topic, "Topic closed");
        }
        removed
    }

    /// Get the number of live subscribers on `topic`.
    #[must_use]
    pub fn subscriber_count(&self, topic: &str) -> usize {
        self.topics
            .read()
            .get(topic)
            .map_or(0, broadcast::Sender::receiver_count)
    }

    /// Get the number of payloads waiting in queue `destination`.
    #[must_use]
    pub fn queue_len(&self, destination: &str) -> usize {
        self.queues
            .lock()
            .get(destination)
            .map_or(0, |queue| queue.items.lock().len())
    }

    /// Get the total number of payloads published.
    #[must_use]
    pub fn messages_published(&self) -> u64 {
        self.messages_published.load(Ordering::Relaxed)
    }

    /// Get the per-topic channel capacity.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for InMemoryBroker {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BrokerClient for InMemoryBroker {
    async fn publish(&self, destination: &str, payload: &[u8]) -> Result<usize, BrokerError> {
        let sender = self.topic(destination);

        // Always increment counter (publish was attempted)
        self.messages_published.fetch_add(1, Ordering::Relaxed);

        match sender.send(payload.to_vec()) {
            Ok(receivers) => {
                debug!(
                    destination = %destination,
                    receivers = receivers,
                    bytes = payload.len(),
                    "Payload published"
                );
                Ok(receivers)
            }
            Err(_) => {
                // No subscribers - payload is dropped, as on a real broker
                debug!(destination = %destination, "Payload dropped (no subscribers)");
                Ok(0)
            }
        }
    }

    async fn push(&self, destination: &str, payload: &[u8]) -> Result<(), BrokerError> {
        let queue = self.queue(destination);
        queue.items.lock().push_back(payload.to_vec());
        queue.notify.notify_one();

        debug!(destination = %destination, bytes = payload.len(), "Payload queued");
        Ok(())
    }

    async fn blocking_pop(
        &self,
        destination: &str,
        timeout: Duration,
    ) -> Result<Vec<u8>, BrokerError> {
        let lease = QueueLease::new(self, destination);
        let popped = tokio::time::timeout(timeout, lease.pop()).await;
        drop(lease);

        popped.map_err(|_| BrokerError::Timeout {
            destination: destination.to_string(),
            timeout,
        })
    }

    async fn subscribe(&self, topic: &str) -> Result<Subscription, BrokerError> {
        let receiver = self.topic(topic).subscribe();
        let lag_topic = topic.to_string();

        let stream = BroadcastStream::new(receiver).filter_map(move |item| match item {
            Ok(payload) => Some(payload),
            Err(BroadcastStreamRecvError::Lagged(count)) => {
                debug!(topic = %lag_topic, lagged = count, "Subscriber lagged, payloads dropped");
                None
            }
        });

        debug!(topic = %topic, "New subscription created");
        Ok(Subscription::new(topic, stream))
    }
}
