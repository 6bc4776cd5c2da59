//! # Relay Bus - Broker Client for the Notification Relay
//!
//! Owns the transport connection to the message broker and exposes the four
//! primitives the relay is built on.
//!
//! ## Primitives
//!
//! ```text
//!   publish(topic, payload)   ──fan-out──▶  every live subscriber of topic
//!   push(queue, payload)      ──enqueue──▶  queue (waits for a consumer)
//!   blocking_pop(queue, t)    ◀─dequeue──   oldest payload, or Timeout after t
//!   subscribe(topic)          ◀─stream───   payloads published after subscribing
//! ```
//!
//! ## Implementations
//!
//! - [`RedisBroker`]: `PUBLISH` / `RPUSH` / `BLPOP` / `SUBSCRIBE`
//! - [`InMemoryBroker`]: tokio broadcast channels and notified queues, for
//!   tests and single-process wiring
//!
//! Clients never reconnect. A failed connection surfaces as
//! [`BrokerError::Transport`] and the caller decides what to do.

// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

pub mod client;
pub mod error;
pub mod memory;
pub mod redis_broker;
pub mod subscription;

// Re-export main types
pub use client::{BrokerClient, SharedBroker};
pub use error::BrokerError;
pub use memory::InMemoryBroker;
pub use redis_broker::RedisBroker;
pub use subscription::Subscription;

/// Maximum payloads buffered per in-memory topic subscriber before lagging.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1000;
