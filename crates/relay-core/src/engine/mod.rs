//! # Correlated Request/Response Engine
//!
//! Request/reply on top of a fire-and-forget broker.
//!
//! ## Exchange
//!
//! ```text
//! caller ──send_and_wait──▶ RequestEngine
//!                              │ 1. deadline = now + timeout
//!                              │ 2. publish(request_destination, envelope)
//!                              ▼
//!                          ┌────────┐        ┌───────────┐
//!                          │ Broker │ ─────▶ │ Responder │
//!                          └────────┘ ◀───── └───────────┘
//!                              │        push(correlation_key, value)
//!                              │ 3. blocking_pop(correlation_key) until deadline
//!                              ▼
//! caller ◀── value | Timeout | Transport | Decode
//! ```
//!
//! The correlation key is the only link between request and response. The
//! engine refuses to let two callers in this process wait on the same key.

pub mod pending;

pub use pending::{EngineStats, EngineStatsSnapshot, OutstandingWaits, WaitGuard};

use crate::domain::{CorrelationKey, RequestEnvelope, ResponseValue};
use crate::error::RequestError;
use relay_bus::{BrokerError, SharedBroker};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, instrument, warn};

/// How long past the deadline the exchange may run to collect a response
/// the broker popped right at the deadline. The pop itself never waits past
/// the deadline.
pub const RESPONSE_GRACE: Duration = Duration::from_millis(250);

/// Publishes requests and waits for their correlated responses.
pub struct RequestEngine {
    /// Broker client shared with the rest of the process
    broker: SharedBroker,
    /// Keys with a blocked caller
    waits: OutstandingWaits,
}

impl RequestEngine {
    /// Create an engine on top of `broker`.
    pub fn new(broker: SharedBroker) -> Self {
        Self {
            broker,
            waits: OutstandingWaits::new(),
        }
    }

    /// Publish `envelope` to `request_destination` and wait for the value
    /// deposited at `correlation_key`.
    ///
    /// The deadline is fixed before publishing, so `timeout` bounds the whole
    /// exchange rather than only the wait. A transport that stalls is cut off
    /// [`RESPONSE_GRACE`] after the deadline.
    ///
    /// # Errors
    ///
    /// - [`RequestError::Timeout`] if nothing arrived before the deadline
    /// - [`RequestError::Transport`] if publish or pop failed
    /// - [`RequestError::Decode`] if the response is not UTF-8
    /// - [`RequestError::CorrelationConflict`] if the key is already awaited
    /// - [`RequestError::InvalidTimeout`] if `timeout` is zero
    #[instrument(
        skip(self, envelope, correlation_key),
        fields(op = envelope.op(), correlation_key = %correlation_key)
    )]
    pub async fn send_and_wait(
        &self,
        request_destination: &str,
        correlation_key: &CorrelationKey,
        envelope: &RequestEnvelope,
        timeout: Duration,
    ) -> Result<ResponseValue, RequestError> {
        if timeout.is_zero() {
            return Err(RequestError::InvalidTimeout);
        }

        // Timer starts before publish to bound end-to-end latency
        let deadline = Instant::now() + timeout;
        let key = correlation_key.as_str();

        let body = envelope.to_bytes()?;
        let guard = self.waits.register(key, envelope.op(), deadline)?;

        let exchange = async {
            let receivers = self.broker.publish(request_destination, &body).await?;
            guard.sent();

            if receivers == 0 {
                warn!(
                    destination = %request_destination,
                    "No subscribers on request destination; responder may not be running"
                );
            } else {
                debug!(destination = %request_destination, receivers, "Request published");
            }

            self.pop_until(key, deadline).await
        };

        let outcome = match tokio::time::timeout_at(deadline + RESPONSE_GRACE, exchange).await {
            Ok(result) => result,
            Err(_elapsed) => Err(BrokerError::Timeout {
                destination: key.to_string(),
                timeout,
            }),
        };

        match outcome {
            Ok(payload) => {
                guard.completed();
                ResponseValue::decode(key, payload)
            }
            Err(BrokerError::Timeout { .. }) => {
                guard.timed_out();
                warn!(timeout_ms = timeout.as_millis(), "No response before deadline");
                Err(RequestError::Timeout {
                    correlation_key: key.to_string(),
                    timeout,
                })
            }
            Err(err) => {
                guard.failed();
                warn!(error = %err, "Transport failure during request");
                Err(RequestError::Transport(err))
            }
        }
    }

    /// Pop from `key` until a payload arrives or `deadline` passes.
    ///
    /// A broker timeout that fires early (coarse server timers) re-arms the
    /// pop for the time that is left.
    async fn pop_until(&self, key: &str, deadline: Instant) -> Result<Vec<u8>, BrokerError> {
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(BrokerError::Timeout {
                    destination: key.to_string(),
                    timeout: remaining,
                });
            }

            match self.broker.blocking_pop(key, remaining).await {
                Err(err) if err.is_timeout() => continue,
                other => return other,
            }
        }
    }

    /// Outstanding waits (for diagnostics).
    pub fn waits(&self) -> &OutstandingWaits {
        &self.waits
    }

    /// Current engine counters.
    pub fn stats(&self) -> EngineStatsSnapshot {
        self.waits.stats().snapshot()
    }
}
