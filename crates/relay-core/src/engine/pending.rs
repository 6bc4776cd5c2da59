//! Outstanding waits - one blocked caller per correlation key.
//!
//! A wait is registered when a request is sent and removed when its guard
//! drops: on response, on deadline, or when the caller's future is
//! cancelled. Nothing is persisted.

use crate::error::RequestError;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::time::Instant;
use tracing::{debug, warn};

/// A registered wait.
#[derive(Debug, Clone)]
struct Wait {
    /// Operation type (for logging)
    op: String,
    /// When the request was sent
    created_at: Instant,
}

/// Counters for the request/response engine.
#[derive(Debug, Default)]
pub struct EngineStats {
    /// Requests published
    pub requests_sent: AtomicU64,
    /// Responses received before the deadline
    pub responses_received: AtomicU64,
    /// Waits that hit their deadline
    pub timeouts: AtomicU64,
    /// Publish or consume failures
    pub transport_errors: AtomicU64,
    /// Requests refused because the key was already awaited
    pub conflicts: AtomicU64,
}

/// Point-in-time copy of [`EngineStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EngineStatsSnapshot {
    pub requests_sent: u64,
    pub responses_received: u64,
    pub timeouts: u64,
    pub transport_errors: u64,
    pub conflicts: u64,
}

impl EngineStats {
    /// Copy the current counter values.
    #[must_use]
    pub fn snapshot(&self) -> EngineStatsSnapshot {
        EngineStatsSnapshot {
            requests_sent: self.requests_sent.load(Ordering::Relaxed),
            responses_received: self.responses_received.load(Ordering::Relaxed),
            timeouts: self.timeouts.load(Ordering::Relaxed),
            transport_errors: self.transport_errors.load(Ordering::Relaxed),
            conflicts: self.conflicts.load(Ordering::Relaxed),
        }
    }
}

/// Registry of correlation keys with a blocked caller.
///
/// Flow:
/// 1. Engine calls `register()` before publishing
/// 2. Engine publishes and waits on the key
/// 3. The returned guard is settled (`completed`, `timed_out`, `failed`)
///    and dropped, which frees the key
#[derive(Debug, Default)]
pub struct OutstandingWaits {
    /// Map of correlation key to wait
    waits: DashMap<String, Wait>,
    /// Statistics
    stats: EngineStats,
}

impl OutstandingWaits {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a wait on `key` until `deadline`.
    ///
    /// # Errors
    ///
    /// [`RequestError::CorrelationConflict`] if another caller already waits
    /// on `key`.
    pub fn register(
        &self,
        key: &str,
        op: &str,
        deadline: Instant,
    ) -> Result<WaitGuard<'_>, RequestError> {
        match self.waits.entry(key.to_string()) {
            Entry::Occupied(existing) => {
                self.stats.conflicts.fetch_add(1, Ordering::Relaxed);
                warn!(
                    correlation_key = %key,
                    op = op,
                    waiting_op = %existing.get().op,
                    "Correlation key already has an outstanding wait"
                );
                Err(RequestError::CorrelationConflict(key.to_string()))
            }
            Entry::Vacant(slot) => {
                let now = Instant::now();
                slot.insert(Wait {
                    op: op.to_string(),
                    created_at: now,
                });
                debug!(
                    correlation_key = %key,
                    op = op,
                    budget_ms = deadline.saturating_duration_since(now).as_millis(),
                    "Registered outstanding wait"
                );
                Ok(WaitGuard {
                    waits: self,
                    key: key.to_string(),
                })
            }
        }
    }

    /// Get number of currently outstanding waits
    pub fn pending_count(&self) -> usize {
        self.waits.len()
    }

    /// Get statistics
    pub fn stats(&self) -> &EngineStats {
        &self.stats
    }
}

/// Holds a key registered in [`OutstandingWaits`]; dropping it frees the key.
#[derive(Debug)]
pub struct WaitGuard<'a> {
    waits: &'a OutstandingWaits,
    key: String,
}

impl WaitGuard<'_> {
    /// Record that the request was published.
    pub fn sent(&self) {
        self.waits
            .stats
            .requests_sent
            .fetch_add(1, Ordering::Relaxed);
    }

    /// Settle as answered.
    pub fn completed(self) {
        self.waits
            .stats
            .responses_received
            .fetch_add(1, Ordering::Relaxed);
        if let Some(wait) = self.waits.waits.get(&self.key) {
            debug!(
                correlation_key = %self.key,
                op = %wait.op,
                response_time_ms = wait.created_at.elapsed().as_millis(),
                "Outstanding wait answered"
            );
        }
    }

    /// Settle as expired.
    pub fn timed_out(self) {
        self.waits.stats.timeouts.fetch_add(1, Ordering::Relaxed);
    }

    /// Settle as failed by the transport.
    pub fn failed(self) {
        self.waits
            .stats
            .transport_errors
            .fetch_add(1, Ordering::Relaxed);
    }
}

impl Drop for WaitGuard<'_> {
    fn drop(&mut self) {
        self.waits.waits.remove(&self.key);
    }
}
