//! # Update Poller
//!
//! Long-polls the chat platform and hands each update to the [`BotHandler`].
//! Updates are handled one at a time, in `update_id` order.

use crate::handlers::BotHandler;
use crate::telegram::ChatApi;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{info, instrument, warn};

/// Pause after a failed poll before trying again.
pub const ERROR_BACKOFF: Duration = Duration::from_secs(1);

/// Long-poll loop over the chat platform.
pub struct UpdatePoller {
    api: Arc<dyn ChatApi>,
    handler: Arc<BotHandler>,
    poll_timeout: Duration,
    /// Next `update_id` to ask for.
    offset: i64,
}

impl UpdatePoller {
    pub fn new(api: Arc<dyn ChatApi>, handler: Arc<BotHandler>, poll_timeout: Duration) -> Self {
        Self {
            api,
            handler,
            poll_timeout,
            offset: 0,
        }
    }

    /// Next update id to request.
    #[must_use]
    pub fn offset(&self) -> i64 {
        self.offset
    }

    /// Poll until `shutdown` flips to `true` or its sender is dropped.
    #[instrument(skip_all, name = "update_poller")]
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        info!(poll_timeout_secs = self.poll_timeout.as_secs(), "Update poller started");

        loop {
            if *shutdown.borrow() {
                break;
            }

            tokio::select! {
                _ = shutdown.changed() => {
                    // Sender dropped counts as shutdown
                    if *shutdown.borrow() || shutdown.has_changed().is_err() {
                        break;
                    }
                }
                polled = self.poll_once() => {
                    if !polled {
                        tokio::select! {
                            _ = shutdown.changed() => {}
                            _ = tokio::time::sleep(ERROR_BACKOFF) => {}
                        }
                    }
                }
            }
        }

        info!(offset = self.offset, "Update poller stopped");
    }

    /// Fetch and handle one batch. Returns `false` if the fetch failed.
    pub async fn poll_once(&mut self) -> bool {
        let updates = match self.api.get_updates(self.offset, self.poll_timeout).await {
            Ok(updates) => updates,
            Err(e) => {
                warn!(error = %e, offset = self.offset, "getUpdates failed");
                return false;
            }
        };

        for update in updates {
            self.offset = self.offset.max(update.update_id + 1);
            if let Err(e) = self.handler.handle(&update).await {
                warn!(update_id = update.update_id, error = %e, "Failed to reply to update");
            }
        }
        true
    }
}
