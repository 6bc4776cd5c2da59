//! # Notification Relay Runtime
//!
//! Runs the chat bot on top of the relay core.
//!
//! ## Tasks
//!
//! ```text
//! Telegram ──getUpdates──▶ UpdatePoller ──▶ BotHandler ──▶ UserService
//!                                                              │
//!                                          publish(bot_requests)│ blocking_pop(key)
//!                                                              ▼
//!                                                           Broker
//!                                                              │
//! Telegram ◀──sendMessage── TelegramDelivery ◀── OutboundListener (api_requests)
//! ```
//!
//! ## Startup Sequence
//!
//! 1. Load configuration from the environment
//! 2. Connect to the broker
//! 3. Spawn the update poller and the outbound listener
//! 4. Wait for Ctrl+C, then signal shutdown and drain

pub mod config;
pub mod handlers;
pub mod poller;
pub mod telegram;

pub use config::{ConfigError, RelayConfig};
pub use handlers::{BotHandler, TelegramDelivery};
pub use poller::UpdatePoller;
pub use telegram::{ChatApi, TelegramClient, TelegramError};

use anyhow::{Context, Result};
use relay_bus::{RedisBroker, SharedBroker};
use relay_core::{EngineStatsSnapshot, OutboundListener, RequestEngine, UserService};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// How long `shutdown` waits for each task to finish.
pub const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Install the global tracing subscriber.
///
/// # Errors
///
/// Returns `Err` if a global subscriber is already installed.
pub fn init_tracing(config: &RelayConfig) -> Result<()> {
    let filter = EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true);

    if config.json_logs {
        tracing::subscriber::set_global_default(builder.json().finish())?;
    } else {
        tracing::subscriber::set_global_default(builder.finish())?;
    }
    Ok(())
}

/// The relay runtime: broker, engine and long-running tasks.
pub struct RelayRuntime {
    config: RelayConfig,
    broker: SharedBroker,
    api: Arc<dyn ChatApi>,
    engine: Arc<RequestEngine>,
    shutdown_tx: watch::Sender<bool>,
    tasks: Vec<JoinHandle<()>>,
}

impl RelayRuntime {
    /// Create a runtime over an existing broker and chat client.
    pub fn new(config: RelayConfig, broker: SharedBroker, api: Arc<dyn ChatApi>) -> Self {
        let engine = Arc::new(RequestEngine::new(Arc::clone(&broker)));
        let (shutdown_tx, _) = watch::channel(false);

        Self {
            config,
            broker,
            api,
            engine,
            shutdown_tx,
            tasks: Vec::new(),
        }
    }

    /// Connect to the configured broker and chat platform.
    ///
    /// # Errors
    ///
    /// Returns `Err` if the broker is unreachable or the HTTP client cannot
    /// be built.
    pub async fn connect(config: RelayConfig) -> Result<Self> {
        let broker = RedisBroker::connect(&config.redis_url)
            .await
            .with_context(|| {
                format!(
                    "Failed to connect to broker at {}",
                    crate::config::redact_url(&config.redis_url)
                )
            })?;
        let api = TelegramClient::new(&config.telegram_api_url, &config.telegram_token)
            .context("Failed to build chat platform client")?;

        Ok(Self::new(config, Arc::new(broker), Arc::new(api)))
    }

    /// User service configured from this runtime's settings.
    pub fn user_service(&self) -> UserService {
        UserService::new(Arc::clone(&self.engine), &self.config.request_channel)
            .with_strategy(self.config.correlation)
            .with_timeout(self.config.request_timeout)
    }

    /// Current request engine counters.
    pub fn engine_stats(&self) -> EngineStatsSnapshot {
        self.engine.stats()
    }

    /// Spawn the update poller and the outbound listener.
    pub fn start(&mut self) {
        info!("===========================================");
        info!("  Notification Relay v{}", env!("CARGO_PKG_VERSION"));
        info!("===========================================");
        info!(
            request_channel = %self.config.request_channel,
            outbound_channel = %self.config.outbound_channel,
            correlation = ?self.config.correlation,
            timeout_ms = self.config.request_timeout.as_millis(),
            "Relay starting"
        );

        // Update poller
        let handler = Arc::new(BotHandler::new(Arc::clone(&self.api), self.user_service()));
        let poller = UpdatePoller::new(Arc::clone(&self.api), handler, self.config.poll_timeout);
        self.tasks.push(tokio::spawn(poller.run(self.shutdown_tx.subscribe())));

        // Outbound listener
        let listener =
            OutboundListener::new(Arc::clone(&self.broker), &self.config.outbound_channel);
        let delivery = Arc::new(TelegramDelivery::new(Arc::clone(&self.api)));
        let mut listener_shutdown = self.shutdown_tx.subscribe();
        self.tasks.push(tokio::spawn(async move {
            tokio::select! {
                result = listener.run(delivery) => match result {
                    Ok(stats) => warn!(?stats, "Outbound subscription ended"),
                    Err(e) => error!(error = %e, "Outbound listener failed to subscribe"),
                },
                _ = listener_shutdown.changed() => {
                    info!("Outbound listener shutdown signal received");
                }
            }
        }));

        info!("Relay running");
    }

    /// Signal every task to stop and wait for them.
    pub async fn shutdown(mut self) {
        info!("Initiating graceful shutdown...");

        // send_replace never fails, even with no receivers left
        self.shutdown_tx.send_replace(true);

        for task in self.tasks.drain(..) {
            match tokio::time::timeout(SHUTDOWN_GRACE, task).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => error!(error = %e, "Task panicked"),
                Err(_) => warn!("Task did not stop within grace period"),
            }
        }

        let stats = self.engine.stats();
        info!(
            requests_sent = stats.requests_sent,
            responses_received = stats.responses_received,
            timeouts = stats.timeouts,
            transport_errors = stats.transport_errors,
            "Shutdown complete"
        );
    }
}
