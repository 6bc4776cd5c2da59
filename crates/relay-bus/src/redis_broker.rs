//! # Redis Broker
//!
//! Production [`BrokerClient`] backed by Redis.
//!
//! | Primitive      | Redis command | Connection                     |
//! |----------------|---------------|--------------------------------|
//! | `publish`      | `PUBLISH`     | shared multiplexed connection  |
//! | `push`         | `RPUSH`       | shared multiplexed connection  |
//! | `blocking_pop` | `BLPOP`       | dedicated, one per pop         |
//! | `subscribe`    | `SUBSCRIBE`   | dedicated pub/sub connection   |
//!
//! `BLPOP` blocks the whole connection server-side, so it never runs on the
//! shared connection. Redis creates lists and channels on first use, so no
//! explicit declaration is needed.

use crate::client::BrokerClient;
use crate::error::BrokerError;
use crate::subscription::Subscription;
use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::{AsyncCommands, Client};
use std::time::Duration;
use tokio_stream::StreamExt;
use tracing::{debug, info};

/// Extra time granted to the client side of a `BLPOP` beyond the server
/// timeout before the connection is abandoned.
const BLPOP_GRACE: Duration = Duration::from_secs(1);

/// Smallest timeout sent to Redis; `BLPOP 0` would block forever.
const MIN_BLPOP_TIMEOUT: Duration = Duration::from_millis(1);

/// Redis-backed broker client.
pub struct RedisBroker {
    /// Client used to open dedicated connections.
    client: Client,

    /// Shared connection for non-blocking commands.
    connection: MultiplexedConnection,
}

impl RedisBroker {
    /// Connect to the broker at `url` (`redis://[:password@]host:port[/db]`).
    ///
    /// # Errors
    ///
    /// Returns [`BrokerError::Transport`] if the URL is invalid or the broker
    /// is unreachable.
    pub async fn connect(url: &str) -> Result<Self, BrokerError> {
        let client = Client::open(url).map_err(|e| BrokerError::transport("<connect>", e))?;
        let address = client.get_connection_info().addr.to_string();

        let connection = client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| BrokerError::transport(address.as_str(), e))?;

        info!(address = %address, "Connected to Redis broker");
        Ok(Self { client, connection })
    }
}

#[async_trait]
impl BrokerClient for RedisBroker {
    async fn publish(&self, destination: &str, payload: &[u8]) -> Result<usize, BrokerError> {
        let mut conn = self.connection.clone();
        let receivers: usize = conn
            .publish(destination, payload)
            .await
            .map_err(|e| BrokerError::transport(destination, e))?;

        debug!(
            destination = %destination,
            receivers = receivers,
            bytes = payload.len(),
            "Payload published"
        );
        Ok(receivers)
    }

    async fn push(&self, destination: &str, payload: &[u8]) -> Result<(), BrokerError> {
        let mut conn = self.connection.clone();
        let _length: usize = conn
            .rpush(destination, payload)
            .await
            .map_err(|e| BrokerError::transport(destination, e))?;

        debug!(destination = %destination, bytes = payload.len(), "Payload queued");
        Ok(())
    }

    async fn blocking_pop(
        &self,
        destination: &str,
        timeout: Duration,
    ) -> Result<Vec<u8>, BrokerError> {
        let server_timeout = timeout.max(MIN_BLPOP_TIMEOUT);
        // Connection setup counts against the same client-side cut-off
        let pop = async {
            let mut conn = self.client.get_multiplexed_async_connection().await?;
            let popped: Option<(String, Vec<u8>)> =
                conn.blpop(destination, server_timeout.as_secs_f64()).await?;
            Ok::<_, redis::RedisError>(popped)
        };

        let popped = tokio::time::timeout(server_timeout + BLPOP_GRACE, pop)
            .await
            .map_err(|_| BrokerError::Timeout {
                destination: destination.to_string(),
                timeout,
            })?
            .map_err(|e| BrokerError::transport(destination, e))?;

        match popped {
            Some((_key, payload)) => Ok(payload),
            None => Err(BrokerError::Timeout {
                destination: destination.to_string(),
                timeout,
            }),
        }
    }

    async fn subscribe(&self, topic: &str) -> Result<Subscription, BrokerError> {
        let mut pubsub = self
            .client
            .get_async_pubsub()
            .await
            .map_err(|e| BrokerError::transport(topic, e))?;

        pubsub
            .subscribe(topic)
            .await
            .map_err(|e| BrokerError::transport(topic, e))?;

        debug!(topic = %topic, "Subscribed to Redis channel");

        let stream = pubsub
            .into_on_message()
            .map(|msg| msg.get_payload_bytes().to_vec());
        Ok(Subscription::new(topic, stream))
    }
}
