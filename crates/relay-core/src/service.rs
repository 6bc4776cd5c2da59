//! # User Service
//!
//! Domain calls to the backend, each a single correlated exchange through
//! the [`RequestEngine`].

use crate::domain::{CorrelationStrategy, RequestEnvelope, SignUp, UserExists};
use crate::engine::RequestEngine;
use crate::error::RequestError;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Prefix of the key a `user_exists` answer is deposited at.
pub const USER_EXISTS_RESPONSE: &str = "user_exists_response";

/// Prefix of the key a `sign_up` answer is deposited at.
pub const SIGN_UP_RESPONSE: &str = "sign_up_response";

/// Default time to wait for a backend answer.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(2);

/// Asks the backend about users.
#[derive(Clone)]
pub struct UserService {
    engine: Arc<RequestEngine>,
    request_destination: String,
    strategy: CorrelationStrategy,
    timeout: Duration,
}

impl UserService {
    /// Create a service publishing to `request_destination` with the default
    /// strategy and timeout.
    pub fn new(engine: Arc<RequestEngine>, request_destination: impl Into<String>) -> Self {
        Self {
            engine,
            request_destination: request_destination.into(),
            strategy: CorrelationStrategy::default(),
            timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    /// Use `strategy` to derive correlation keys.
    #[must_use]
    pub fn with_strategy(mut self, strategy: CorrelationStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Wait at most `timeout` for each answer.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Configured correlation strategy.
    #[must_use]
    pub fn strategy(&self) -> CorrelationStrategy {
        self.strategy
    }

    /// Configured answer timeout.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Ask whether `user_id` is registered.
    ///
    /// # Errors
    ///
    /// Any [`RequestError`] from the exchange, or `Decode` if the answer is
    /// not `true`/`false`.
    pub async fn check_user_exists(&self, user_id: i64) -> Result<bool, RequestError> {
        let exists = self
            .ask(USER_EXISTS_RESPONSE, user_id, UserExists { user_id }.into())
            .await?;
        info!(user_id, exists, "Checked user registration");
        Ok(exists)
    }

    /// Register a user from their shared contact.
    ///
    /// # Errors
    ///
    /// Same as [`check_user_exists`](Self::check_user_exists).
    pub async fn register_user(&self, sign_up: SignUp) -> Result<bool, RequestError> {
        let user_id = sign_up.user_id;
        let registered = self.ask(SIGN_UP_RESPONSE, user_id, sign_up.into()).await?;
        info!(user_id, registered, "Sign-up answered");
        Ok(registered)
    }

    async fn ask(
        &self,
        prefix: &str,
        user_id: i64,
        envelope: RequestEnvelope,
    ) -> Result<bool, RequestError> {
        let key = self.strategy.key(prefix, user_id);
        let envelope = if self.strategy.advertises_reply_to() {
            envelope.with_reply_to(key.as_str())
        } else {
            envelope
        };

        self.engine
            .send_and_wait(&self.request_destination, &key, &envelope, self.timeout)
            .await?
            .as_bool()
    }
}
