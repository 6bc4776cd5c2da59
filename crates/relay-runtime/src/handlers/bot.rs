//! Chat command handling.
//!
//! ## Flow
//!
//! ```text
//! /start ──▶ user_exists ──true──▶ "only registration for now"
//!                        ──false─▶ contact-request keyboard
//!                        ──error─▶ "please try again later"
//!
//! contact ──▶ sign_up ──true──▶ "you are registered"
//!                     ──else──▶ "please try again later"
//! ```

use crate::telegram::{ChatApi, Message, TelegramError, Update};
use relay_core::{RequestError, SignUp, UserService};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

pub const START_COMMAND: &str = "/start";

pub const ALREADY_REGISTERED: &str =
    "For now I can only register you. New features are on the way...";
pub const REQUEST_PHONE: &str = "Hi! To register I only need your phone number, \
    I will take care of the rest.\n\nTap \"📲 Share phone number\" to send it.";
pub const SHARE_PHONE_BUTTON: &str = "📲 Share phone number";
pub const CHECK_FAILED: &str = "Could not check your account. Please try again later.";
pub const REGISTERED: &str = "Thank you! You are registered.";
pub const REGISTRATION_FAILED: &str = "Registration failed. Please try again later.";

/// Reacts to incoming chat messages.
pub struct BotHandler {
    api: Arc<dyn ChatApi>,
    users: UserService,
}

impl BotHandler {
    pub fn new(api: Arc<dyn ChatApi>, users: UserService) -> Self {
        Self { api, users }
    }

    /// Handle one update. Updates without a message are ignored.
    ///
    /// # Errors
    ///
    /// Returns `Err` only if replying to the user failed. Backend failures
    /// are reported to the user instead.
    pub async fn handle(&self, update: &Update) -> Result<(), TelegramError> {
        let Some(message) = &update.message else {
            debug!(update_id = update.update_id, "Ignoring update without message");
            return Ok(());
        };

        if message.text.as_deref().map(str::trim) == Some(START_COMMAND) {
            return self.on_start(message).await;
        }
        if message.contact.is_some() {
            return self.on_contact(message).await;
        }

        debug!(chat_id = message.chat.id, "Ignoring message");
        Ok(())
    }

    async fn on_start(&self, message: &Message) -> Result<(), TelegramError> {
        let chat_id = message.chat.id;
        let Some(user) = &message.from else {
            return Ok(());
        };
        info!(user_id = user.id, "/start received");

        match self.users.check_user_exists(user.id).await {
            Ok(true) => self.api.send_message(chat_id, ALREADY_REGISTERED).await,
            Ok(false) => {
                info!(user_id = user.id, "Unknown user, requesting phone number");
                self.api
                    .request_contact(chat_id, REQUEST_PHONE, SHARE_PHONE_BUTTON)
                    .await
            }
            Err(e) => {
                log_backend_failure(user.id, &e, "Could not check user");
                self.api.send_message(chat_id, CHECK_FAILED).await
            }
        }
    }

    async fn on_contact(&self, message: &Message) -> Result<(), TelegramError> {
        let chat_id = message.chat.id;
        let (Some(user), Some(contact)) = (&message.from, &message.contact) else {
            return Ok(());
        };
        info!(user_id = user.id, "Contact received");

        let sign_up = SignUp {
            user_id: user.id,
            phone: contact.phone_number.clone(),
            name: user.first_name.clone(),
            username: user.username.clone(),
        };

        let reply = match self.users.register_user(sign_up).await {
            Ok(true) => {
                info!(user_id = user.id, "User registered");
                REGISTERED
            }
            Ok(false) => {
                warn!(user_id = user.id, "Backend refused registration");
                REGISTRATION_FAILED
            }
            Err(e) => {
                log_backend_failure(user.id, &e, "Registration request failed");
                REGISTRATION_FAILED
            }
        };
        self.api.send_message(chat_id, reply).await
    }
}

/// Transient failures are expected under load; anything else points at a
/// broken backend contract.
fn log_backend_failure(user_id: i64, err: &RequestError, what: &str) {
    if err.is_retryable() {
        warn!(user_id, error = %err, "{what}");
    } else {
        error!(user_id, error = %err, "{what}");
    }
}
