//! Chat platform access (Telegram Bot API).

pub mod client;
pub mod types;

pub use client::TelegramClient;
pub use types::{Chat, Contact, Message, ReplyMarkup, Update, User};

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

/// Errors from the chat platform.
#[derive(Debug, Error)]
pub enum TelegramError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Bot API error: {0}")]
    Api(String),
    #[error("Failed to parse response: {0}")]
    Parse(String),
    #[error("Connection failed: {0}")]
    Connection(String),
}

/// Operations the relay needs from the chat platform.
#[async_trait]
pub trait ChatApi: Send + Sync {
    /// Long-poll for updates with `update_id >= offset`.
    async fn get_updates(&self, offset: i64, timeout: Duration)
        -> Result<Vec<Update>, TelegramError>;

    /// Send plain text, removing any custom keyboard.
    async fn send_message(&self, chat_id: i64, text: &str) -> Result<(), TelegramError>;

    /// Send `text` with a one-time contact-request keyboard labelled `button`.
    async fn request_contact(
        &self,
        chat_id: i64,
        text: &str,
        button: &str,
    ) -> Result<(), TelegramError>;
}
