//! Bot API client over HTTPS.

use super::types::{ApiResponse, GetUpdates, ReplyMarkup, SendMessage, Update};
use super::{ChatApi, TelegramError};
use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use tracing::debug;

/// Extra time allowed on top of the long-poll timeout before the HTTP
/// request itself is abandoned.
const POLL_GRACE: Duration = Duration::from_secs(10);

/// Timeout for non-polling requests.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Telegram Bot API client.
pub struct TelegramClient {
    client: Client,
    base_url: String,
    token: String,
}

impl std::fmt::Debug for TelegramClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl TelegramClient {
    /// Create a client for the API at `base_url`.
    ///
    /// # Errors
    ///
    /// Returns `Err` if the HTTP client cannot be built.
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Result<Self, TelegramError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .build()
            .map_err(TelegramError::Http)?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
        })
    }

    /// URL of a Bot API method.
    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.base_url, self.token, method)
    }

    /// Call a Bot API method.
    async fn call<P: Serialize + ?Sized, R: DeserializeOwned>(
        &self,
        method: &str,
        params: &P,
        timeout: Duration,
    ) -> Result<R, TelegramError> {
        let response = self
            .client
            .post(self.method_url(method))
            .timeout(timeout)
            .json(params)
            .send()
            .await
            .map_err(|e| {
                if e.is_connect() {
                    TelegramError::Connection(format!("Cannot connect to {}", self.base_url))
                } else {
                    // Strip the URL; it embeds the token
                    TelegramError::Http(e.without_url())
                }
            })?;

        let api_response: ApiResponse<R> = response
            .json()
            .await
            .map_err(|e| TelegramError::Parse(e.without_url().to_string()))?;

        if !api_response.ok {
            return Err(TelegramError::Api(
                api_response
                    .description
                    .unwrap_or_else(|| format!("{method} failed")),
            ));
        }

        api_response
            .result
            .ok_or_else(|| TelegramError::Parse("Missing result in response".to_string()))
    }

    async fn send(
        &self,
        chat_id: i64,
        text: &str,
        reply_markup: ReplyMarkup,
    ) -> Result<(), TelegramError> {
        let request = SendMessage {
            chat_id,
            text,
            reply_markup,
        };
        // Result is the sent Message; only success matters here
        let _: serde_json::Value = self.call("sendMessage", &request, REQUEST_TIMEOUT).await?;
        debug!(chat_id, "Message sent");
        Ok(())
    }
}

#[async_trait]
impl ChatApi for TelegramClient {
    async fn get_updates(
        &self,
        offset: i64,
        timeout: Duration,
    ) -> Result<Vec<Update>, TelegramError> {
        let request = GetUpdates {
            offset,
            timeout: timeout.as_secs(),
            allowed_updates: vec!["message"],
        };
        self.call("getUpdates", &request, timeout + POLL_GRACE).await
    }

    async fn send_message(&self, chat_id: i64, text: &str) -> Result<(), TelegramError> {
        self.send(chat_id, text, ReplyMarkup::remove()).await
    }

    async fn request_contact(
        &self,
        chat_id: i64,
        text: &str,
        button: &str,
    ) -> Result<(), TelegramError> {
        self.send(chat_id, text, ReplyMarkup::request_contact(button))
            .await
    }
}
