//! Test doubles for the chat platform.

use crate::telegram::{Chat, ChatApi, Contact, Message, TelegramError, Update, User};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

/// A message the bot sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Sent {
    Text(i64, String),
    ContactRequest(i64, String),
}

/// Records outgoing messages and serves scripted update batches.
#[derive(Default)]
pub struct RecordingChat {
    sent: Mutex<Vec<Sent>>,
    batches: Mutex<VecDeque<Result<Vec<Update>, TelegramError>>>,
    offsets: Mutex<Vec<i64>>,
    fail_sends: bool,
}

impl RecordingChat {
    /// Chat whose sends always fail.
    pub fn failing() -> Self {
        Self {
            fail_sends: true,
            ..Default::default()
        }
    }

    /// Queue the result of the next `get_updates` call.
    pub fn push_batch(&self, batch: Result<Vec<Update>, TelegramError>) {
        self.batches.lock().unwrap().push_back(batch);
    }

    pub fn sent(&self) -> Vec<Sent> {
        self.sent.lock().unwrap().clone()
    }

    /// Offsets passed to `get_updates`, in call order.
    pub fn offsets(&self) -> Vec<i64> {
        self.offsets.lock().unwrap().clone()
    }

    fn record(&self, sent: Sent) -> Result<(), TelegramError> {
        if self.fail_sends {
            return Err(TelegramError::Api("Bad Request: chat not found".into()));
        }
        self.sent.lock().unwrap().push(sent);
        Ok(())
    }
}

#[async_trait]
impl ChatApi for RecordingChat {
    async fn get_updates(
        &self,
        offset: i64,
        timeout: Duration,
    ) -> Result<Vec<Update>, TelegramError> {
        self.offsets.lock().unwrap().push(offset);
        let next = self.batches.lock().unwrap().pop_front();
        match next {
            Some(batch) => batch,
            None => {
                // Behave like an idle long poll
                tokio::time::sleep(timeout).await;
                Ok(Vec::new())
            }
        }
    }

    async fn send_message(&self, chat_id: i64, text: &str) -> Result<(), TelegramError> {
        self.record(Sent::Text(chat_id, text.to_string()))
    }

    async fn request_contact(
        &self,
        chat_id: i64,
        text: &str,
        _button: &str,
    ) -> Result<(), TelegramError> {
        self.record(Sent::ContactRequest(chat_id, text.to_string()))
    }
}

fn ada(user_id: i64) -> User {
    User {
        id: user_id,
        first_name: "Ada".into(),
        username: Some("ada".into()),
    }
}

/// Private-chat text message from `user_id`.
pub fn text_update(update_id: i64, user_id: i64, text: &str) -> Update {
    Update {
        update_id,
        message: Some(Message {
            message_id: update_id,
            from: Some(ada(user_id)),
            chat: Chat { id: user_id },
            text: Some(text.to_string()),
            contact: None,
        }),
    }
}

/// Private-chat contact share from `user_id`.
pub fn contact_update(update_id: i64, user_id: i64, phone: &str) -> Update {
    Update {
        update_id,
        message: Some(Message {
            message_id: update_id,
            from: Some(ada(user_id)),
            chat: Chat { id: user_id },
            text: None,
            contact: Some(Contact {
                phone_number: phone.to_string(),
                first_name: Some("Ada".into()),
                user_id: Some(user_id),
            }),
        }),
    }
}
