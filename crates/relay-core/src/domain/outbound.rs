//! Outbound messages pushed by the backend for delivery to chat users.

use crate::error::DecodeError;
use serde::Deserialize;

/// A message to deliver to one chat target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    pub target_id: i64,
    pub text: String,
}

/// Accepted wire shape; responders use either `chat_id` or `user_id`.
#[derive(Deserialize)]
struct WireMessage {
    chat_id: Option<i64>,
    user_id: Option<i64>,
    text: String,
}

impl OutboundMessage {
    /// Decode a JSON payload.
    ///
    /// `chat_id` wins when both target fields are present.
    pub fn decode(payload: &[u8]) -> Result<Self, DecodeError> {
        let wire: WireMessage = serde_json::from_slice(payload)?;
        let target_id = wire
            .chat_id
            .or(wire.user_id)
            .ok_or(DecodeError::MissingTarget)?;

        Ok(Self {
            target_id,
            text: wire.text,
        })
    }
}
