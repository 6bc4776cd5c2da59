//! Request envelopes sent to the backend service.
//!
//! Wire shape: `{"type": "<op>", "data": {...}}`, with an optional
//! `reply_to` naming the correlation key when the responder cannot derive it.

use serde::{Deserialize, Serialize};

/// Operation type of a `user_exists` query.
pub const USER_EXISTS: &str = "user_exists";

/// Operation type of a `sign_up` command.
pub const SIGN_UP: &str = "sign_up";

/// Payload of a `user_exists` query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserExists {
    pub user_id: i64,
}

/// Payload of a `sign_up` command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignUp {
    pub user_id: i64,
    pub phone: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
}

/// Operation-specific data carried in an envelope.
///
/// The variant decides the `type` tag, so type and data cannot disagree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum RequestPayload {
    UserExists(UserExists),
    SignUp(SignUp),
}

impl RequestPayload {
    /// Operation type matching this payload.
    #[must_use]
    pub fn op(&self) -> &'static str {
        match self {
            Self::UserExists(_) => USER_EXISTS,
            Self::SignUp(_) => SIGN_UP,
        }
    }
}

/// A request published to the backend's request destination.
///
/// Immutable once constructed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestEnvelope {
    #[serde(flatten)]
    data: RequestPayload,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    reply_to: Option<String>,
}

impl RequestEnvelope {
    /// Wrap `payload`, deriving the operation type from it.
    #[must_use]
    pub fn new(payload: RequestPayload) -> Self {
        Self {
            data: payload,
            reply_to: None,
        }
    }

    /// Advertise the destination the responder must reply to.
    #[must_use]
    pub fn with_reply_to(mut self, key: impl Into<String>) -> Self {
        self.reply_to = Some(key.into());
        self
    }

    /// Operation type (`"user_exists"`, `"sign_up"`).
    #[must_use]
    pub fn op(&self) -> &'static str {
        self.data.op()
    }

    /// Operation data.
    #[must_use]
    pub fn data(&self) -> &RequestPayload {
        &self.data
    }

    /// Advertised reply destination, if any.
    #[must_use]
    pub fn reply_to(&self) -> Option<&str> {
        self.reply_to.as_deref()
    }

    /// Serialize to the JSON wire format.
    pub fn to_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }
}

impl From<UserExists> for RequestEnvelope {
    fn from(payload: UserExists) -> Self {
        Self::new(RequestPayload::UserExists(payload))
    }
}

impl From<SignUp> for RequestEnvelope {
    fn from(payload: SignUp) -> Self {
        Self::new(RequestPayload::SignUp(payload))
    }
}
