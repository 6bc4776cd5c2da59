//! Correlation keys for routing responses back to their requests.
//!
//! The key is the name of the destination the responder pushes its reply
//! to. It carries no request ID of its own, so the naming strategy decides
//! whether concurrent requests can collide.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Destination name a response is expected on.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CorrelationKey(String);

impl CorrelationKey {
    /// Shared key for every caller: `prefix`.
    pub fn fixed(prefix: impl Into<String>) -> Self {
        Self(prefix.into())
    }

    /// Key scoped to one entity: `prefix:entity_id`.
    pub fn per_entity(prefix: &str, entity_id: impl fmt::Display) -> Self {
        Self(format!("{prefix}:{entity_id}"))
    }

    /// Fresh key for a single request: `prefix:<uuid v7>`.
    ///
    /// UUID v7 is time-ordered, so keys sort by creation time in broker
    /// tooling.
    pub fn unique(prefix: &str) -> Self {
        Self(format!("{prefix}:{}", Uuid::now_v7()))
    }

    /// Get the key as a destination name.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CorrelationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CorrelationKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<&str> for CorrelationKey {
    fn from(key: &str) -> Self {
        Self(key.to_string())
    }
}

impl From<String> for CorrelationKey {
    fn from(key: String) -> Self {
        Self(key)
    }
}

/// How a service derives correlation keys for its requests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CorrelationStrategy {
    /// One key per operation, shared by every caller.
    ///
    /// Concurrent requests collide; the engine refuses the second one.
    Static,
    /// One key per operation and entity (`user_exists_response:42`).
    ///
    /// Two concurrent requests for the same entity still collide.
    #[default]
    PerEntity,
    /// A fresh key per request, advertised to the responder in `reply_to`.
    PerRequest,
}

impl CorrelationStrategy {
    /// Derive the key for a request about `entity_id`.
    pub fn key(&self, prefix: &str, entity_id: impl fmt::Display) -> CorrelationKey {
        match self {
            Self::Static => CorrelationKey::fixed(prefix),
            Self::PerEntity => CorrelationKey::per_entity(prefix, entity_id),
            Self::PerRequest => CorrelationKey::unique(prefix),
        }
    }

    /// Whether the responder needs the key spelled out in the envelope.
    #[must_use]
    pub fn advertises_reply_to(&self) -> bool {
        matches!(self, Self::PerRequest)
    }
}

impl FromStr for CorrelationStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "static" => Ok(Self::Static),
            "per-entity" | "per_entity" | "entity" => Ok(Self::PerEntity),
            "per-request" | "per_request" | "request" => Ok(Self::PerRequest),
            other => Err(format!("unknown correlation strategy: {other}")),
        }
    }
}
