//! Response values deposited by the backend service.

use crate::error::RequestError;
use std::fmt;

/// Opaque string payload found at a correlation destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseValue {
    key: String,
    value: String,
}

impl ResponseValue {
    /// Decode raw bytes popped from `key`.
    ///
    /// # Errors
    ///
    /// [`RequestError::Decode`] if the payload is not UTF-8.
    pub fn decode(key: &str, payload: Vec<u8>) -> Result<Self, RequestError> {
        let value = String::from_utf8(payload).map_err(|e| RequestError::Decode {
            correlation_key: key.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Self {
            key: key.to_string(),
            value,
        })
    }

    /// Interpret the value as a boolean answer.
    ///
    /// # Errors
    ///
    /// [`RequestError::Decode`] unless the value is exactly `true` or `false`.
    pub fn as_bool(&self) -> Result<bool, RequestError> {
        match self.value.as_str() {
            "true" => Ok(true),
            "false" => Ok(false),
            other => Err(RequestError::Decode {
                correlation_key: self.key.clone(),
                reason: format!("expected \"true\" or \"false\", got {other:?}"),
            }),
        }
    }

    /// Raw string value.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.value
    }

    /// Key the value arrived on.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Consume into the raw string.
    #[must_use]
    pub fn into_string(self) -> String {
        self.value
    }
}

impl fmt::Display for ResponseValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.value)
    }
}
