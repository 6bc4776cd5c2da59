//! # Relay Configuration
//!
//! Runtime parameters, read from environment variables.
//!
//! ## Requirements
//!
//! - `TELEGRAM_BOT_TOKEN` MUST be set and non-empty
//! - Request and outbound channels MUST differ, or the listener would see
//!   every request the relay publishes
//! - All other values have defaults with override capability

use relay_core::{CorrelationStrategy, DEFAULT_REQUEST_TIMEOUT};
use std::env;
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Default chat platform API base URL.
pub const DEFAULT_TELEGRAM_API_URL: &str = "https://api.telegram.org";

/// Default broker address when no URL is given.
pub const DEFAULT_REDIS_ADDR: &str = "127.0.0.1:6379";

/// Default destination for requests to the backend.
pub const DEFAULT_REQUEST_CHANNEL: &str = "bot_requests";

/// Default topic for backend-initiated messages.
pub const DEFAULT_OUTBOUND_CHANNEL: &str = "api_requests";

/// Default long-poll timeout.
pub const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_secs(30);

/// Configuration errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// A required variable is not set.
    #[error("{0} is not set")]
    Missing(&'static str),

    /// A variable could not be parsed.
    #[error("invalid value {value:?} for {key}: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },

    /// The combination of values is unusable.
    #[error("invalid configuration: {0}")]
    Validation(String),
}

/// Complete relay configuration.
#[derive(Clone)]
pub struct RelayConfig {
    /// Chat platform bot token.
    pub telegram_token: String,
    /// Chat platform API base URL.
    pub telegram_api_url: String,
    /// Broker connection URL.
    pub redis_url: String,
    /// Destination requests are published to.
    pub request_channel: String,
    /// Topic backend-initiated messages arrive on.
    pub outbound_channel: String,
    /// How long to wait for a correlated response.
    pub request_timeout: Duration,
    /// How correlation keys are derived.
    pub correlation: CorrelationStrategy,
    /// Long-poll timeout for chat updates.
    pub poll_timeout: Duration,
    /// Log filter directive.
    pub log_level: String,
    /// Emit JSON logs.
    pub json_logs: bool,
}

impl std::fmt::Debug for RelayConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RelayConfig")
            .field("telegram_token", &"<redacted>")
            .field("telegram_api_url", &self.telegram_api_url)
            .field("redis_url", &redact_url(&self.redis_url))
            .field("request_channel", &self.request_channel)
            .field("outbound_channel", &self.outbound_channel)
            .field("request_timeout", &self.request_timeout)
            .field("correlation", &self.correlation)
            .field("poll_timeout", &self.poll_timeout)
            .field("log_level", &self.log_level)
            .field("json_logs", &self.json_logs)
            .finish()
    }
}

impl RelayConfig {
    /// Create configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `TELEGRAM_BOT_TOKEN`: Bot token (required)
    /// - `TELEGRAM_API_URL`: API base URL (default: https://api.telegram.org)
    /// - `REDIS_URL`: Full broker URL, overrides the two below
    /// - `REDIS_ADDR`: Broker `host:port` (default: 127.0.0.1:6379)
    /// - `REDIS_PASSWORD`: Broker password (default: none)
    /// - `RELAY_REQUEST_CHANNEL`: Request destination (default: bot_requests)
    /// - `RELAY_OUTBOUND_CHANNEL`: Outbound topic (default: api_requests)
    /// - `RELAY_REQUEST_TIMEOUT_MS`: Response timeout (default: 2000)
    /// - `RELAY_CORRELATION`: static, per-entity or per-request (default: per-entity)
    /// - `RELAY_POLL_TIMEOUT_SECS`: Long-poll timeout (default: 30)
    /// - `RELAY_LOG_LEVEL` or `RUST_LOG`: Log filter (default: info)
    /// - `RELAY_JSON_LOGS`: Enable JSON logs (default: false)
    ///
    /// # Errors
    ///
    /// See [`from_lookup`](Self::from_lookup).
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Create configuration from an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// Returns `Err` if the token is missing, a numeric or strategy value
    /// does not parse, or [`validate`](Self::validate) fails.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let telegram_token =
            var("TELEGRAM_BOT_TOKEN").ok_or(ConfigError::Missing("TELEGRAM_BOT_TOKEN"))?;

        let redis_url = match var("REDIS_URL") {
            Some(url) => {
                Url::parse(&url).map_err(|e| ConfigError::Invalid {
                    key: "REDIS_URL",
                    value: redact_url(&url),
                    reason: e.to_string(),
                })?;
                url
            }
            None => {
                let addr = var("REDIS_ADDR").unwrap_or_else(|| DEFAULT_REDIS_ADDR.to_string());
                broker_url(&addr, var("REDIS_PASSWORD").as_deref())?
            }
        };

        let request_timeout = match var("RELAY_REQUEST_TIMEOUT_MS") {
            Some(v) => Duration::from_millis(parse_number("RELAY_REQUEST_TIMEOUT_MS", &v)?),
            None => DEFAULT_REQUEST_TIMEOUT,
        };

        let poll_timeout = match var("RELAY_POLL_TIMEOUT_SECS") {
            Some(v) => Duration::from_secs(parse_number("RELAY_POLL_TIMEOUT_SECS", &v)?),
            None => DEFAULT_POLL_TIMEOUT,
        };

        let correlation = match var("RELAY_CORRELATION") {
            Some(v) => v.parse::<CorrelationStrategy>().map_err(|reason| ConfigError::Invalid {
                key: "RELAY_CORRELATION",
                value: v.clone(),
                reason,
            })?,
            None => CorrelationStrategy::default(),
        };

        let config = Self {
            telegram_token,
            telegram_api_url: var("TELEGRAM_API_URL")
                .unwrap_or_else(|| DEFAULT_TELEGRAM_API_URL.to_string()),
            redis_url,
            request_channel: var("RELAY_REQUEST_CHANNEL")
                .unwrap_or_else(|| DEFAULT_REQUEST_CHANNEL.to_string()),
            outbound_channel: var("RELAY_OUTBOUND_CHANNEL")
                .unwrap_or_else(|| DEFAULT_OUTBOUND_CHANNEL.to_string()),
            request_timeout,
            correlation,
            poll_timeout,
            log_level: var("RELAY_LOG_LEVEL")
                .or_else(|| var("RUST_LOG"))
                .unwrap_or_else(|| "info".to_string()),
            json_logs: var("RELAY_JSON_LOGS")
                .map(|v| v.eq_ignore_ascii_case("true") || v == "1")
                .unwrap_or(false),
        };

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    ///
    /// # Returns
    ///
    /// Returns `Err` if:
    /// - The bot token is empty
    /// - The request timeout is zero
    /// - Request and outbound channels are the same destination
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.telegram_token.trim().is_empty() {
            return Err(ConfigError::Missing("TELEGRAM_BOT_TOKEN"));
        }
        if self.request_timeout.is_zero() {
            return Err(ConfigError::Validation(
                "request timeout must be greater than zero".to_string(),
            ));
        }
        if self.request_channel == self.outbound_channel {
            return Err(ConfigError::Validation(format!(
                "request and outbound channels must differ (both are {:?})",
                self.request_channel
            )));
        }
        Ok(())
    }
}

fn parse_number(key: &'static str, value: &str) -> Result<u64, ConfigError> {
    value.trim().parse().map_err(|e: std::num::ParseIntError| ConfigError::Invalid {
        key,
        value: value.to_string(),
        reason: e.to_string(),
    })
}

/// Build a broker URL from `host:port` and an optional password.
///
/// The password is percent-encoded, so reserved characters such as `@`, `/`
/// and `#` reach the broker unchanged.
fn broker_url(addr: &str, password: Option<&str>) -> Result<String, ConfigError> {
    let invalid = |reason: String| ConfigError::Invalid {
        key: "REDIS_ADDR",
        value: addr.to_string(),
        reason,
    };

    let mut url = Url::parse(&format!("redis://{addr}/")).map_err(|e| invalid(e.to_string()))?;
    if url.host_str().map_or(true, str::is_empty) || url.path() != "/" {
        return Err(invalid("expected host:port".to_string()));
    }
    if let Some(password) = password {
        // `url` never escapes '%', but the broker client decodes it
        url.set_password(Some(&password.replace('%', "%25")))
            .map_err(|()| invalid("address cannot carry credentials".to_string()))?;
    }
    Ok(url.into())
}

/// Hide the password part of a broker URL for logging.
pub fn redact_url(url: &str) -> String {
    match (url.find("://"), url.rfind('@')) {
        (Some(scheme_end), Some(at)) if at > scheme_end => {
            format!("{}://***{}", &url[..scheme_end], &url[at..])
        }
        _ => url.to_string(),
    }
}
