//! # Relay Core - Correlated Request/Response over Pub/Sub
//!
//! Turns a fire-and-forget broker into a request/reply channel with a
//! bounded wait, and forwards backend-initiated messages to chat users.
//!
//! ## Components
//!
//! | Component | Role |
//! |-----------|------|
//! | [`RequestEngine`] | publish a request, wait on its correlation key |
//! | [`UserService`] | `user_exists` / `sign_up` calls over the engine |
//! | [`OutboundListener`] | topic → bounded queue → [`OutboundHandler`] |
//!
//! ## Correlation
//!
//! The responder deposits its answer at a key derived from the request. The
//! [`CorrelationStrategy`] decides how unique that key is:
//!
//! - `Static`: `user_exists_response`, every caller shares it
//! - `PerEntity`: `user_exists_response:42` (default)
//! - `PerRequest`: `user_exists_response:<uuid>`, advertised in `reply_to`
//!
//! Two callers in one process never wait on the same key at once; the
//! second receives [`RequestError::CorrelationConflict`].

// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod domain;
pub mod engine;
pub mod error;
pub mod listener;
pub mod service;

// Re-export main types
pub use domain::{
    CorrelationKey, CorrelationStrategy, OutboundMessage, RequestEnvelope, RequestPayload,
    ResponseValue, SignUp, UserExists, SIGN_UP, USER_EXISTS,
};
pub use engine::{EngineStats, EngineStatsSnapshot, RequestEngine, RESPONSE_GRACE};
pub use error::{DecodeError, DeliveryError, RequestError};
pub use listener::{ListenerStats, OutboundHandler, OutboundListener, DEFAULT_QUEUE_CAPACITY};
pub use service::{UserService, DEFAULT_REQUEST_TIMEOUT, SIGN_UP_RESPONSE, USER_EXISTS_RESPONSE};
