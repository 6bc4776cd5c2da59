//! Domain types for the relay.
//!
//! Pure data: envelopes, correlation keys, response values and outbound
//! messages. No I/O happens here.

pub mod correlation;
pub mod envelope;
pub mod outbound;
pub mod response;

// Re-exports for convenience
pub use correlation::{CorrelationKey, CorrelationStrategy};
pub use envelope::{RequestEnvelope, RequestPayload, SignUp, UserExists, SIGN_UP, USER_EXISTS};
pub use outbound::OutboundMessage;
pub use response::ResponseValue;
