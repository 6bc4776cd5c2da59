//! Cross-crate flows.

pub mod outbound;
pub mod request_reply;
