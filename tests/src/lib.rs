//! # Notification Relay Test Suite
//!
//! End-to-end flows over the in-memory broker with a scripted backend.
//!
//! ## Structure
//!
//! ```text
//! tests/src/
//! ├── fixtures.rs       # Scripted responder and recording handler
//! └── integration/
//!     ├── request_reply.rs  # Engine + UserService against a responder
//!     └── outbound.rs       # Listener delivery semantics
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test -p relay-tests
//! cargo test -p relay-tests integration::request_reply::
//! ```

#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod integration;
