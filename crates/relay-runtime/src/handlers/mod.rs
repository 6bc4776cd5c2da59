//! # Chat Handlers
//!
//! Inbound command handling and outbound delivery to chat users.

pub mod bot;
pub mod delivery;

#[cfg(test)]
pub(crate) mod testing;

pub use bot::BotHandler;
pub use delivery::TelegramDelivery;
