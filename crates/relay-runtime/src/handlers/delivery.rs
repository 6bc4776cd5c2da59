//! Outbound delivery to the chat platform.

use crate::telegram::ChatApi;
use async_trait::async_trait;
use relay_core::{DeliveryError, OutboundHandler};
use std::sync::Arc;

/// Sends backend-initiated messages as plain chat messages.
pub struct TelegramDelivery {
    api: Arc<dyn ChatApi>,
}

impl TelegramDelivery {
    pub fn new(api: Arc<dyn ChatApi>) -> Self {
        Self { api }
    }
}

#[async_trait]
impl OutboundHandler for TelegramDelivery {
    async fn deliver(&self, target_id: i64, text: &str) -> Result<(), DeliveryError> {
        self.api
            .send_message(target_id, text)
            .await
            .map_err(|e| DeliveryError::new(target_id, e))
    }
}
