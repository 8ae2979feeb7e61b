use async_trait::async_trait;
use tracing::warn;

use crate::models::AlertPayload;
use crate::plugins::traits::{NotificationResult, Notifier};
use crate::utils::error::Result;

/// Writes alerts to the log. Used when no webhook is configured.
#[derive(Debug, Default)]
pub struct LogNotifier;

impl LogNotifier {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Notifier for LogNotifier {
    fn name(&self) -> &str {
        "log"
    }

    async fn notify(&self, alert: &AlertPayload) -> Result<NotificationResult> {
        warn!(
            item_id = %alert.item_id,
            price = %alert.price,
            stock = %alert.stock,
            cart_limit = alert.cart_limit,
            "🔔 RESTOCK: {} {}",
            alert.title,
            alert.url
        );
        Ok(NotificationResult::delivered(None))
    }
}
