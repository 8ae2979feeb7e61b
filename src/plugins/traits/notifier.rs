use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::models::AlertPayload;
use crate::utils::error::Result;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NotificationResult {
    pub success: bool,
    pub message_id: Option<String>,
    pub error: Option<String>,
}

impl NotificationResult {
    pub fn delivered(message_id: Option<String>) -> Self {
        Self {
            success: true,
            message_id,
            error: None,
        }
    }
}

/// Delivery channel for restock alerts (Discord webhook, log output, ...)
#[async_trait]
pub trait Notifier: Send + Sync {
    fn name(&self) -> &str;

    /// Deliver a single alert. Transport failures and non-success responses
    /// come back as errors; callers decide whether to retry.
    async fn notify(&self, alert: &AlertPayload) -> Result<NotificationResult>;
}
