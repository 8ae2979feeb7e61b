use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use std::time::Duration;
use tracing::debug;

use crate::config::DiscordConfig;
use crate::models::AlertPayload;
use crate::plugins::traits::{NotificationResult, Notifier};
use crate::utils::error::{AppError, Result};

pub struct DiscordNotifier {
    client: Client,
    webhook_url: String,
    config: DiscordConfig,
}

impl DiscordNotifier {
    pub fn new(config: DiscordConfig, timeout: Duration) -> Result<Self> {
        let webhook_url = config
            .webhook_url
            .clone()
            .ok_or_else(|| AppError::Validation("Discord webhook URL is not configured".to_string()))?;

        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            webhook_url,
            config,
        })
    }

    fn create_embed(&self, alert: &AlertPayload) -> serde_json::Value {
        let mut author = json!({ "name": self.config.author_name });
        if let Some(icon) = &self.config.author_icon_url {
            author["icon_url"] = json!(icon);
        }

        let mut fields = vec![
            json!({ "name": "Price", "value": alert.price, "inline": true }),
            json!({ "name": "Type", "value": "Restock", "inline": true }),
            json!({ "name": "Item ID", "value": alert.item_id, "inline": true }),
            json!({ "name": "Total Stock", "value": alert.stock, "inline": true }),
        ];

        if let Some(app_url) = &alert.app_url {
            fields.push(json!({
                "name": "Open In App",
                "value": format!("[Open]({})", app_url),
                "inline": true
            }));
        }

        fields.push(json!({
            "name": "Cart Limit",
            "value": alert.cart_limit.to_string(),
            "inline": true
        }));

        if !alert.links.is_empty() {
            let links = alert
                .links
                .iter()
                .map(|link| format!("[{}]({})", link.label, link.url))
                .collect::<Vec<_>>()
                .join(" | ");
            fields.push(json!({ "name": "Links", "value": links, "inline": false }));
        }

        let mut embed = json!({
            "author": author,
            "title": alert.title,
            "url": alert.url,
            "color": self.config.color,
            "fields": fields,
            "timestamp": alert.timestamp.to_rfc3339(),
        });

        if let Some(image) = &alert.image_url {
            embed["thumbnail"] = json!({ "url": image });
        }

        embed
    }

    fn create_webhook_payload(&self, alert: &AlertPayload) -> serde_json::Value {
        let mut payload = json!({
            "embeds": [self.create_embed(alert)]
        });

        if let Some(username) = &self.config.username {
            payload["username"] = json!(username);
        }

        if let Some(avatar_url) = &self.config.avatar_url {
            payload["avatar_url"] = json!(avatar_url);
        }

        if self.config.mention_everyone {
            payload["content"] = json!("@everyone");
        }

        payload
    }
}

#[async_trait]
impl Notifier for DiscordNotifier {
    fn name(&self) -> &str {
        "discord"
    }

    async fn notify(&self, alert: &AlertPayload) -> Result<NotificationResult> {
        let payload = self.create_webhook_payload(alert);

        let response = self
            .client
            .post(&self.webhook_url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| AppError::notification(self.name(), e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::notification(
                self.name(),
                format!("webhook returned {}: {}", status, body.trim()),
            ));
        }

        // Only present when the webhook is called with `?wait=true`.
        let message_id = response
            .json::<serde_json::Value>()
            .await
            .ok()
            .and_then(|body| body.get("id").and_then(|id| id.as_str()).map(str::to_string));

        debug!("Discord alert delivered for {}", alert.item_id);
        Ok(NotificationResult::delivered(message_id))
    }
}
