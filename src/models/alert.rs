use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::item::Item;
use super::snapshot::Snapshot;
use crate::config::{LinkTemplate, NotificationsConfig};

/// Everything a notifier needs to announce one restock.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AlertPayload {
    pub title: String,
    pub url: String,
    pub item_id: String,
    pub price: String,
    pub stock: String,
    pub cart_limit: u32,
    pub image_url: Option<String>,
    pub app_url: Option<String>,
    pub links: Vec<AlertLink>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AlertLink {
    pub label: String,
    pub url: String,
}

impl AlertPayload {
    pub fn restock(item: &Item, snapshot: &Snapshot, links: &NotificationsConfig) -> Self {
        Self {
            title: item.name.clone(),
            url: item.url.clone(),
            item_id: item.id.clone(),
            price: snapshot.formatted_price(),
            stock: snapshot.stock_level.to_string(),
            cart_limit: snapshot.cart_limit,
            image_url: snapshot.image_url.clone(),
            app_url: links.app_link.as_deref().map(|t| render_template(t, item)),
            links: links
                .links
                .iter()
                .map(|template| AlertLink::render(template, item))
                .collect(),
            timestamp: Utc::now(),
        }
    }
}

impl AlertLink {
    fn render(template: &LinkTemplate, item: &Item) -> Self {
        Self {
            label: template.label.clone(),
            url: render_template(&template.url, item),
        }
    }
}

fn render_template(template: &str, item: &Item) -> String {
    template
        .replace("{id}", &item.id)
        .replace("{url}", &item.url)
        .replace("{query}", &item.search_query())
}
