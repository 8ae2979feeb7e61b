use serde::{Deserialize, Serialize};
use std::fmt;
use url::Url;

use crate::config::ItemConfig;

/// Marker that precedes the numeric product id in retailer product URLs.
const PRODUCT_ID_MARKER: &str = "/-/A-";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Item {
    pub id: String,
    pub name: String,
    pub url: String,
    pub cart_limit: Option<u32>,
}

impl Item {
    pub fn new(url: impl Into<String>, name: impl Into<String>, cart_limit: Option<u32>) -> Self {
        let url = url.into();
        Self {
            id: item_id_from_url(&url),
            name: name.into(),
            url,
            cart_limit,
        }
    }

    /// Name as shown in per-cycle reports.
    pub fn short_name(&self) -> &str {
        match self.name.char_indices().nth(30) {
            Some((idx, _)) => &self.name[..idx],
            None => &self.name,
        }
    }

    /// The item name form-encoded for use as a search query.
    pub fn search_query(&self) -> String {
        url::form_urlencoded::byte_serialize(self.name.as_bytes()).collect()
    }
}

impl From<&ItemConfig> for Item {
    fn from(config: &ItemConfig) -> Self {
        Item::new(config.url.clone(), config.name.clone(), config.cart_limit)
    }
}

/// Derive a stable identifier from a product URL.
///
/// Uses the segment after `/-/A-` when present, otherwise the last non-empty path
/// segment, otherwise the URL itself.
pub fn item_id_from_url(url: &str) -> String {
    if let Some(pos) = url.rfind(PRODUCT_ID_MARKER) {
        let tail = &url[pos + PRODUCT_ID_MARKER.len()..];
        let id = tail.split(['?', '#', '/']).next().unwrap_or_default();
        if !id.is_empty() {
            return id.to_string();
        }
    }

    Url::parse(url)
        .ok()
        .and_then(|parsed| {
            parsed
                .path_segments()
                .and_then(|segments| segments.filter(|s| !s.is_empty()).last().map(str::to_string))
        })
        .unwrap_or_else(|| url.to_string())
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StockStatus {
    InStock,
    OutOfStock,
}

impl fmt::Display for StockStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StockStatus::InStock => write!(f, "IN_STOCK"),
            StockStatus::OutOfStock => write!(f, "OUT_OF_STOCK"),
        }
    }
}
