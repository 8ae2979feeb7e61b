use regex::Regex;
use rust_decimal::Decimal;
use scraper::{Html, Selector};
use std::str::FromStr;
use std::sync::LazyLock;

use crate::config::{CategoryLimit, ExtractionConfig};
use crate::models::{Item, Snapshot, StockLevel, StockStatus};
use crate::scraper::RenderedPage;
use crate::utils::error::{AppError, Result};

/// Phrases that mark a page as unavailable regardless of any button state.
const UNAVAILABLE_PHRASES: &[&str] = &["out of stock", "sold out"];

/// Button captions that indicate the item can be bought right now.
const PURCHASE_CAPTIONS: &[&str] = &["add to cart", "ship it"];

static PRICE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$(\d+\.\d{2})").expect("price pattern is valid"));

static REMAINING_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"only\s+(\d+)\s+left").expect("remaining pattern is valid"));

static LIMIT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"limit\s+(\d+)").expect("limit pattern is valid"));

static BUTTON_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("button").expect("button selector is valid"));

/// Decide availability from rendered content.
///
/// Unavailability phrases are authoritative. Otherwise the page must expose an
/// enabled purchase button; anything else counts as out of stock.
pub fn classify_availability(page: &RenderedPage) -> StockStatus {
    let lower = page.html.to_lowercase();
    if UNAVAILABLE_PHRASES.iter().any(|phrase| lower.contains(phrase)) {
        return StockStatus::OutOfStock;
    }

    if has_enabled_purchase_button(&page.html) {
        StockStatus::InStock
    } else {
        StockStatus::OutOfStock
    }
}

fn has_enabled_purchase_button(html: &str) -> bool {
    let document = Html::parse_document(html);

    document.select(&BUTTON_SELECTOR).any(|button| {
        let caption = button.text().collect::<Vec<_>>().join(" ").to_lowercase();
        if !PURCHASE_CAPTIONS.iter().any(|c| caption.contains(c)) {
            return false;
        }

        let element = button.value();
        let disabled = element.attr("disabled").is_some()
            || element
                .attr("aria-disabled")
                .is_some_and(|v| v.eq_ignore_ascii_case("true"));
        !disabled
    })
}

/// Pulls a [`Snapshot`] out of whatever markup a page returned.
///
/// Every field is extracted independently and falls back to its default when
/// nothing matches, so extraction never fails.
pub struct SnapshotExtractor {
    image_re: Regex,
    default_cart_limit: u32,
    category_limits: Vec<CategoryLimit>,
}

impl SnapshotExtractor {
    pub fn new(config: &ExtractionConfig) -> Result<Self> {
        let pattern = format!(r#"{}[^"'\s<>)]+"#, regex::escape(&config.media_host));
        let image_re = Regex::new(&pattern)
            .map_err(|e| AppError::Validation(format!("Invalid media host pattern: {}", e)))?;

        Ok(Self {
            image_re,
            default_cart_limit: config.default_cart_limit,
            category_limits: config
                .category_limits
                .iter()
                .map(|c| CategoryLimit {
                    keywords: c.keywords.iter().map(|k| k.to_lowercase()).collect(),
                    limit: c.limit,
                })
                .collect(),
        })
    }

    pub fn extract(&self, page: &RenderedPage, item: &Item) -> Snapshot {
        let lower = page.html.to_lowercase();

        Snapshot {
            price: extract_price(&page.html),
            stock_level: extract_stock_level(&lower),
            cart_limit: self.extract_cart_limit(item, &page.title, &lower),
            image_url: self.extract_image(&page.html),
        }
    }

    fn extract_cart_limit(&self, item: &Item, title: &str, lower_html: &str) -> u32 {
        if let Some(limit) = item.cart_limit {
            return limit;
        }

        let names = format!("{} {}", item.name, title).to_lowercase();
        let category = self
            .category_limits
            .iter()
            .find(|c| c.keywords.iter().any(|k| names.contains(k.as_str())));
        if let Some(category) = category {
            return category.limit;
        }

        LIMIT_RE
            .captures(lower_html)
            .and_then(|caps| caps.get(1)?.as_str().parse::<u32>().ok())
            .filter(|limit| *limit > 0)
            .unwrap_or(self.default_cart_limit)
    }

    fn extract_image(&self, html: &str) -> Option<String> {
        self.image_re
            .find(html)
            .map(|m| format!("https://{}", m.as_str()))
    }
}

fn extract_price(html: &str) -> Option<Decimal> {
    let caps = PRICE_RE.captures(html)?;
    Decimal::from_str(caps.get(1)?.as_str()).ok()
}

fn extract_stock_level(lower_html: &str) -> StockLevel {
    if lower_html.contains("only") && lower_html.contains("left") {
        return REMAINING_RE
            .captures(lower_html)
            .and_then(|caps| caps.get(1)?.as_str().parse::<u32>().ok())
            .map(StockLevel::Remaining)
            .unwrap_or(StockLevel::Low);
    }

    if lower_html.contains("limited stock") {
        return StockLevel::Limited;
    }

    StockLevel::Unspecified
}
