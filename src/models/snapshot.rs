use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Shown in place of a price that could not be found on the page.
pub const PRICE_UNAVAILABLE: &str = "N/A";

/// Structured data pulled from one rendered page at one point in time.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Snapshot {
    pub price: Option<Decimal>,
    pub stock_level: StockLevel,
    pub cart_limit: u32,
    pub image_url: Option<String>,
}

impl Snapshot {
    pub fn formatted_price(&self) -> String {
        match self.price {
            Some(price) => format!("${:.2}", price),
            None => PRICE_UNAVAILABLE.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", content = "count", rename_all = "lowercase")]
pub enum StockLevel {
    /// "Only N left" with a readable count.
    Remaining(u32),
    /// Low-stock phrasing without a count.
    Low,
    Limited,
    /// In stock, quantity not stated.
    Unspecified,
}

impl fmt::Display for StockLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StockLevel::Remaining(count) => write!(f, "{} Left", count),
            StockLevel::Low => write!(f, "Low"),
            StockLevel::Limited => write!(f, "Limited"),
            StockLevel::Unspecified => write!(f, "I+"),
        }
    }
}
