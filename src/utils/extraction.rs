//! Product data extraction for tracking calls.
//!
//! Product pages embed JSON-LD; when it is missing, malformed or not a
//! `Product`, the explicit hint fields sent with the call are used instead.

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProductHints {
    pub name: Option<String>,
    /// Raw price text as rendered on the page, e.g. `₺1,299.00`.
    pub price_text: Option<String>,
    pub category: Option<String>,
    pub brand: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractedProduct {
    pub name: Option<String>,
    pub price: Option<f64>,
    pub category: Option<String>,
    pub brand: Option<String>,
}

impl ExtractedProduct {
    fn is_empty(&self) -> bool {
        self.name.is_none() && self.price.is_none() && self.category.is_none() && self.brand.is_none()
    }
}

pub fn extract_product(json_ld: Option<&str>, hints: &ProductHints) -> Option<ExtractedProduct> {
    if let Some(product) = json_ld.and_then(|raw| from_json_ld(raw, hints)) {
        return Some(product);
    }

    let fallback = ExtractedProduct {
        name: clean(hints.name.as_deref()),
        price: hints.price_text.as_deref().and_then(parse_price_text),
        category: clean(hints.category.as_deref()),
        brand: clean(hints.brand.as_deref()),
    };

    if fallback.is_empty() {
        None
    } else {
        Some(fallback)
    }
}

fn from_json_ld(raw: &str, hints: &ProductHints) -> Option<ExtractedProduct> {
    let value: Value = match serde_json::from_str(raw) {
        Ok(value) => value,
        Err(e) => {
            tracing::debug!("Malformed JSON-LD, using hint fields: {}", e);
            return None;
        }
    };
    let product = find_product(&value)?;

    let price = match product.get("offers") {
        Some(Value::Array(offers)) => offers.first().and_then(offer_price),
        Some(offer) => offer_price(offer),
        None => None,
    };

    let brand = match product.get("brand") {
        Some(Value::String(name)) => clean(Some(name)),
        Some(Value::Object(brand)) => clean(brand.get("name").and_then(Value::as_str)),
        _ => None,
    }
    .or_else(|| clean(hints.brand.as_deref()));

    Some(ExtractedProduct {
        name: clean(product.get("name").and_then(Value::as_str)),
        price,
        category: clean(hints.category.as_deref()),
        brand,
    })
}

fn find_product(value: &Value) -> Option<&Value> {
    match value {
        Value::Object(map) => {
            if map.get("@type").and_then(Value::as_str) == Some("Product") {
                return Some(value);
            }
            map.get("@graph").and_then(find_product)
        }
        Value::Array(items) => items.iter().find_map(find_product),
        _ => None,
    }
}

fn offer_price(offer: &Value) -> Option<f64> {
    match offer.get("price")? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => parse_price_text(s),
        _ => None,
    }
}

/// Keeps digits and dots only, then parses; `₺1,299.00` becomes `1299.0`.
pub fn parse_price_text(text: &str) -> Option<f64> {
    let digits: String = text.chars().filter(|c| c.is_ascii_digit() || *c == '.').collect();
    digits.parse::<f64>().ok().filter(|p| p.is_finite())
}

fn clean(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}
