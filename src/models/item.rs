//! Raw item records produced by an item source.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// One listing entry as observed by an extractor.
///
/// Every field is best-effort: extractors may leave any of them empty.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawItem {
    /// Stable product identifier, when the listing exposes one
    #[serde(default, deserialize_with = "optional_label")]
    pub pid: Option<String>,

    /// Display name
    #[serde(default, deserialize_with = "label_or_empty")]
    pub name: String,

    /// List price before the discount
    #[serde(default)]
    pub original_price: Option<f64>,

    /// Current sale price
    #[serde(default)]
    pub sale_price: Option<f64>,

    /// Discount in percent, rounded to one decimal
    #[serde(default)]
    pub discount_percent: Option<f64>,

    /// Absolute URL of the product page
    #[serde(default, deserialize_with = "optional_label")]
    pub product_link: Option<String>,

    /// Available size labels, optionally prefixed with a color group (`"Navy: S M"`)
    #[serde(default, deserialize_with = "size_labels")]
    pub sizes: Vec<String>,

    /// Product image, used by the HTML report
    #[serde(default, deserialize_with = "optional_label")]
    pub image_url: Option<String>,

    /// Quick-add fragment URL; only used while extracting sizes
    #[serde(default, skip_serializing, deserialize_with = "optional_label")]
    pub quick_add_url: Option<String>,
}

impl RawItem {
    /// Set both prices and derive the discount from them.
    pub fn with_prices(mut self, original: Option<f64>, sale: Option<f64>) -> Self {
        self.original_price = original;
        self.sale_price = sale;
        self.discount_percent = discount_percent(original, sale);
        self
    }
}

/// `(original - sale) * 100 / original`, rounded to one decimal.
///
/// Returns `None` when either price is missing or the original price is not positive.
pub fn discount_percent(original: Option<f64>, sale: Option<f64>) -> Option<f64> {
    let (original, sale) = (original?, sale?);
    if original <= 0.0 {
        return None;
    }
    let raw = (original - sale) * 100.0 / original;
    Some((raw * 10.0).round() / 10.0)
}

/// Parse a human-formatted amount, keeping only digits and dots.
///
/// Accepts both `"8250.0"` and `"¥ 8,250"`; returns `None` when nothing numeric remains.
pub fn parse_price(text: &str) -> Option<f64> {
    let digits: String = text
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.')
        .collect();
    if digits.is_empty() {
        return None;
    }
    digits.parse().ok()
}

/// Render a JSON scalar as a label; `null` and containers yield `None`.
fn scalar_label(value: Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

fn optional_label<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Value>::deserialize(deserializer)?.and_then(scalar_label))
}

fn label_or_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(optional_label(deserializer)?.unwrap_or_default())
}

fn size_labels<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let values = Option::<Vec<Value>>::deserialize(deserializer)?.unwrap_or_default();
    Ok(values.into_iter().filter_map(scalar_label).collect())
}
