//! HTML listing of everything observed in a run.

use std::fmt::Write;

use html_escape::{encode_double_quoted_attribute, encode_text};

use crate::models::RawItem;
use crate::pipeline::summary::format_amount;

const STYLE: &str = r#"
        body { font-family: Arial, sans-serif; }
        .product { border: 1px solid #ddd; padding: 10px; margin: 10px 0; }
        .product img { max-width: 200px; }
        .product h2 { font-size: 1.2em; color: #333; }
        .price { font-weight: bold; color: #d9534f; }
        .original-price { text-decoration: line-through; color: #888; }
        .timestamp { color: #555; font-size: 0.9em; margin-top: 10px; }
        .sizes { margin-top: 5px; color: #555; font-size: 0.9em; }
"#;

/// Render the full product listing as a standalone HTML document.
///
/// `generated_at` is shown verbatim; all item text is escaped.
pub fn render_report(items: &[RawItem], generated_at: &str, currency: &str) -> String {
    let mut html = String::new();
    let _ = write!(
        html,
        r#"<!DOCTYPE html>
<html lang="ja">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>Discounted Products</title>
    <style>{STYLE}    </style>
</head>
<body>
    <h1>Discounted Products</h1>
    <p class="timestamp">Generated on: {}</p>
"#,
        encode_text(generated_at)
    );

    for item in items {
        let name = encode_text(&item.name);
        let link = item.product_link.as_deref().unwrap_or("#");
        let image = item.image_url.as_deref().unwrap_or("");
        let sizes = if item.sizes.is_empty() {
            "-".to_string()
        } else {
            item.sizes.join(" | ")
        };

        let _ = write!(
            html,
            r#"    <div class="product">
        <h2>{name}</h2>
        <a href="{}" target="_blank">
            <img src="{}" alt="{}">
        </a>
        <p class="original-price">Original Price: {currency} {}</p>
        <p class="price">Sale Price: {currency} {}</p>
        <p>Discount Percent: {}%</p>
        <p class="sizes">Sizes: {}</p>
    </div>
"#,
            encode_double_quoted_attribute(link),
            encode_double_quoted_attribute(image),
            encode_double_quoted_attribute(&item.name),
            price_text(item.original_price),
            price_text(item.sale_price),
            item.discount_percent
                .map_or_else(|| "-".to_string(), |d| format!("{d:.1}")),
            encode_text(&sizes),
        );
    }

    html.push_str("</body>\n</html>\n");
    html
}

fn price_text(price: Option<f64>) -> String {
    price.map_or_else(|| "-".to_string(), format_amount)
}
