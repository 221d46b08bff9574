//! Listing extraction strategies.
//!
//! Every lookup is an ordered chain of selectors; the first one that yields
//! something wins. All functions here work on already-parsed documents, so
//! they can be tested without a network.

use std::collections::HashSet;
use std::fmt;

use scraper::{ElementRef, Html, Selector};
use serde_json::Value;
use url::Url;

use crate::error::{AppError, Result};
use crate::models::{FilterConfig, RawItem, SourceConfig, parse_price};
use crate::utils::resolve_url;

/// Prefix some size labels carry on the Japanese storefront ("サイズ M").
const SIZE_LABEL_PREFIX: &str = "サイズ";

/// One price strategy with its selector compiled.
#[derive(Debug, Clone)]
pub struct PriceSelector {
    selector: Selector,
    sale_attr: String,
    list_attr: String,
}

/// Compiled selector chains for one source.
#[derive(Debug, Clone)]
pub struct Strategies {
    pub tiles: Vec<Selector>,
    pub pid_attr: String,
    pub name: Vec<Selector>,
    pub link: Vec<Selector>,
    pub image: Vec<Selector>,
    pub price: Vec<PriceSelector>,
    pub quick_add: Vec<Selector>,
    pub color: Vec<Selector>,
    pub stock_attrs: Vec<String>,
    pub size: Vec<Selector>,
    any_size: Selector,
    button: Selector,
}

impl Strategies {
    /// Compile every selector chain of the source configuration.
    pub fn from_config(config: &SourceConfig) -> Result<Self> {
        let price = config
            .price_strategies
            .iter()
            .map(|s| {
                Ok(PriceSelector {
                    selector: parse_selector(&s.selector)?,
                    sale_attr: s.sale_attr.clone(),
                    list_attr: s.list_attr.clone(),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            tiles: parse_selectors(&config.tile_selectors)?,
            pid_attr: config.pid_attr.clone(),
            name: parse_selectors(&config.name_selectors)?,
            link: parse_selectors(&config.link_selectors)?,
            image: parse_selectors(&config.image_selectors)?,
            price,
            quick_add: parse_selectors(&config.quick_add_selectors)?,
            color: parse_selectors(&config.color_selectors)?,
            stock_attrs: config.stock_attrs.clone(),
            size: parse_selectors(&config.size_selectors)?,
            any_size: parse_selector("[data-size], [data-value]")?,
            button: parse_selector("button")?,
        })
    }
}

pub fn parse_selector(s: &str) -> Result<Selector> {
    Selector::parse(s).map_err(|e| AppError::selector(s, format!("{e:?}")))
}

fn parse_selectors(list: &[String]) -> Result<Vec<Selector>> {
    list.iter().map(|s| parse_selector(s)).collect()
}

/// Why a tile did not become an item.
#[derive(Debug, Clone, PartialEq)]
pub enum SkipReason {
    /// No usable sale or list price
    MissingPrice,
    /// Discount outside the configured thresholds
    Filtered(f64),
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::MissingPrice => write!(f, "price missing"),
            SkipReason::Filtered(d) => write!(f, "discount {d}% outside thresholds"),
        }
    }
}

/// Tiles from the first tile selector that matches anything.
pub fn select_tiles<'a>(document: &'a Html, selectors: &[Selector]) -> Vec<ElementRef<'a>> {
    selectors
        .iter()
        .map(|sel| document.select(sel).collect::<Vec<_>>())
        .find(|tiles| !tiles.is_empty())
        .unwrap_or_default()
}

/// First element inside `root` matched by the chain.
fn first_in<'a>(root: ElementRef<'a>, selectors: &[Selector]) -> Option<ElementRef<'a>> {
    selectors.iter().find_map(|sel| root.select(sel).next())
}

fn text_of(element: ElementRef<'_>) -> String {
    element.text().collect::<String>().trim().to_string()
}

fn non_empty_attr<'a>(element: ElementRef<'a>, attr: &str) -> Option<&'a str> {
    element
        .value()
        .attr(attr)
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

/// Identity of a tile for pagination: product id, else link, else name.
pub fn tile_identity(tile: ElementRef<'_>, strategies: &Strategies) -> Option<String> {
    non_empty_attr(tile, &strategies.pid_attr)
        .map(|pid| format!("pid:{pid}"))
        .or_else(|| {
            first_in(tile, &strategies.link)
                .and_then(|el| non_empty_attr(el, "href"))
                .map(|href| format!("url:{href}"))
        })
        .or_else(|| {
            first_in(tile, &strategies.name)
                .map(text_of)
                .filter(|name| !name.is_empty())
                .map(|name| format!("name:{name}"))
        })
}

/// Sale and list price from the price strategy chain.
///
/// Later strategies only fill in the prices earlier ones left missing.
pub fn extract_prices(tile: ElementRef<'_>, strategies: &[PriceSelector]) -> (Option<f64>, Option<f64>) {
    let mut sale = None;
    let mut list = None;
    for strategy in strategies {
        if sale.is_some() && list.is_some() {
            break;
        }
        let Some(el) = tile.select(&strategy.selector).next() else {
            continue;
        };
        let attr_price = |attr: &str| {
            el.value()
                .attr(attr)
                .and_then(parse_price)
                .filter(|p| *p > 0.0)
        };
        sale = sale.or_else(|| attr_price(&strategy.sale_attr));
        list = list.or_else(|| attr_price(&strategy.list_attr));
    }
    (sale, list)
}

/// Read one listing tile into an item, applying the discount filter.
pub fn extract_tile(
    tile: ElementRef<'_>,
    strategies: &Strategies,
    base: &Url,
    filter: &FilterConfig,
) -> std::result::Result<RawItem, SkipReason> {
    let (sale, list) = extract_prices(tile, &strategies.price);
    let (Some(sale), Some(list)) = (sale, list) else {
        return Err(SkipReason::MissingPrice);
    };

    let item = RawItem {
        pid: non_empty_attr(tile, &strategies.pid_attr).map(str::to_string),
        name: first_in(tile, &strategies.name)
            .map(text_of)
            .unwrap_or_default(),
        product_link: first_in(tile, &strategies.link)
            .and_then(|el| non_empty_attr(el, "href"))
            .map(|href| resolve_url(base, href)),
        image_url: first_in(tile, &strategies.image)
            .and_then(|el| non_empty_attr(el, "content").or_else(|| non_empty_attr(el, "src")))
            .map(str::to_string),
        quick_add_url: first_in(tile, &strategies.quick_add)
            .and_then(|el| non_empty_attr(el, "data-url"))
            .map(|href| resolve_url(base, href)),
        ..RawItem::default()
    }
    .with_prices(Some(list), Some(sale));

    match item.discount_percent {
        Some(discount) if filter.accepts(discount) => Ok(item),
        Some(discount) => Err(SkipReason::Filtered(discount)),
        None => Err(SkipReason::MissingPrice),
    }
}

/// Whether a size or color option is marked unavailable.
pub fn is_disabled(element: ElementRef<'_>) -> bool {
    let attr = |name: &str| element.value().attr(name).unwrap_or("").to_lowercase();
    let class = attr("class");
    if class.contains("disabled") || class.contains("unavailable") {
        return true;
    }
    if matches!(attr("aria-disabled").as_str(), "true" | "1") {
        return true;
    }
    if matches!(attr("data-available").as_str(), "false" | "0") {
        return true;
    }
    element.value().attr("disabled").is_some()
}

/// Normalize a size label; "サイズ M" becomes "M".
pub fn clean_size_label(raw: &str) -> Option<String> {
    let label = raw.trim();
    if label.is_empty() {
        return None;
    }
    if label.to_lowercase().starts_with(SIZE_LABEL_PREFIX) {
        return label.split_whitespace().last().map(str::to_string);
    }
    Some(label.to_string())
}

/// Size label of one option element.
pub fn size_label(element: ElementRef<'_>) -> Option<String> {
    ["data-size", "data-value", "value", "aria-label"]
        .iter()
        .filter_map(|attr| element.value().attr(attr))
        .find_map(clean_size_label)
        .or_else(|| clean_size_label(&text_of(element)))
}

/// Enabled sizes from the first size selector that yields any.
///
/// Falls back to any `data-size`/`data-value` attribute in the document.
pub fn parse_sizes(document: &Html, strategies: &Strategies) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut sizes = Vec::new();
    for selector in &strategies.size {
        for el in document.select(selector) {
            if is_disabled(el) {
                continue;
            }
            if let Some(size) = size_label(el) {
                if seen.insert(size.clone()) {
                    sizes.push(size);
                }
            }
        }
        if !sizes.is_empty() {
            return sizes;
        }
    }

    for el in document.select(&strategies.any_size) {
        let value = non_empty_attr(el, "data-size").or_else(|| non_empty_attr(el, "data-value"));
        if let Some(size) = value.and_then(clean_size_label) {
            if seen.insert(size.clone()) {
                sizes.push(size);
            }
        }
    }
    sizes
}

/// Parse an in-stock size attribute.
///
/// Accepts a JSON array (`["S","M"]`) or a loose comma list (`[S, 'M']`).
pub fn parse_size_list(value: &str) -> Vec<String> {
    let value = value.trim();
    if value.is_empty() {
        return Vec::new();
    }
    if let Ok(Value::Array(entries)) = serde_json::from_str::<Value>(value) {
        return entries
            .into_iter()
            .filter_map(|entry| match entry {
                Value::Null | Value::Bool(false) => None,
                Value::String(s) => Some(s.trim().to_string()),
                other => Some(other.to_string()),
            })
            .filter(|s| !s.is_empty())
            .collect();
    }
    value
        .trim_matches(|c| c == '[' || c == ']')
        .split(',')
        .map(|part| part.trim().trim_matches(|c| c == '"' || c == '\'').to_string())
        .filter(|part| !part.is_empty())
        .collect()
}

/// Sizes available in one color, or overall when `color` is `None`.
#[derive(Debug, Clone, PartialEq)]
pub struct SizeGroup {
    pub color: Option<String>,
    pub sizes: Vec<String>,
}

impl SizeGroup {
    /// `"Navy: S M"`, or `"S M"` without a color.
    pub fn label(&self) -> Option<String> {
        if self.sizes.is_empty() {
            return None;
        }
        let sizes = self.sizes.join(" ");
        match self.color.as_deref().filter(|c| !c.is_empty()) {
            Some(color) => Some(format!("{color}: {sizes}")),
            None => Some(sizes),
        }
    }
}

/// Flatten size groups into the labels stored on an item.
pub fn size_group_labels(groups: &[SizeGroup]) -> Vec<String> {
    groups.iter().filter_map(SizeGroup::label).collect()
}

fn color_name(element: ElementRef<'_>, fallback: String) -> String {
    [
        "data-display-value",
        "data-color-name",
        "data-value",
        "data-attr-value",
        "aria-label",
        "title",
    ]
    .iter()
    .find_map(|attr| non_empty_attr(element, attr).map(str::to_string))
    .or_else(|| Some(text_of(element)).filter(|t| !t.is_empty()))
    .unwrap_or(fallback)
}

/// Per-color in-stock sizes from a product page.
///
/// Reads the stock attributes of each color swatch. A page without swatches
/// falls back to its enabled size options as one uncolored group.
pub fn parse_color_groups(document: &Html, strategies: &Strategies) -> Vec<SizeGroup> {
    let swatches: Vec<ElementRef<'_>> = strategies
        .color
        .iter()
        .map(|sel| document.select(sel).collect::<Vec<_>>())
        .find(|found| !found.is_empty())
        .unwrap_or_default();

    if swatches.is_empty() {
        let sizes = parse_sizes(document, strategies);
        if sizes.is_empty() {
            return Vec::new();
        }
        return vec![SizeGroup { color: None, sizes }];
    }

    let mut seen = HashSet::new();
    let mut groups = Vec::new();
    for (idx, swatch) in swatches.into_iter().enumerate() {
        let data_el = if swatch.value().name() == "button" {
            swatch
        } else {
            swatch.select(&strategies.button).next().unwrap_or(swatch)
        };
        if is_disabled(swatch) && is_disabled(data_el) {
            continue;
        }

        let color = color_name(data_el, format!("Color #{}", idx + 1));
        let key = non_empty_attr(data_el, "data-attr-value")
            .or_else(|| non_empty_attr(data_el, "data-caption"))
            .map(str::to_string)
            .unwrap_or_else(|| color.clone());
        if seen.contains(&key) {
            continue;
        }

        let sizes = strategies
            .stock_attrs
            .iter()
            .find_map(|attr| non_empty_attr(data_el, attr))
            .map(parse_size_list)
            .unwrap_or_default();
        if sizes.is_empty() {
            log::debug!("No in-stock sizes on swatch '{}'", color);
            continue;
        }
        seen.insert(key);
        groups.push(SizeGroup {
            color: Some(color),
            sizes,
        });
    }
    groups
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strategies() -> Strategies {
        Strategies::from_config(&SourceConfig::default()).unwrap()
    }

    fn base() -> Url {
        Url::parse("https://www.example.jp").unwrap()
    }

    const LISTING: &str = r#"
        <div class="grid">
          <div class="product" data-pid="70123">
            <div class="product-tile__cover">
              <meta itemprop="image" content="https://img.example.jp/70123.jpg">
            </div>
            <div class="pdp-link">
              <a class="link" itemprop="url" href="/product/70123.html">
                <span class="product-tile__name"> Retro-X Jacket </span>
              </a>
            </div>
            <product-tile-pricing sale-price="16500.0" list-price="33000.0"></product-tile-pricing>
            <div class="product-tile__quickadd-container">
              <button class="tile-quickadd-btn" data-url="/quickadd?pid=70123"></button>
            </div>
          </div>
          <div class="product" data-pid="70124">
            <div class="pdp-link"><span class="product-tile__name">Fallback Price</span></div>
            <product-tile-pricing list-price="10000"></product-tile-pricing>
            <span data-sale-price="¥ 6,000" data-list-price="¥ 9,999"></span>
          </div>
          <div class="product" data-pid="70125">
            <div class="pdp-link"><span class="product-tile__name">Small Discount</span></div>
            <product-tile-pricing sale-price="9000" list-price="10000"></product-tile-pricing>
          </div>
          <div class="product" data-pid="70126">
            <div class="pdp-link"><span class="product-tile__name">No Price</span></div>
            <product-tile-pricing sale-price="0" list-price="10000"></product-tile-pricing>
          </div>
        </div>
    "#;

    #[test]
    fn test_invalid_selector_is_reported() {
        let config = SourceConfig {
            tile_selectors: vec!["[[invalid".into()],
            ..SourceConfig::default()
        };
        assert!(matches!(
            Strategies::from_config(&config),
            Err(AppError::Selector { .. })
        ));
    }

    #[test]
    fn test_select_tiles_uses_first_matching_selector() {
        let doc = Html::parse_document(
            r#"<div class="product-grid__tile" data-pid="a"></div>
               <div class="product-grid__tile" data-pid="b"></div>"#,
        );
        assert_eq!(select_tiles(&doc, &strategies().tiles).len(), 2);

        let empty = Html::parse_document("<p>nothing</p>");
        assert!(select_tiles(&empty, &strategies().tiles).is_empty());
    }

    #[test]
    fn test_extract_tile_fields() {
        let doc = Html::parse_document(LISTING);
        let s = strategies();
        let tiles = select_tiles(&doc, &s.tiles);
        assert_eq!(tiles.len(), 4);

        let item = extract_tile(tiles[0], &s, &base(), &FilterConfig::default()).unwrap();
        assert_eq!(item.pid.as_deref(), Some("70123"));
        assert_eq!(item.name, "Retro-X Jacket");
        assert_eq!(
            item.product_link.as_deref(),
            Some("https://www.example.jp/product/70123.html")
        );
        assert_eq!(item.image_url.as_deref(), Some("https://img.example.jp/70123.jpg"));
        assert_eq!(
            item.quick_add_url.as_deref(),
            Some("https://www.example.jp/quickadd?pid=70123")
        );
        assert_eq!(item.original_price, Some(33000.0));
        assert_eq!(item.sale_price, Some(16500.0));
        assert_eq!(item.discount_percent, Some(50.0));
    }

    #[test]
    fn test_price_strategy_fills_missing_values() {
        let doc = Html::parse_document(LISTING);
        let s = strategies();
        let tiles = select_tiles(&doc, &s.tiles);

        let (sale, list) = extract_prices(tiles[1], &s.price);
        assert_eq!(sale, Some(6000.0));
        // The first strategy already supplied the list price.
        assert_eq!(list, Some(10000.0));
    }

    #[test]
    fn test_extract_tile_skips() {
        let doc = Html::parse_document(LISTING);
        let s = strategies();
        let tiles = select_tiles(&doc, &s.tiles);
        let filter = FilterConfig::default();

        assert_eq!(
            extract_tile(tiles[2], &s, &base(), &filter),
            Err(SkipReason::Filtered(10.0))
        );
        assert_eq!(
            extract_tile(tiles[3], &s, &base(), &filter),
            Err(SkipReason::MissingPrice)
        );
    }

    #[test]
    fn test_tile_identity() {
        let doc = Html::parse_document(
            r#"<div class="product-grid__tile" data-pid="p9"></div>
               <div class="product-grid__tile" data-pid="">
                 <div class="pdp-link"><a class="link" itemprop="url" href="/x.html">X</a></div>
               </div>
               <div class="product-grid__tile" data-pid=""></div>"#,
        );
        let s = strategies();
        let tiles = select_tiles(&doc, &s.tiles);
        assert_eq!(tile_identity(tiles[0], &s).as_deref(), Some("pid:p9"));
        assert_eq!(tile_identity(tiles[1], &s).as_deref(), Some("url:/x.html"));
        assert_eq!(tile_identity(tiles[2], &s), None);
    }

    #[test]
    fn test_parse_size_list() {
        assert_eq!(parse_size_list(r#"["S", "M", " L "]"#), vec!["S", "M", "L"]);
        assert_eq!(parse_size_list("[XS, 'M', \"XL\"]"), vec!["XS", "M", "XL"]);
        assert_eq!(parse_size_list("[28, 30, null]"), vec!["28", "30"]);
        assert!(parse_size_list("  ").is_empty());
        assert!(parse_size_list("[]").is_empty());
    }

    #[test]
    fn test_clean_size_label() {
        assert_eq!(clean_size_label("サイズ M").as_deref(), Some("M"));
        assert_eq!(clean_size_label("  XL ").as_deref(), Some("XL"));
        assert_eq!(clean_size_label("   "), None);
    }

    #[test]
    fn test_quick_add_sizes() {
        let doc = Html::parse_fragment(
            r#"<label class="pdp-size-select" data-size="S">S</label>
               <label class="pdp-size-select is-disabled" data-size="M">M</label>
               <label class="pdp-size-select">サイズ L</label>
               <label class="pdp-size-select" data-size="S">S</label>"#,
        );
        assert_eq!(parse_sizes(&doc, &strategies()), vec!["S", "L"]);
    }

    #[test]
    fn test_quick_add_sizes_attribute_fallback() {
        let doc = Html::parse_fragment(
            r#"<div><span data-value="28"></span><span data-size="30"></span></div>"#,
        );
        assert_eq!(parse_sizes(&doc, &strategies()), vec!["28", "30"]);
    }

    #[test]
    fn test_color_groups_from_stock_attributes() {
        let doc = Html::parse_document(
            r#"<div data-attr="color">
                 <button data-attr-value="NENA" data-display-value="New Navy"
                         data-size-stock='["S","M"]'></button>
                 <button data-attr-value="BLK" data-color-name="Black"
                         data-online-instock="[L, XL]"></button>
                 <button data-attr-value="NENA" data-size-stock='["XS"]'></button>
                 <button class="disabled" data-attr-value="RED" data-size-stock='["M"]'></button>
                 <button data-attr-value="GRN" data-size-stock="[]"></button>
               </div>"#,
        );
        let groups = parse_color_groups(&doc, &strategies());
        assert_eq!(
            size_group_labels(&groups),
            vec!["New Navy: S M", "Black: L XL"]
        );
    }

    #[test]
    fn test_color_groups_without_swatches_use_size_options() {
        let doc = Html::parse_document(
            r#"<fieldset data-attr="size">
                 <button data-value="S"></button>
                 <button data-value="M" disabled></button>
               </fieldset>"#,
        );
        let groups = parse_color_groups(&doc, &strategies());
        assert_eq!(groups, vec![SizeGroup { color: None, sizes: vec!["S".into()] }]);
        assert_eq!(size_group_labels(&groups), vec!["S"]);
    }
}
