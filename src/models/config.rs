//! Application configuration structures.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// Root application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Listing pages and extraction strategies
    #[serde(default)]
    pub source: SourceConfig,

    /// Discount thresholds applied while extracting
    #[serde(default)]
    pub filter: FilterConfig,

    /// HTTP client settings
    #[serde(default)]
    pub http: HttpConfig,

    /// State and report persistence
    #[serde(default)]
    pub storage: StorageConfig,

    /// Summary formatting and chat delivery
    #[serde(default)]
    pub notify: NotifyConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load configuration if the file exists, otherwise use defaults.
    ///
    /// A file that exists but fails to read or parse is an error.
    pub fn load_optional(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            log::info!("No config at {}; using defaults", path.display());
            return Ok(Self::default());
        }
        Self::load(path)
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        if self.http.user_agent.trim().is_empty() {
            return Err(AppError::validation("http.user_agent is empty"));
        }
        if self.http.timeout_secs == 0 {
            return Err(AppError::validation("http.timeout_secs must be > 0"));
        }
        if !self.source.listing_url.contains("{page}") {
            return Err(AppError::validation(
                "source.listing_url must contain a {page} placeholder",
            ));
        }
        url::Url::parse(&self.source.base_url)?;
        if self.source.tile_selectors.is_empty() {
            return Err(AppError::validation("No tile selectors defined"));
        }
        if self.source.price_strategies.is_empty() {
            return Err(AppError::validation("No price strategies defined"));
        }
        if self.source.max_pages == Some(0) {
            return Err(AppError::validation("source.max_pages must be > 0"));
        }
        for (label, value) in [
            ("filter.min_discount_percent", self.filter.min_discount_percent),
            ("filter.max_discount_percent", self.filter.max_discount_percent),
        ] {
            if let Some(v) = value {
                if !(0.0..=100.0).contains(&v) {
                    return Err(AppError::validation(format!(
                        "{label} must be within 0..=100"
                    )));
                }
            }
        }
        if let (Some(min), Some(max)) = (
            self.filter.min_discount_percent,
            self.filter.max_discount_percent,
        ) {
            if min >= max {
                return Err(AppError::validation(
                    "filter.min_discount_percent must be below filter.max_discount_percent",
                ));
            }
        }
        if self.notify.max_chars < 100 {
            return Err(AppError::validation("notify.max_chars must be >= 100"));
        }
        if self.storage.state_file.trim().is_empty() || self.storage.report_file.trim().is_empty()
        {
            return Err(AppError::validation("storage file names must not be empty"));
        }
        Ok(())
    }
}

/// Where listings come from and how tiles are read.
///
/// Every `*_selectors` list is an ordered fallback chain: the first selector
/// that matches anything wins.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Site root used to resolve relative links
    #[serde(default = "defaults::base_url")]
    pub base_url: String,

    /// Listing URL template with a `{page}` placeholder (1-based)
    #[serde(default = "defaults::listing_url")]
    pub listing_url: String,

    /// Page bound; `None` pages until a page adds no new tiles
    #[serde(default)]
    pub max_pages: Option<u32>,

    /// Delay between listing pages in milliseconds
    #[serde(default = "defaults::page_delay")]
    pub page_delay_ms: u64,

    /// Visit product pages for size availability
    #[serde(default = "defaults::fetch_sizes")]
    pub fetch_sizes: bool,

    #[serde(default = "defaults::tile_selectors")]
    pub tile_selectors: Vec<String>,

    /// Attribute on the tile holding the product id
    #[serde(default = "defaults::pid_attr")]
    pub pid_attr: String,

    #[serde(default = "defaults::name_selectors")]
    pub name_selectors: Vec<String>,

    #[serde(default = "defaults::link_selectors")]
    pub link_selectors: Vec<String>,

    #[serde(default = "defaults::image_selectors")]
    pub image_selectors: Vec<String>,

    #[serde(default = "defaults::price_strategies")]
    pub price_strategies: Vec<PriceStrategy>,

    /// Element carrying the quick-add fragment URL in a `data-url` attribute
    #[serde(default = "defaults::quick_add_selectors")]
    pub quick_add_selectors: Vec<String>,

    /// Color swatches on a product page
    #[serde(default = "defaults::color_selectors")]
    pub color_selectors: Vec<String>,

    /// Swatch attributes holding the in-stock size list, in priority order
    #[serde(default = "defaults::stock_attrs")]
    pub stock_attrs: Vec<String>,

    /// Enabled size options inside a quick-add fragment
    #[serde(default = "defaults::size_selectors")]
    pub size_selectors: Vec<String>,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            base_url: defaults::base_url(),
            listing_url: defaults::listing_url(),
            max_pages: None,
            page_delay_ms: defaults::page_delay(),
            fetch_sizes: defaults::fetch_sizes(),
            tile_selectors: defaults::tile_selectors(),
            pid_attr: defaults::pid_attr(),
            name_selectors: defaults::name_selectors(),
            link_selectors: defaults::link_selectors(),
            image_selectors: defaults::image_selectors(),
            price_strategies: defaults::price_strategies(),
            quick_add_selectors: defaults::quick_add_selectors(),
            color_selectors: defaults::color_selectors(),
            stock_attrs: defaults::stock_attrs(),
            size_selectors: defaults::size_selectors(),
        }
    }
}

/// Read sale and list price from two attributes of one element.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceStrategy {
    pub selector: String,
    pub sale_attr: String,
    pub list_attr: String,
}

/// Discount thresholds. Both bounds are optional.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterConfig {
    /// Keep items whose discount is strictly greater than this
    #[serde(default = "defaults::min_discount")]
    pub min_discount_percent: Option<f64>,

    /// Keep items whose discount is at most this
    #[serde(default)]
    pub max_discount_percent: Option<f64>,
}

impl FilterConfig {
    pub fn accepts(&self, discount: f64) -> bool {
        self.min_discount_percent.is_none_or(|min| discount > min)
            && self.max_discount_percent.is_none_or(|max| discount <= max)
    }
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            min_discount_percent: defaults::min_discount(),
            max_discount_percent: None,
        }
    }
}

/// HTTP client settings shared by every remote call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    /// Request timeout in seconds
    #[serde(default = "defaults::timeout")]
    pub timeout_secs: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            user_agent: defaults::user_agent(),
            timeout_secs: defaults::timeout(),
        }
    }
}

/// Persistence backend selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Gist,
    Local,
}

/// State and report persistence settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackend,

    /// Directory for the local backend
    #[serde(default = "defaults::local_dir")]
    pub local_dir: PathBuf,

    #[serde(default = "defaults::gist_api")]
    pub gist_api: String,

    #[serde(default = "defaults::state_description")]
    pub state_description: String,

    #[serde(default = "defaults::state_file")]
    pub state_file: String,

    #[serde(default = "defaults::report_description")]
    pub report_description: String,

    #[serde(default = "defaults::report_file")]
    pub report_file: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::default(),
            local_dir: defaults::local_dir(),
            gist_api: defaults::gist_api(),
            state_description: defaults::state_description(),
            state_file: defaults::state_file(),
            report_description: defaults::report_description(),
            report_file: defaults::report_file(),
        }
    }
}

/// Summary formatting and chat delivery settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifyConfig {
    #[serde(default = "defaults::telegram_api")]
    pub telegram_api: String,

    #[serde(default = "defaults::serverchan_api")]
    pub serverchan_api: String,

    /// First line of every summary
    #[serde(default = "defaults::title")]
    pub title: String,

    /// Itemized entries per category
    #[serde(default = "defaults::max_items")]
    pub max_items: usize,

    /// Upper bound on summary length in characters
    #[serde(default = "defaults::max_chars")]
    pub max_chars: usize,

    #[serde(default = "defaults::currency")]
    pub currency: String,

    /// Offset of the display timezone from UTC
    #[serde(default = "defaults::utc_offset_hours")]
    pub utc_offset_hours: i32,

    #[serde(default = "defaults::timezone_label")]
    pub timezone_label: String,
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            telegram_api: defaults::telegram_api(),
            serverchan_api: defaults::serverchan_api(),
            title: defaults::title(),
            max_items: defaults::max_items(),
            max_chars: defaults::max_chars(),
            currency: defaults::currency(),
            utc_offset_hours: defaults::utc_offset_hours(),
            timezone_label: defaults::timezone_label(),
        }
    }
}

mod defaults {
    use std::path::PathBuf;

    use super::PriceStrategy;

    // Source defaults
    pub fn base_url() -> String {
        "https://www.patagonia.jp".into()
    }
    pub fn listing_url() -> String {
        "https://www.patagonia.jp/shop/web-specials?page={page}".into()
    }
    pub fn page_delay() -> u64 {
        1500
    }
    pub fn fetch_sizes() -> bool {
        true
    }
    pub fn tile_selectors() -> Vec<String> {
        vec![
            "div.product[data-pid]".into(),
            "div.product-grid__tile[data-pid]".into(),
            "div[data-pid].product-grid__tile".into(),
        ]
    }
    pub fn pid_attr() -> String {
        "data-pid".into()
    }
    pub fn name_selectors() -> Vec<String> {
        vec![".pdp-link .product-tile__name".into()]
    }
    pub fn link_selectors() -> Vec<String> {
        vec![".pdp-link a.link[itemprop='url']".into()]
    }
    pub fn image_selectors() -> Vec<String> {
        vec![
            ".product-tile__image.default.active meta[itemprop='image']".into(),
            ".product-tile__cover meta[itemprop='image']".into(),
        ]
    }
    pub fn price_strategies() -> Vec<PriceStrategy> {
        vec![
            PriceStrategy {
                selector: "product-tile-pricing".into(),
                sale_attr: "sale-price".into(),
                list_attr: "list-price".into(),
            },
            PriceStrategy {
                selector: "[data-sale-price][data-list-price]".into(),
                sale_attr: "data-sale-price".into(),
                list_attr: "data-list-price".into(),
            },
        ]
    }
    pub fn quick_add_selectors() -> Vec<String> {
        vec![".product-tile__quickadd-container .tile-quickadd-btn[data-url]".into()]
    }
    pub fn color_selectors() -> Vec<String> {
        vec![
            "[data-attr='color'] button".into(),
            "[data-attr='color'] label".into(),
            "[data-attr='color'] a".into(),
            "fieldset[data-attr='color'] button".into(),
            ".color-attribute button".into(),
            ".product-attribute__color button".into(),
        ]
    }
    pub fn stock_attrs() -> Vec<String> {
        vec!["data-size-stock".into(), "data-online-instock".into()]
    }
    pub fn size_selectors() -> Vec<String> {
        vec![
            "label.pdp-size-select:not(.is-disabled)".into(),
            "button.pdp-size-select:not(.is-disabled)".into(),
            "[data-attr='size'] button:not([disabled])".into(),
        ]
    }

    // Filter defaults
    pub fn min_discount() -> Option<f64> {
        Some(30.0)
    }

    // HTTP defaults
    pub fn user_agent() -> String {
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) \
         Chrome/87.0.4280.88 Safari/537.36"
            .into()
    }
    pub fn timeout() -> u64 {
        30
    }

    // Storage defaults
    pub fn local_dir() -> PathBuf {
        PathBuf::from("storage")
    }
    pub fn gist_api() -> String {
        "https://api.github.com".into()
    }
    pub fn state_description() -> String {
        "Patagonia Discount State".into()
    }
    pub fn state_file() -> String {
        "discount_state.json".into()
    }
    pub fn report_description() -> String {
        "Patagonia Discounted Products".into()
    }
    pub fn report_file() -> String {
        "discounted_products.html".into()
    }

    // Notify defaults
    pub fn telegram_api() -> String {
        "https://api.telegram.org".into()
    }
    pub fn serverchan_api() -> String {
        "https://sctapi.ftqq.com".into()
    }
    pub fn title() -> String {
        "Patagonia discount watch: new additions".into()
    }
    pub fn max_items() -> usize {
        8
    }
    pub fn max_chars() -> usize {
        3900
    }
    pub fn currency() -> String {
        "¥".into()
    }
    pub fn utc_offset_hours() -> i32 {
        9
    }
    pub fn timezone_label() -> String {
        "JST".into()
    }
}
