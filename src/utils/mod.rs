//! Utility functions and helpers.

pub mod http;
pub mod log;

use url::Url;

/// Resolve a potentially relative URL against a base URL.
pub fn resolve_url(base: &Url, href: &str) -> String {
    base.join(href)
        .map(|u| u.to_string())
        .unwrap_or_else(|_| href.to_string())
}

/// Build the URL of a 1-based listing page from a `{page}` template.
pub fn page_url(template: &str, page: u32) -> String {
    template.replace("{page}", &page.to_string())
}
