// src/services/listing.rs

//! Listing crawler.
//!
//! Walks the paginated sale listing, reads each tile through the configured
//! strategy chains, then looks up size availability per item.

use std::collections::HashSet;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use scraper::Html;
use url::Url;

use crate::error::{AppError, Result};
use crate::models::{Config, FilterConfig, RawItem, SourceConfig};
use crate::services::extract::{self, SizeGroup, Strategies};
use crate::services::source::ItemSource;
use crate::utils::http::{fetch_text, truncate_body};
use crate::utils::page_url;

/// What one listing page contributed.
#[derive(Debug, Default)]
pub struct PageOutcome {
    /// Tiles found on the page
    pub tiles: usize,
    /// Tiles not seen on an earlier page
    pub new_tiles: usize,
    /// Items that passed price extraction and the discount filter
    pub items: Vec<RawItem>,
}

/// Item source backed by the storefront's static listing HTML.
pub struct ListingSource {
    client: Client,
    source: SourceConfig,
    filter: FilterConfig,
    strategies: Strategies,
    base: Url,
}

impl ListingSource {
    pub fn new(client: Client, config: &Config) -> Result<Self> {
        Ok(Self {
            client,
            source: config.source.clone(),
            filter: config.filter.clone(),
            strategies: Strategies::from_config(&config.source)?,
            base: Url::parse(&config.source.base_url)?,
        })
    }

    /// Extract the tiles of one listing page.
    ///
    /// Tiles whose identity is in `seen` are ignored; new identities are added.
    pub fn extract_page(&self, body: &str, page: u32, seen: &mut HashSet<String>) -> PageOutcome {
        let document = Html::parse_document(body);
        let tiles = extract::select_tiles(&document, &self.strategies.tiles);
        let mut outcome = PageOutcome {
            tiles: tiles.len(),
            ..PageOutcome::default()
        };

        for (idx, tile) in tiles.into_iter().enumerate() {
            let Some(identity) = extract::tile_identity(tile, &self.strategies) else {
                log::debug!("[page {} #{}] tile without identity, ignored", page, idx + 1);
                continue;
            };
            if !seen.insert(identity) {
                continue;
            }
            outcome.new_tiles += 1;

            match extract::extract_tile(tile, &self.strategies, &self.base, &self.filter) {
                Ok(item) => outcome.items.push(item),
                Err(reason) => log::debug!("[skip page {} #{}] {}", page, idx + 1, reason),
            }
        }
        outcome
    }

    /// Collect discounted items from every listing page.
    pub async fn collect_listing(&self) -> Result<Vec<RawItem>> {
        let delay = Duration::from_millis(self.source.page_delay_ms);
        let mut seen = HashSet::new();
        let mut items = Vec::new();
        let mut page = 1;

        loop {
            if self.source.max_pages.is_some_and(|max| page > max) {
                log::info!("Reached page limit ({})", page - 1);
                break;
            }

            let url = page_url(&self.source.listing_url, page);
            log::debug!("[page {}] fetching {}", page, url);
            let body = match fetch_text(&self.client, &url).await {
                Ok(body) => body,
                Err(e) if page == 1 => return Err(e),
                Err(e) => {
                    log::warn!("[page {}] fetch failed, stop paging: {}", page, e);
                    break;
                }
            };

            let outcome = self.extract_page(&body, page, &mut seen);
            log::info!(
                "[page {}] {} tiles, {} new, {} kept",
                page,
                outcome.tiles,
                outcome.new_tiles,
                outcome.items.len()
            );
            if page == 1 && outcome.tiles == 0 {
                return Err(AppError::extract(
                    url,
                    "no product tiles matched any tile selector",
                ));
            }
            items.extend(outcome.items);
            if outcome.new_tiles == 0 {
                break;
            }

            page += 1;
            tokio::time::sleep(delay).await;
        }

        Ok(items)
    }

    /// Per-color sizes from a product page.
    async fn product_page_sizes(&self, url: &str) -> Result<Vec<SizeGroup>> {
        let body = fetch_text(&self.client, url).await?;
        let document = Html::parse_document(&body);
        Ok(extract::parse_color_groups(&document, &self.strategies))
    }

    /// Sizes from the quick-add fragment, as one uncolored group.
    async fn quick_add_sizes(&self, url: &str) -> Result<Vec<SizeGroup>> {
        let response = self
            .client
            .get(url)
            .header("X-Requested-With", "XMLHttpRequest")
            .send()
            .await?;
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(AppError::remote(url, status.as_u16(), truncate_body(&body)));
        }

        let fragment = Html::parse_fragment(&body);
        let sizes = extract::parse_sizes(&fragment, &self.strategies);
        if sizes.is_empty() {
            return Ok(Vec::new());
        }
        Ok(vec![SizeGroup { color: None, sizes }])
    }

    /// Size labels for one item; failures are logged and yield no sizes.
    pub async fn lookup_sizes(&self, item: &RawItem) -> Vec<String> {
        let mut groups = Vec::new();

        if let Some(link) = &item.product_link {
            match self.product_page_sizes(link).await {
                Ok(found) => groups = found,
                Err(e) => log::warn!("[sizes product] {}: {}", link, e),
            }
        }

        if groups.is_empty() {
            if let Some(qa_url) = &item.quick_add_url {
                match self.quick_add_sizes(qa_url).await {
                    Ok(found) => groups = found,
                    Err(e) => log::warn!("[sizes quickadd] {}: {}", qa_url, e),
                }
            }
        }

        extract::size_group_labels(&groups)
    }
}

#[async_trait]
impl ItemSource for ListingSource {
    fn describe(&self) -> String {
        format!("listing {}", self.source.listing_url)
    }

    async fn fetch_items(&self) -> Result<Vec<RawItem>> {
        let mut items = self.collect_listing().await?;
        if self.source.fetch_sizes {
            let total = items.len();
            for (idx, item) in items.iter_mut().enumerate() {
                item.sizes = self.lookup_sizes(item).await;
                log::debug!(
                    "[sizes {}/{}] {} -> {} groups",
                    idx + 1,
                    total,
                    item.name,
                    item.sizes.len()
                );
            }
        }
        Ok(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn tile(pid: &str, name: &str) -> String {
        format!(
            r#"<div class="product" data-pid="{pid}">
                 <div class="pdp-link">
                   <a class="link" itemprop="url" href="/product/{pid}.html">
                     <span class="product-tile__name">{name}</span>
                   </a>
                 </div>
                 <product-tile-pricing sale-price="5000" list-price="10000"></product-tile-pricing>
                 <div class="product-tile__quickadd-container">
                   <button class="tile-quickadd-btn" data-url="/quickadd/{pid}"></button>
                 </div>
               </div>"#
        )
    }

    fn source(server: &MockServer, max_pages: Option<u32>, fetch_sizes: bool) -> ListingSource {
        let mut config = Config::default();
        config.source.base_url = server.uri();
        config.source.listing_url = format!("{}/sale?page={{page}}", server.uri());
        config.source.page_delay_ms = 0;
        config.source.max_pages = max_pages;
        config.source.fetch_sizes = fetch_sizes;
        ListingSource::new(Client::new(), &config).unwrap()
    }

    async fn mount_page(server: &MockServer, page: &str, body: String) {
        Mock::given(method("GET"))
            .and(path("/sale"))
            .and(query_param("page", page))
            .respond_with(ResponseTemplate::new(200).set_body_string(body))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_pagination_stops_when_page_repeats() {
        let server = MockServer::start().await;
        mount_page(&server, "1", tile("a", "Alpha") + &tile("b", "Beta")).await;
        mount_page(&server, "2", tile("c", "Gamma")).await;
        // The storefront keeps serving the last page past the end.
        mount_page(&server, "3", tile("c", "Gamma")).await;

        let items = source(&server, None, false).fetch_items().await.unwrap();
        let pids: Vec<_> = items.iter().filter_map(|i| i.pid.as_deref()).collect();
        assert_eq!(pids, vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn test_pagination_respects_max_pages() {
        let server = MockServer::start().await;
        mount_page(&server, "1", tile("a", "Alpha")).await;
        mount_page(&server, "2", tile("b", "Beta")).await;

        let items = source(&server, Some(1), false).fetch_items().await.unwrap();
        assert_eq!(items.len(), 1);
    }

    #[tokio::test]
    async fn test_first_page_failure_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/sale"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        assert!(source(&server, None, false).fetch_items().await.is_err());
    }

    #[tokio::test]
    async fn test_first_page_without_tiles_is_an_extract_error() {
        let server = MockServer::start().await;
        mount_page(&server, "1", String::from("<main><p>Maintenance</p></main>")).await;

        let err = source(&server, None, false).fetch_items().await.unwrap_err();
        assert!(matches!(err, AppError::Extract { .. }));
        assert!(err.to_string().contains("/sale?page=1"));
    }

    #[tokio::test]
    async fn test_sizes_fall_back_to_quick_add() {
        let server = MockServer::start().await;
        mount_page(&server, "1", tile("a", "Alpha")).await;
        mount_page(&server, "2", String::from("<p>end</p>")).await;
        Mock::given(method("GET"))
            .and(path("/product/a.html"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/quickadd/a"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"<label class="pdp-size-select" data-size="S">S</label>
                   <label class="pdp-size-select">サイズ M</label>"#,
            ))
            .mount(&server)
            .await;

        let items = source(&server, None, true).fetch_items().await.unwrap();
        assert_eq!(items[0].sizes, vec!["S M"]);
    }

    #[tokio::test]
    async fn test_sizes_from_product_page_colors() {
        let server = MockServer::start().await;
        mount_page(&server, "1", tile("a", "Alpha")).await;
        mount_page(&server, "2", String::new()).await;
        Mock::given(method("GET"))
            .and(path("/product/a.html"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"<div data-attr="color">
                     <button data-attr-value="BLK" data-display-value="Black"
                             data-size-stock='["S","M"]'></button>
                   </div>"#,
            ))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/quickadd/a"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let items = source(&server, None, true).fetch_items().await.unwrap();
        assert_eq!(items[0].sizes, vec!["Black: S M"]);
    }
}
