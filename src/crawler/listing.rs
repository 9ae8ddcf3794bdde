//! Listing enumerator
//!
//! Reads the pagination markers of a search root and collects the
//! advertisement links shown on each results page.

use crate::crawler::fetcher::HttpFetcher;
use crate::crawler::parser::{compile, element_text, resolve_link};
use crate::FetchError;
use scraper::Html;
use std::collections::HashSet;
use std::sync::Arc;
use thiserror::Error;
use url::Url;

const PAGINATION_ITEM: &str = r#"li[data-testid="pagination-list-item"]"#;
const RESULTS_CONTAINER: &str = r#"div[data-testid="search-results"]"#;
const RESULT_ARTICLE: &str = "article[data-media-size]";
const RESULT_ANCHOR: &str = "a[href]";

/// Why the page count of a search root could not be determined
#[derive(Debug, Error)]
pub enum PaginationError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("Invalid search root URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("Pagination marker '{0}' is not a page number")]
    BadMarker(String),
}

/// Enumerates listing pages under one search root
#[derive(Debug, Clone)]
pub struct ListingEnumerator {
    fetcher: Arc<HttpFetcher>,
    max_pages: u32,
}

impl ListingEnumerator {
    pub fn new(fetcher: Arc<HttpFetcher>, max_pages: u32) -> Self {
        Self { fetcher, max_pages }
    }

    /// Discovers how many result pages a search root has, clamped to `max_pages`
    ///
    /// # Returns
    ///
    /// * `Ok(n)` - `1 <= n <= max_pages`; 1 when no pagination is shown
    /// * `Err(PaginationError)` - the root could not be fetched or its last
    ///   pagination marker is not a number
    pub async fn total_pages(&self, root_url: &str) -> Result<u32, PaginationError> {
        Url::parse(root_url)?;
        let response = self.fetcher.fetch_listing(root_url).await?;
        let total = parse_total_pages(&response.body)?;
        let clamped = total.min(self.max_pages);

        if clamped < total {
            tracing::info!(
                "{} reports {} pages, clamping to {}",
                root_url,
                total,
                clamped
            );
        }

        Ok(clamped)
    }

    /// Fetches result page `page` and returns its advertisement links in page order
    ///
    /// A page without the results container yields an empty list.
    pub async fn links_on_page(
        &self,
        root_url: &str,
        page: u32,
    ) -> Result<Vec<String>, FetchError> {
        let url = page_url(root_url, page).map_err(|e| FetchError::Transport {
            url: root_url.to_string(),
            kind: crate::TransportKind::Other,
            message: e.to_string(),
        })?;

        let response = self.fetcher.fetch_listing(url.as_str()).await?;
        let base = Url::parse(&response.url).unwrap_or(url);
        Ok(parse_listing_links(&response.body, &base))
    }
}

/// Builds `root?page=N`, replacing any page parameter already present
pub fn page_url(root_url: &str, page: u32) -> Result<Url, url::ParseError> {
    let mut url = Url::parse(root_url)?;
    let retained: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(key, _)| key != "page")
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    url.query_pairs_mut()
        .clear()
        .extend_pairs(retained)
        .append_pair("page", &page.to_string());

    Ok(url)
}

/// Reads the page count from the last pagination marker; 1 when there is none
pub fn parse_total_pages(html: &str) -> Result<u32, PaginationError> {
    let document = Html::parse_document(html);
    let Ok(selector) = compile(PAGINATION_ITEM) else {
        return Ok(1);
    };

    match document.select(&selector).last() {
        Some(marker) => {
            let text = element_text(marker);
            text.parse::<u32>()
                .map(|n| n.max(1))
                .map_err(|_| PaginationError::BadMarker(text))
        }
        None => Ok(1),
    }
}

/// Collects one link per result article, deduplicated, in page order
pub fn parse_listing_links(html: &str, base_url: &Url) -> Vec<String> {
    let document = Html::parse_document(html);
    let (Ok(container), Ok(article), Ok(anchor)) = (
        compile(RESULTS_CONTAINER),
        compile(RESULT_ARTICLE),
        compile(RESULT_ANCHOR),
    ) else {
        return Vec::new();
    };

    let Some(results) = document.select(&container).next() else {
        tracing::debug!("No results container on {}", base_url);
        return Vec::new();
    };

    let mut seen = HashSet::new();
    results
        .select(&article)
        .filter_map(|el| el.select(&anchor).next())
        .filter_map(|a| a.value().attr("href"))
        .filter_map(|href| resolve_link(href, base_url))
        .filter(|link| seen.insert(link.clone()))
        .collect()
}
