//! Crawler module for listing traversal and advertisement extraction
//!
//! This module contains the core harvesting logic, including:
//! - HTTP fetching with rotating header profiles
//! - Advertisement parsing with per-layout fallbacks
//! - Listing pagination and link enumeration
//! - The bounded advertisement worker pool
//! - Per-manufacturer crawl coordination

mod ads;
mod catalog;
mod coordinator;
mod fetcher;
mod listing;
mod parser;

pub use ads::{fetch_advert, AdOutcome, AdvertisementFetcher, BatchReport};
pub use catalog::{parse_catalog, read_slug_list, refresh_catalog, storage_slug, write_catalog};
pub use coordinator::{Coordinator, CrawlTarget};
pub use fetcher::{build_http_client, header_map, HeaderPool, HttpFetcher, RawResponse};
pub use listing::{
    page_url, parse_listing_links, parse_total_pages, ListingEnumerator, PaginationError,
};
pub use parser::{
    extract_fields, parse_price, Extraction, FieldGroup, Layout, ParsedAdvert, Strategy,
    StructureMissing, CURRENCY_KEY,
};

use crate::config::Config;
use crate::output::RunReport;
use crate::HarvestError;

/// Runs a complete harvest over every manufacturer
///
/// This is the main entry point for a full run. It will:
/// 1. Load the extraction schema
/// 2. Build the HTTP fetcher
/// 3. Read (or fetch) the manufacturer list
/// 4. Crawl each manufacturer in turn
///
/// # Arguments
///
/// * `config` - The harvester configuration
///
/// # Returns
///
/// * `Ok(RunReport)` - One summary per manufacturer, aborted ones included
/// * `Err(HarvestError)` - Setup failed before any manufacturer was crawled
pub async fn harvest(config: Config) -> Result<RunReport, HarvestError> {
    let coordinator = Coordinator::new(config)?;
    coordinator.crawl_all_makers().await
}
