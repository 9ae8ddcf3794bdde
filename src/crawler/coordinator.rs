//! Crawl coordinator - per-target orchestration
//!
//! This module drives crawl targets end to end:
//! - Normalizing the target slug
//! - Discovering the page count of the search root
//! - Walking listing pages strictly in order, one advertisement batch at a time
//! - Flushing the accumulated records to the target's CSV file
//! - Running every manufacturer (or every model of one manufacturer) in turn

use crate::config::Config;
use crate::crawler::ads::AdvertisementFetcher;
use crate::crawler::catalog::{read_slug_list, refresh_catalog};
use crate::crawler::fetcher::HttpFetcher;
use crate::crawler::listing::ListingEnumerator;
use crate::output::{combine_data, CombineReport, CrawlSummary, RunReport};
use crate::record::ExtractionSchema;
use crate::state::CrawlState;
use crate::HarvestError;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use url::Url;

/// One manufacturer, optionally narrowed to one model
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlTarget {
    pub maker: String,
    pub model: Option<String>,
}

impl CrawlTarget {
    pub fn maker(maker: &str) -> Self {
        Self {
            maker: maker.to_string(),
            model: None,
        }
    }

    pub fn model(maker: &str, model: &str) -> Self {
        Self {
            maker: maker.to_string(),
            model: Some(model.to_string()),
        }
    }

    /// Copy with surrounding whitespace removed from both slugs
    pub fn normalized(&self) -> Self {
        Self {
            maker: self.maker.trim().to_string(),
            model: self.model.as_deref().map(str::trim).map(str::to_string),
        }
    }

    /// Output label: the model slug when scoped, the maker slug otherwise
    pub fn label(&self) -> &str {
        self.model.as_deref().unwrap_or(&self.maker)
    }

    /// Search root `<base>/<maker>[/<model>]`
    pub fn root_url(&self, base_url: &str) -> Result<String, HarvestError> {
        let mut url = Url::parse(base_url)?;
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| url::ParseError::RelativeUrlWithCannotBeABaseBase)?;
            segments.pop_if_empty().push(&self.maker);
            if let Some(model) = &self.model {
                segments.push(model);
            }
        }
        Ok(url.to_string())
    }
}

/// Tracks one target's state and rejects illegal transitions
#[derive(Debug)]
struct Progress {
    state: CrawlState,
}

impl Progress {
    fn new() -> Self {
        Self {
            state: CrawlState::Start,
        }
    }

    fn advance(&mut self, next: CrawlState) -> Result<(), HarvestError> {
        if !self.state.can_transition_to(next) {
            return Err(HarvestError::InvalidTransition {
                from: self.state,
                to: next,
            });
        }
        tracing::trace!("{} -> {}", self.state, next);
        self.state = next;
        Ok(())
    }
}

/// Main crawler coordinator structure
pub struct Coordinator {
    config: Arc<Config>,
    fetcher: Arc<HttpFetcher>,
    schema: Arc<ExtractionSchema>,
    enumerator: ListingEnumerator,
    data_dir: PathBuf,
}

impl Coordinator {
    /// Creates a coordinator, loading the extraction schema from the features file
    ///
    /// # Returns
    ///
    /// * `Ok(Coordinator)` - Ready to crawl
    /// * `Err(HarvestError)` - Features file unreadable or HTTP client unbuildable
    pub fn new(config: Config) -> Result<Self, HarvestError> {
        let features_path = Path::new(&config.resources.features_path);
        let schema = ExtractionSchema::load(features_path).map_err(|e| {
            tracing::error!("Cannot read features from {}: {}", features_path.display(), e);
            e
        })?;
        Self::with_schema(config, schema)
    }

    /// Creates a coordinator around an already loaded schema
    pub fn with_schema(config: Config, schema: ExtractionSchema) -> Result<Self, HarvestError> {
        let fetcher = HttpFetcher::new(&config.crawler, &config.headers).map_err(|e| {
            HarvestError::Fetch(crate::FetchError::Transport {
                url: config.crawler.base_url.clone(),
                kind: crate::TransportKind::Other,
                message: format!("cannot build HTTP client: {}", e),
            })
        })?;
        let fetcher = Arc::new(fetcher);

        tracing::debug!(
            "Extraction schema has {} columns",
            schema.columns().len()
        );

        Ok(Self {
            enumerator: ListingEnumerator::new(Arc::clone(&fetcher), config.crawler.max_pages),
            data_dir: PathBuf::from(&config.output.data_directory),
            schema: Arc::new(schema),
            config: Arc::new(config),
            fetcher,
        })
    }

    pub fn schema(&self) -> &ExtractionSchema {
        &self.schema
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Crawls one manufacturer
    pub async fn crawl_maker(&self, maker: &str) -> CrawlSummary {
        self.crawl_target(&CrawlTarget::maker(maker)).await
    }

    /// Runs one target to a terminal state
    ///
    /// Never fails: an abort is reported through the summary's status and
    /// error fields so sibling targets keep running.
    pub async fn crawl_target(&self, target: &CrawlTarget) -> CrawlSummary {
        let started = Instant::now();
        let target = target.normalized();
        let mut summary = CrawlSummary::new(target.label());
        let mut progress = Progress::new();

        if let Err(e) = self.run_target(&target, &mut summary, &mut progress).await {
            summary.error = Some(e.to_string());
            if progress.state.can_transition_to(CrawlState::Aborted) {
                progress.state = CrawlState::Aborted;
            }
        }

        if !progress.state.is_terminal() {
            tracing::warn!(
                "[{}] stopped in non-terminal state {}",
                target.label(),
                progress.state
            );
        }

        summary.status = progress.state;
        summary.duration = started.elapsed();
        summary.log();
        summary
    }

    async fn run_target(
        &self,
        target: &CrawlTarget,
        summary: &mut CrawlSummary,
        progress: &mut Progress,
    ) -> Result<(), HarvestError> {
        let label = target.label().to_string();
        tracing::info!("Start scraping {}", label);

        progress.advance(CrawlState::DiscoverPages)?;
        let root = target.root_url(&self.config.crawler.base_url)?;
        let total_pages = self
            .enumerator
            .total_pages(&root)
            .await
            .map_err(|e| HarvestError::Enumeration {
                slug: label.clone(),
                reason: e.to_string(),
            })?;
        summary.pages_discovered = total_pages;
        tracing::info!("{} has {} result pages", label, total_pages);

        progress.advance(CrawlState::Enumerating)?;
        let ads = AdvertisementFetcher::new(
            Arc::clone(&self.fetcher),
            Arc::clone(&self.schema),
            self.config.crawler.max_concurrency as usize,
        );

        for page in 1..=total_pages {
            let links = match self.enumerator.links_on_page(&root, page).await {
                Ok(links) => links,
                Err(e) => {
                    tracing::warn!("[{}] page {} unavailable: {}", label, page, e);
                    summary.pages_failed += 1;
                    Vec::new()
                }
            };
            summary.pages_processed += 1;
            tracing::info!(
                "[{}] page {}/{}: {} links",
                label,
                page,
                total_pages,
                links.len()
            );

            if links.is_empty() {
                continue;
            }

            let batch = ads.fetch_ads(&links).await;
            summary.add_batch(&batch);
        }

        progress.advance(CrawlState::Flushing)?;
        let path = ads.save_ads(&label, &self.data_dir)?;
        summary.output = Some(path);

        progress.advance(CrawlState::Done)?;
        Ok(())
    }

    /// Reads the manufacturer list, refreshing the catalog first if it is missing
    pub async fn load_makers(&self) -> Result<Vec<String>, HarvestError> {
        let resources = &self.config.resources;
        let makers_path = Path::new(&resources.makers_path);

        if !makers_path.exists() {
            tracing::info!(
                "Manufacturer list {} not found, fetching catalog",
                makers_path.display()
            );
            return self.refresh_catalog().await;
        }

        Ok(read_slug_list(makers_path)?)
    }

    /// Rewrites the makers and models resources from the marketplace catalog
    pub async fn refresh_catalog(&self) -> Result<Vec<String>, HarvestError> {
        let resources = &self.config.resources;
        refresh_catalog(
            &self.fetcher,
            &self.config.crawler.catalog_url,
            Path::new(&resources.makers_path),
            Path::new(&resources.models_dir),
        )
        .await
    }

    /// Crawls every manufacturer in the makers list
    ///
    /// Each manufacturer runs to completion or abort before the next starts;
    /// an abort never stops the loop.
    pub async fn crawl_all_makers(&self) -> Result<RunReport, HarvestError> {
        let makers = self.load_makers().await?;
        tracing::info!("Starting scraping {} manufacturers", makers.len());
        Ok(self.crawl_targets(makers.iter().map(|m| CrawlTarget::maker(m))).await)
    }

    /// Crawls every model listed for one manufacturer, one output file per model
    pub async fn crawl_maker_models(&self, maker: &str) -> Result<RunReport, HarvestError> {
        let maker = maker.trim();
        let models_path =
            Path::new(&self.config.resources.models_dir).join(format!("{}.txt", maker));
        let models = read_slug_list(&models_path)?;
        tracing::info!("Starting scraping {} models of {}", models.len(), maker);
        Ok(self
            .crawl_targets(models.iter().map(|m| CrawlTarget::model(maker, m)))
            .await)
    }

    async fn crawl_targets<I>(&self, targets: I) -> RunReport
    where
        I: IntoIterator<Item = CrawlTarget>,
    {
        let mut report = RunReport::default();
        for target in targets {
            report.push(self.crawl_target(&target).await);
        }
        report.log();
        report
    }

    /// Concatenates every per-target file into the configured combined file
    pub fn combine_data(&self) -> Result<CombineReport, HarvestError> {
        combine_data(&self.data_dir, &self.config.output.combined_filename)
    }
}
