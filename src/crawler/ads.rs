//! Advertisement fetcher
//!
//! Fetches and parses one listing page's advertisement links on a bounded
//! worker pool and accumulates the accepted records for a whole crawl target.

use crate::crawler::fetcher::HttpFetcher;
use crate::crawler::parser::extract_fields;
use crate::output::write_records;
use crate::record::{AdRecord, ExtractionSchema};
use crate::{FetchError, HarvestError};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

/// Outcome of fetching a single advertisement link
#[derive(Debug)]
pub enum AdOutcome {
    /// Parsed and priced; ready for the accumulator
    Accepted(AdRecord),

    /// Parsed, but no price could be read; never accumulated
    NoPrice { url: String },

    /// The request failed; the link is skipped
    Failed(FetchError),
}

/// Counters for one `fetch_ads` batch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub attempted: usize,
    pub accepted: usize,
    pub without_price: usize,
    pub failed: usize,
}

impl BatchReport {
    fn record(&mut self, outcome: Tally) {
        match outcome {
            Tally::Accepted => self.accepted += 1,
            Tally::NoPrice => self.without_price += 1,
            Tally::Failed => self.failed += 1,
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Tally {
    Accepted,
    NoPrice,
    Failed,
}

/// Fetches advertisements concurrently and accumulates accepted records
///
/// One instance serves exactly one crawl target. The accumulator is the only
/// state workers share; records land in completion order.
#[derive(Debug)]
pub struct AdvertisementFetcher {
    fetcher: Arc<HttpFetcher>,
    schema: Arc<ExtractionSchema>,
    max_concurrency: usize,
    accumulator: Arc<Mutex<Vec<AdRecord>>>,
}

impl AdvertisementFetcher {
    pub const DEFAULT_MAX_CONCURRENCY: usize = 8;

    pub fn new(
        fetcher: Arc<HttpFetcher>,
        schema: Arc<ExtractionSchema>,
        max_concurrency: usize,
    ) -> Self {
        Self {
            fetcher,
            schema,
            max_concurrency: max_concurrency.max(1),
            accumulator: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Worker pool size for a batch of `links` links
    pub fn pool_size(&self, links: usize) -> usize {
        self.max_concurrency.min(links + 1)
    }

    /// Fetches every link of one batch and appends accepted records
    ///
    /// Never fails: fetch errors are logged per link and counted in the
    /// report. Returns once every worker of the batch has finished.
    pub async fn fetch_ads(&self, links: &[String]) -> BatchReport {
        let mut report = BatchReport {
            attempted: links.len(),
            ..BatchReport::default()
        };

        if links.is_empty() {
            return report;
        }

        let semaphore = Arc::new(Semaphore::new(self.pool_size(links.len())));
        let mut workers = JoinSet::new();

        for link in links {
            let Ok(permit) = semaphore.clone().acquire_owned().await else {
                break;
            };

            let fetcher = Arc::clone(&self.fetcher);
            let schema = Arc::clone(&self.schema);
            let accumulator = Arc::clone(&self.accumulator);
            let link = link.clone();

            workers.spawn(async move {
                let _permit = permit;
                match fetch_advert(&fetcher, &schema, &link).await {
                    AdOutcome::Accepted(record) => {
                        lock(&accumulator).push(record);
                        Tally::Accepted
                    }
                    AdOutcome::NoPrice { url } => {
                        tracing::info!("No price on {}, dropping advertisement", url);
                        Tally::NoPrice
                    }
                    AdOutcome::Failed(error) => {
                        tracing::warn!("Skipping {}: {}", link, error);
                        Tally::Failed
                    }
                }
            });
        }

        while let Some(joined) = workers.join_next().await {
            match joined {
                Ok(tally) => report.record(tally),
                Err(e) => {
                    tracing::error!("Advertisement worker panicked: {}", e);
                    report.failed += 1;
                }
            }
        }

        tracing::debug!(
            "Batch done: {} attempted, {} accepted, {} without price, {} failed",
            report.attempted,
            report.accepted,
            report.without_price,
            report.failed
        );

        report
    }

    /// Number of accumulated records
    pub fn len(&self) -> usize {
        lock(&self.accumulator).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of the accumulated records
    pub fn records(&self) -> Vec<AdRecord> {
        lock(&self.accumulator).clone()
    }

    pub fn schema(&self) -> &ExtractionSchema {
        &self.schema
    }

    /// Writes every accumulated record to `<data_dir>/<label>.csv`
    ///
    /// The accumulator is left untouched.
    pub fn save_ads(&self, label: &str, data_dir: &Path) -> Result<PathBuf, HarvestError> {
        let path = data_dir.join(format!("{}.csv", label));
        let records = self.records();
        write_records(&path, &self.schema, &records)?;
        tracing::info!("Saved {} advertisements to {}", records.len(), path.display());
        Ok(path)
    }
}

/// Fetches and parses a single advertisement page
pub async fn fetch_advert(
    fetcher: &HttpFetcher,
    schema: &ExtractionSchema,
    url: &str,
) -> AdOutcome {
    let response = match fetcher.fetch_advert(url).await {
        Ok(response) => response,
        Err(error) => return AdOutcome::Failed(error),
    };

    let parsed = extract_fields(&response.body);
    match parsed.price {
        Some(price) => AdOutcome::Accepted(schema.make_record(parsed.fields, price, url)),
        None => AdOutcome::NoPrice {
            url: url.to_string(),
        },
    }
}

fn lock(accumulator: &Mutex<Vec<AdRecord>>) -> MutexGuard<'_, Vec<AdRecord>> {
    accumulator.lock().unwrap_or_else(PoisonError::into_inner)
}
