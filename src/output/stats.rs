//! Crawl summaries
//!
//! One [`CrawlSummary`] per crawl target, logged as a single line when the
//! target finishes, and a [`RunReport`] for multi-target loops.

use crate::crawler::BatchReport;
use crate::state::CrawlState;
use chrono::{DateTime, Utc};
use std::path::PathBuf;
use std::time::Duration;

/// Outcome of one crawl target
#[derive(Debug, Clone)]
pub struct CrawlSummary {
    /// Output label (maker or model slug)
    pub label: String,

    /// Terminal state reached
    pub status: CrawlState,

    /// Page count discovered from pagination, after clamping
    pub pages_discovered: u32,

    /// Listing pages actually requested
    pub pages_processed: u32,

    /// Listing pages whose fetch failed and were treated as empty
    pub pages_failed: u32,

    /// Advertisement links found across all listing pages
    pub links_found: usize,

    pub ads_accepted: usize,
    pub ads_without_price: usize,
    pub ads_failed: usize,

    /// Written CSV file, when the target reached `Done`
    pub output: Option<PathBuf>,

    /// Abort reason, when the target reached `Aborted`
    pub error: Option<String>,

    pub started_at: DateTime<Utc>,
    pub duration: Duration,
}

impl CrawlSummary {
    pub fn new(label: &str) -> Self {
        Self {
            label: label.to_string(),
            status: CrawlState::Start,
            pages_discovered: 0,
            pages_processed: 0,
            pages_failed: 0,
            links_found: 0,
            ads_accepted: 0,
            ads_without_price: 0,
            ads_failed: 0,
            output: None,
            error: None,
            started_at: Utc::now(),
            duration: Duration::ZERO,
        }
    }

    /// Folds one advertisement batch into the totals
    pub fn add_batch(&mut self, batch: &BatchReport) {
        self.links_found += batch.attempted;
        self.ads_accepted += batch.accepted;
        self.ads_without_price += batch.without_price;
        self.ads_failed += batch.failed;
    }

    /// Per-target summary line; every status reports its counters
    pub fn line(&self) -> String {
        let counters = format!(
            "[{}] {}: {} pages discovered, {} processed ({} failed), {} links, \
             {} ads accepted, {} without price, {} failed in {:.1}s",
            self.label,
            self.status,
            self.pages_discovered,
            self.pages_processed,
            self.pages_failed,
            self.links_found,
            self.ads_accepted,
            self.ads_without_price,
            self.ads_failed,
            self.duration.as_secs_f64()
        );

        if self.status == CrawlState::Aborted {
            let reason = self.error.as_deref().unwrap_or("unknown error");
            format!("{}: {}", counters, reason)
        } else {
            counters
        }
    }

    /// Emits the per-target summary line
    pub fn log(&self) {
        match self.status {
            CrawlState::Aborted => tracing::error!("{}", self.line()),
            _ => tracing::info!("{}", self.line()),
        }
    }
}

/// Summaries of a multi-target run, in crawl order
#[derive(Debug, Clone, Default)]
pub struct RunReport {
    pub summaries: Vec<CrawlSummary>,
}

impl RunReport {
    pub fn push(&mut self, summary: CrawlSummary) {
        self.summaries.push(summary);
    }

    pub fn completed(&self) -> usize {
        self.summaries
            .iter()
            .filter(|s| s.status.is_success())
            .count()
    }

    pub fn aborted(&self) -> Vec<&str> {
        self.summaries
            .iter()
            .filter(|s| s.status == CrawlState::Aborted)
            .map(|s| s.label.as_str())
            .collect()
    }

    pub fn total_accepted(&self) -> usize {
        self.summaries.iter().map(|s| s.ads_accepted).sum()
    }

    pub fn log(&self) {
        tracing::info!(
            "Run finished: {} targets, {} completed, {} aborted, {} ads accepted",
            self.summaries.len(),
            self.completed(),
            self.aborted().len(),
            self.total_accepted()
        );
    }
}
