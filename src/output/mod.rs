//! Output module for persisting harvested data
//!
//! This module handles:
//! - Writing one CSV file per crawl target
//! - Combining per-target files into a single dataset
//! - Summarizing crawl outcomes for the run log

pub mod stats;
mod table;

pub use stats::{CrawlSummary, RunReport};
pub use table::{combine_data, write_records, CombineReport, PriceStats, Table};
