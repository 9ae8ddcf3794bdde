//! State module for tracking crawl progress
//!
//! - `CrawlState`: lifecycle of one manufacturer (or model) crawl, from slug
//!   normalization through page discovery, enumeration and the final flush.

mod crawl_state;

pub use crawl_state::CrawlState;
