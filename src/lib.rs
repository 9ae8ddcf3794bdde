//! Otomoto-Harvest: a car-listing marketplace harvester
//!
//! This crate crawls manufacturer search results on a car-listing marketplace,
//! follows every advertisement link, and normalizes the scraped specification
//! tables into one fixed-column CSV dataset per manufacturer.

pub mod config;
pub mod crawler;
pub mod output;
pub mod record;
pub mod state;
pub mod store;

use thiserror::Error;

/// Main error type for Otomoto-Harvest operations
#[derive(Debug, Error)]
pub enum HarvestError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),

    #[error("Cannot enumerate pages for '{slug}': {reason}")]
    Enumeration { slug: String, reason: String },

    #[error("Catalog error: {0}")]
    Catalog(String),

    #[error("Invalid state transition: {from:?} -> {to:?}")]
    InvalidTransition {
        from: state::CrawlState,
        to: state::CrawlState,
    },

    #[error("URL parse error: {0}")]
    UrlParse(#[from] ::url::ParseError),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// Classification of a transport-level failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
    Timeout,
    Connect,
    Body,
    Other,
}

/// Failure of a single HTTP GET
///
/// Both variants are recoverable by skipping the unit of work the URL
/// belongs to; only the caller knows whether that unit is one advertisement
/// or a whole manufacturer.
#[derive(Debug, Clone, Error)]
pub enum FetchError {
    #[error("Transport error ({kind:?}) for {url}: {message}")]
    Transport {
        url: String,
        kind: TransportKind,
        message: String,
    },

    #[error("HTTP {status} for {url}")]
    HttpStatus { url: String, status: u16 },
}

impl FetchError {
    /// The URL whose request failed
    pub fn url(&self) -> &str {
        match self {
            Self::Transport { url, .. } | Self::HttpStatus { url, .. } => url,
        }
    }
}

/// Object-store errors
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("No object '{key}' in bucket '{bucket}'")]
    NotFound { bucket: String, key: String },

    #[error("Invalid object key: {0}")]
    InvalidKey(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for Otomoto-Harvest operations
pub type Result<T> = std::result::Result<T, HarvestError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use config::Config;
pub use record::{AdRecord, ExtractionSchema, FieldValue};
pub use state::CrawlState;
