use serde::Deserialize;

/// Main configuration structure for Otomoto-Harvest
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub crawler: CrawlerConfig,
    pub resources: ResourcesConfig,
    pub output: OutputConfig,
    #[serde(default)]
    pub store: Option<StoreConfig>,
    /// Browser identities used for advertisement requests; empty means built-in pool
    #[serde(default)]
    pub headers: Vec<HeaderProfile>,
}

/// Crawler behavior configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlerConfig {
    /// Search root; a manufacturer slug is appended as a path segment
    #[serde(rename = "base-url")]
    pub base_url: String,

    /// Marketplace script listing every make and model
    #[serde(rename = "catalog-url", default = "default_catalog_url")]
    pub catalog_url: String,

    /// Upper bound of the per-page advertisement worker pool
    #[serde(rename = "max-concurrency", default = "default_max_concurrency")]
    pub max_concurrency: u32,

    /// Pagination clamp for a single search root
    #[serde(rename = "max-pages", default = "default_max_pages")]
    pub max_pages: u32,

    #[serde(rename = "request-timeout-secs", default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    #[serde(rename = "connect-timeout-secs", default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
}

/// Newline-delimited input resources
#[derive(Debug, Clone, Deserialize)]
pub struct ResourcesConfig {
    /// One manufacturer slug per line
    #[serde(rename = "makers-path")]
    pub makers_path: String,

    /// One whitelisted feature column per line
    #[serde(rename = "features-path")]
    pub features_path: String,

    /// Directory of `<maker>.txt` model lists
    #[serde(rename = "models-dir", default = "default_models_dir")]
    pub models_dir: String,
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Directory receiving one CSV file per manufacturer or model
    #[serde(rename = "data-directory")]
    pub data_directory: String,

    #[serde(rename = "combined-filename", default = "default_combined_filename")]
    pub combined_filename: String,
}

/// Filesystem-backed object store used for publishing datasets
#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    pub root: String,
    pub bucket: String,
}

/// One browser identity (header set) for outgoing requests
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct HeaderProfile {
    #[serde(rename = "user-agent")]
    pub user_agent: String,

    #[serde(default)]
    pub accept: Option<String>,

    #[serde(rename = "accept-language", default)]
    pub accept_language: Option<String>,

    #[serde(default)]
    pub referer: Option<String>,
}

fn default_catalog_url() -> String {
    "https://www.otomoto.pl/ajax/jsdata/params/".to_string()
}

fn default_max_concurrency() -> u32 {
    crate::crawler::AdvertisementFetcher::DEFAULT_MAX_CONCURRENCY as u32
}

fn default_max_pages() -> u32 {
    500
}

fn default_request_timeout() -> u64 {
    30
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_models_dir() -> String {
    "resources/car_models".to_string()
}

fn default_combined_filename() -> String {
    "combined.csv".to_string()
}
