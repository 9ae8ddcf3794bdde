use crate::config::types::{Config, CrawlerConfig, HeaderProfile, OutputConfig, ResourcesConfig};
use crate::ConfigError;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_crawler_config(&config.crawler)?;
    validate_resources_config(&config.resources)?;
    validate_output_config(&config.output)?;
    validate_header_profiles(&config.headers)?;

    if let Some(store) = &config.store {
        require_non_empty("store.root", &store.root)?;
        require_non_empty("store.bucket", &store.bucket)?;
    }

    Ok(())
}

/// Validates crawler configuration
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    validate_http_url("base-url", &config.base_url)?;
    validate_http_url("catalog-url", &config.catalog_url)?;

    if config.max_concurrency < 1 || config.max_concurrency > 64 {
        return Err(ConfigError::Validation(format!(
            "max-concurrency must be between 1 and 64, got {}",
            config.max_concurrency
        )));
    }

    if config.max_pages < 1 {
        return Err(ConfigError::Validation(format!(
            "max-pages must be >= 1, got {}",
            config.max_pages
        )));
    }

    if config.request_timeout_secs < 1 || config.connect_timeout_secs < 1 {
        return Err(ConfigError::Validation(format!(
            "timeouts must be >= 1s, got request={}s connect={}s",
            config.request_timeout_secs, config.connect_timeout_secs
        )));
    }

    Ok(())
}

fn validate_resources_config(config: &ResourcesConfig) -> Result<(), ConfigError> {
    require_non_empty("makers-path", &config.makers_path)?;
    require_non_empty("features-path", &config.features_path)?;
    require_non_empty("models-dir", &config.models_dir)
}

fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    require_non_empty("data-directory", &config.data_directory)?;

    if !config.combined_filename.ends_with(".csv") || config.combined_filename.len() <= 4 {
        return Err(ConfigError::Validation(format!(
            "combined-filename must be a .csv file name, got '{}'",
            config.combined_filename
        )));
    }

    if config.combined_filename.contains('/') {
        return Err(ConfigError::Validation(format!(
            "combined-filename must not contain a path separator, got '{}'",
            config.combined_filename
        )));
    }

    Ok(())
}

fn validate_header_profiles(profiles: &[HeaderProfile]) -> Result<(), ConfigError> {
    for (index, profile) in profiles.iter().enumerate() {
        if profile.user_agent.trim().is_empty() {
            return Err(ConfigError::Validation(format!(
                "headers[{}]: user-agent cannot be empty",
                index
            )));
        }
    }
    Ok(())
}

/// Accepts http and https only; mock servers in tests are plain http
fn validate_http_url(field: &str, value: &str) -> Result<(), ConfigError> {
    let url = Url::parse(value)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid {} '{}': {}", field, value, e)))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::InvalidUrl(format!(
            "{} must use http or https, got '{}'",
            field, value
        )));
    }

    if url.cannot_be_a_base() {
        return Err(ConfigError::InvalidUrl(format!(
            "{} cannot be used as a base URL: '{}'",
            field, value
        )));
    }

    Ok(())
}

fn require_non_empty(field: &str, value: &str) -> Result<(), ConfigError> {
    if value.trim().is_empty() {
        return Err(ConfigError::Validation(format!("{} cannot be empty", field)));
    }
    Ok(())
}
