//! Manufacturer and model catalog
//!
//! The marketplace publishes every make and model inside a parameters
//! script. Refreshing the catalog rewrites the newline-delimited makers list
//! and one models list per make.

use crate::crawler::fetcher::HttpFetcher;
use crate::HarvestError;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;

const SCRIPT_START: &str = "var searchConditions = ";
const SCRIPT_END: &str = ";var searchCondition";
/// Parameter ids of the passenger-car make → model tree
const CATEGORY_ID: &str = "573";
const MAKE_PARAM_ID: &str = "571";

/// Reads a newline-delimited slug list, skipping blank lines
pub fn read_slug_list(path: &Path) -> std::io::Result<Vec<String>> {
    let text = std::fs::read_to_string(path)?;
    Ok(text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect())
}

/// Slug a make is stored and searched under
///
/// `warszawa` alone resolves to a city search, so the make is prefixed.
pub fn storage_slug(make: &str) -> String {
    if make == "warszawa" {
        "marka_warszawa".to_string()
    } else {
        make.to_string()
    }
}

/// Extracts the make → models map from the parameters script
pub fn parse_catalog(script: &str) -> Result<BTreeMap<String, Vec<String>>, HarvestError> {
    let start = script
        .find(SCRIPT_START)
        .ok_or_else(|| HarvestError::Catalog("searchConditions not found".to_string()))?;
    let rest = &script[start + SCRIPT_START.len()..];
    let json = rest.find(SCRIPT_END).map_or(rest, |end| &rest[..end]);

    let root: Value = serde_json::from_str(json.trim().trim_end_matches(';'))?;
    let makes = root
        .get("values")
        .and_then(|v| v.get(CATEGORY_ID))
        .and_then(|v| v.get(MAKE_PARAM_ID))
        .and_then(Value::as_object)
        .ok_or_else(|| {
            HarvestError::Catalog(format!(
                "values.{}.{} missing or not an object",
                CATEGORY_ID, MAKE_PARAM_ID
            ))
        })?;

    let mut catalog = BTreeMap::new();
    for (make, models) in makes {
        let models = models
            .as_array()
            .map(|entries| {
                entries
                    .iter()
                    .filter_map(|entry| entry.get("value").and_then(Value::as_str))
                    .map(str::to_string)
                    .collect::<Vec<_>>()
            })
            .unwrap_or_default();
        catalog.insert(storage_slug(make), models);
    }

    Ok(catalog)
}

/// Writes the makers list and every `<models_dir>/<make>.txt`
pub fn write_catalog(
    catalog: &BTreeMap<String, Vec<String>>,
    makers_path: &Path,
    models_dir: &Path,
) -> Result<(), HarvestError> {
    std::fs::create_dir_all(models_dir)?;
    if let Some(parent) = makers_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    for (make, models) in catalog {
        let mut body = models.join("\n");
        body.push('\n');
        std::fs::write(models_dir.join(format!("{}.txt", make)), body)?;
    }

    let mut makers = catalog.keys().cloned().collect::<Vec<_>>().join("\n");
    makers.push('\n');
    std::fs::write(makers_path, makers)?;
    Ok(())
}

/// Downloads the catalog and rewrites the resource files
///
/// Returns the makers written, in list order.
pub async fn refresh_catalog(
    fetcher: &HttpFetcher,
    catalog_url: &str,
    makers_path: &Path,
    models_dir: &Path,
) -> Result<Vec<String>, HarvestError> {
    tracing::info!("Refreshing manufacturer catalog from {}", catalog_url);
    let response = fetcher.fetch_listing(catalog_url).await?;
    let catalog = parse_catalog(&response.body)?;
    write_catalog(&catalog, makers_path, models_dir)?;

    tracing::info!(
        "Catalog written: {} makers to {}",
        catalog.len(),
        makers_path.display()
    );
    Ok(catalog.into_keys().collect())
}
