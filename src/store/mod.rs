//! Object-store collaborator for finished datasets
//!
//! This module handles moving crawl output out of the data directory:
//! - The bucket/key blob store interface
//! - A filesystem implementation of it
//! - Publishing every CSV of a data directory
//! - A memoizing cache of parsed datasets

mod cache;
mod fs;
mod traits;

pub use cache::DatasetCache;
pub use fs::FsBlobStore;
pub use traits::{validate_key, BlobStore, StoreResult};

use crate::HarvestError;
use std::path::Path;

/// Uploads every `.csv` file of `data_dir` under its file name
///
/// # Arguments
///
/// * `store` - Destination store
/// * `bucket` - Destination bucket
/// * `data_dir` - Directory holding per-target and combined files
///
/// # Returns
///
/// * `Ok(keys)` - Published keys in name order
/// * `Err(HarvestError)` - Directory unreadable or a put failed
pub fn publish_outputs<S: BlobStore>(
    store: &S,
    bucket: &str,
    data_dir: &Path,
) -> Result<Vec<String>, HarvestError> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(data_dir)? {
        let path = entry?.path();
        let is_csv = path.extension().map_or(false, |ext| ext == "csv");
        if path.is_file() && is_csv {
            files.push(path);
        }
    }
    files.sort();

    let mut keys = Vec::with_capacity(files.len());
    for path in files {
        let Some(key) = path.file_name().and_then(|n| n.to_str()).map(str::to_string) else {
            tracing::warn!("Skipping non UTF-8 file name {}", path.display());
            continue;
        };
        let bytes = std::fs::read(&path)?;
        store.put(bucket, &key, &bytes)?;
        tracing::info!("Published {} to {}", key, bucket);
        keys.push(key);
    }

    Ok(keys)
}
