//! Memoized per-manufacturer datasets
//!
//! Tables are loaded through a blob store once and kept until explicitly
//! invalidated.

use crate::output::Table;
use crate::store::traits::BlobStore;
use crate::HarvestError;
use std::collections::HashMap;
use std::sync::Arc;

/// Slug-keyed memo of parsed datasets
pub struct DatasetCache<S: BlobStore> {
    store: S,
    bucket: String,
    tables: HashMap<String, Arc<Table>>,
}

impl<S: BlobStore> DatasetCache<S> {
    pub fn new(store: S, bucket: &str) -> Self {
        Self {
            store,
            bucket: bucket.to_string(),
            tables: HashMap::new(),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Returns the dataset for `slug`, reading `<slug>.csv` on first use
    pub fn get_or_load(&mut self, slug: &str) -> Result<Arc<Table>, HarvestError> {
        if let Some(table) = self.tables.get(slug) {
            return Ok(Arc::clone(table));
        }

        let bytes = self.store.get(&self.bucket, &format!("{}.csv", slug))?;
        let table = Arc::new(Table::from_reader(bytes.as_slice())?);
        tracing::debug!("Loaded dataset {} ({} rows)", slug, table.rows.len());
        self.tables.insert(slug.to_string(), Arc::clone(&table));
        Ok(table)
    }

    /// Drops one memoized dataset; returns whether it was cached
    pub fn invalidate(&mut self, slug: &str) -> bool {
        self.tables.remove(slug).is_some()
    }

    pub fn clear(&mut self) {
        self.tables.clear();
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}
