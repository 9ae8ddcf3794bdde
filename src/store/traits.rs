//! Object-store trait
//!
//! Buckets hold flat keys; a key may contain `/` but never a `..` segment.

use crate::StoreError;

/// Result type for object-store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Key-value blob store with bucket/key addressing
///
/// Implementations need no authentication layer; the harvester only moves
/// finished CSV payloads across this boundary.
pub trait BlobStore {
    /// Reads one object
    ///
    /// # Returns
    ///
    /// * `Ok(bytes)` - The object's content
    /// * `Err(StoreError::NotFound)` - No such key in the bucket
    fn get(&self, bucket: &str, key: &str) -> StoreResult<Vec<u8>>;

    /// Writes one object, replacing any previous content
    fn put(&self, bucket: &str, key: &str, bytes: &[u8]) -> StoreResult<()>;

    /// Lists the keys of a bucket starting with `prefix`, sorted
    fn list(&self, bucket: &str, prefix: &str) -> StoreResult<Vec<String>>;
}

/// Rejects empty keys and keys that could escape the bucket
pub fn validate_key(key: &str) -> StoreResult<()> {
    if key.is_empty()
        || key.starts_with('/')
        || key.split('/').any(|segment| segment.is_empty() || segment == "." || segment == "..")
    {
        return Err(StoreError::InvalidKey(key.to_string()));
    }
    Ok(())
}
