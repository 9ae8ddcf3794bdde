//! Filesystem-backed blob store
//!
//! Each bucket is a directory under the store root; each key is a file path
//! relative to its bucket directory.

use crate::store::traits::{validate_key, BlobStore, StoreResult};
use crate::StoreError;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Blob store rooted at a local directory
#[derive(Debug, Clone)]
pub struct FsBlobStore {
    root: PathBuf,
}

impl FsBlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn bucket_dir(&self, bucket: &str) -> StoreResult<PathBuf> {
        if bucket.is_empty() || bucket.contains('/') || bucket == "." || bucket == ".." {
            return Err(StoreError::InvalidKey(bucket.to_string()));
        }
        Ok(self.root.join(bucket))
    }

    fn object_path(&self, bucket: &str, key: &str) -> StoreResult<PathBuf> {
        validate_key(key)?;
        Ok(self.bucket_dir(bucket)?.join(key))
    }
}

impl BlobStore for FsBlobStore {
    fn get(&self, bucket: &str, key: &str) -> StoreResult<Vec<u8>> {
        let path = self.object_path(bucket, key)?;
        match fs::read(&path) {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(StoreError::NotFound {
                bucket: bucket.to_string(),
                key: key.to_string(),
            }),
            Err(e) => Err(e.into()),
        }
    }

    fn put(&self, bucket: &str, key: &str, bytes: &[u8]) -> StoreResult<()> {
        let path = self.object_path(bucket, key)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, bytes)?;
        tracing::debug!("Stored {}/{} ({} bytes)", bucket, key, bytes.len());
        Ok(())
    }

    fn list(&self, bucket: &str, prefix: &str) -> StoreResult<Vec<String>> {
        let dir = self.bucket_dir(bucket)?;
        let mut keys = Vec::new();
        if dir.is_dir() {
            collect_keys(&dir, &dir, &mut keys)?;
        }
        keys.retain(|key| key.starts_with(prefix));
        keys.sort();
        Ok(keys)
    }
}

fn collect_keys(base: &Path, dir: &Path, keys: &mut Vec<String>) -> StoreResult<()> {
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            collect_keys(base, &path, keys)?;
        } else if let Ok(relative) = path.strip_prefix(base) {
            let key = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            keys.push(key);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_put_then_get() {
        let dir = TempDir::new().unwrap();
        let store = FsBlobStore::new(dir.path());

        store.put("bucket", "audi.csv", b"Price,Url\n").unwrap();
        assert_eq!(store.get("bucket", "audi.csv").unwrap(), b"Price,Url\n");
        assert!(store.root().join("bucket/audi.csv").is_file());
    }

    #[test]
    fn test_get_missing_is_not_found() {
        let dir = TempDir::new().unwrap();
        let store = FsBlobStore::new(dir.path());

        match store.get("bucket", "bmw.csv") {
            Err(StoreError::NotFound { bucket, key }) => {
                assert_eq!(bucket, "bucket");
                assert_eq!(key, "bmw.csv");
            }
            other => panic!("expected NotFound, got {:?}", other),
        }
    }

    #[test]
    fn test_list_by_prefix() {
        let dir = TempDir::new().unwrap();
        let store = FsBlobStore::new(dir.path());

        store.put("b", "audi.csv", b"").unwrap();
        store.put("b", "alfa-romeo.csv", b"").unwrap();
        store.put("b", "nested/bmw.csv", b"").unwrap();

        assert_eq!(
            store.list("b", "a").unwrap(),
            vec!["alfa-romeo.csv".to_string(), "audi.csv".to_string()]
        );
        assert_eq!(store.list("b", "").unwrap().len(), 3);
        assert!(store.list("empty", "").unwrap().is_empty());
    }

    #[test]
    fn test_rejects_escaping_keys() {
        let dir = TempDir::new().unwrap();
        let store = FsBlobStore::new(dir.path());

        assert!(matches!(
            store.put("b", "../outside.csv", b""),
            Err(StoreError::InvalidKey(_))
        ));
        assert!(matches!(
            store.get("..", "audi.csv"),
            Err(StoreError::InvalidKey(_))
        ));
    }
}
