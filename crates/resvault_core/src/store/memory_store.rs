//! In-process content store for tests and throwaway vaults.

use super::{ContentHash, ContentStore, StoreError, StoreResult};
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

#[derive(Debug, Default)]
pub struct MemoryContentStore {
    blobs: RwLock<HashMap<ContentHash, Vec<u8>>>,
}

impl MemoryContentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of distinct blobs held.
    pub fn len(&self) -> usize {
        self.blobs
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ContentStore for MemoryContentStore {
    fn put(&self, bytes: &[u8]) -> StoreResult<ContentHash> {
        let hash = ContentHash::of(bytes);
        self.blobs
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(hash.clone())
            .or_insert_with(|| bytes.to_vec());
        Ok(hash)
    }

    fn get(&self, hash: &ContentHash) -> StoreResult<Vec<u8>> {
        self.blobs
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(hash)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(hash.clone()))
    }

    fn exists(&self, hash: &ContentHash) -> StoreResult<bool> {
        Ok(self
            .blobs
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(hash))
    }

    fn remove(&self, hash: &ContentHash) -> StoreResult<bool> {
        Ok(self
            .blobs
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(hash)
            .is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::MemoryContentStore;
    use crate::store::ContentStore;

    #[test]
    fn identical_bytes_share_one_blob() {
        let store = MemoryContentStore::new();
        let a = store.put(b"payload").unwrap();
        let b = store.put(b"payload").unwrap();
        store.put(b"other").unwrap();

        assert_eq!(a, b);
        assert_eq!(store.len(), 2);
        assert!(store.exists(&a).unwrap());
    }
}
