//! Filesystem content store.
//!
//! Layout: `<root>/<h[0..2]>/<h[2..4]>/<hash>`. Writes land in a uniquely
//! named temp file next to the target and are renamed into place, so readers
//! never observe a partial blob.

use super::{ContentHash, ContentStore, StoreError, StoreResult};
use log::{debug, warn};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct FsContentStore {
    root: PathBuf,
}

impl FsContentStore {
    /// Opens (and creates if needed) a store rooted at `root`.
    pub fn open(root: impl Into<PathBuf>) -> StoreResult<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Hash-derived location of a blob.
    pub fn blob_path(&self, hash: &ContentHash) -> PathBuf {
        let hex = hash.as_str();
        self.root.join(&hex[0..2]).join(&hex[2..4]).join(hex)
    }
}

impl ContentStore for FsContentStore {
    fn put(&self, bytes: &[u8]) -> StoreResult<ContentHash> {
        let hash = ContentHash::of(bytes);
        let path = self.blob_path(&hash);
        if path.is_file() {
            debug!(
                "event=blob_put module=store status=dedup hash={hash} size={}",
                bytes.len()
            );
            return Ok(hash);
        }

        let parent = path
            .parent()
            .ok_or_else(|| StoreError::InvalidHash(hash.to_string()))?;
        fs::create_dir_all(parent)?;

        let temp_path = parent.join(format!(".{}.{}.tmp", hash.as_str(), Uuid::new_v4()));
        if let Err(err) = fs::write(&temp_path, bytes) {
            let _ = fs::remove_file(&temp_path);
            return Err(err.into());
        }
        if let Err(err) = fs::rename(&temp_path, &path) {
            let _ = fs::remove_file(&temp_path);
            return Err(err.into());
        }

        debug!(
            "event=blob_put module=store status=ok hash={hash} size={}",
            bytes.len()
        );
        Ok(hash)
    }

    fn get(&self, hash: &ContentHash) -> StoreResult<Vec<u8>> {
        let bytes = match fs::read(self.blob_path(hash)) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                return Err(StoreError::NotFound(hash.clone()));
            }
            Err(err) => return Err(err.into()),
        };
        if ContentHash::of(&bytes) != *hash {
            warn!("event=blob_get module=store status=error error_code=blob_corrupted hash={hash}");
            return Err(StoreError::Corrupted(hash.clone()));
        }
        Ok(bytes)
    }

    fn exists(&self, hash: &ContentHash) -> StoreResult<bool> {
        Ok(self.blob_path(hash).is_file())
    }

    fn remove(&self, hash: &ContentHash) -> StoreResult<bool> {
        match fs::remove_file(self.blob_path(hash)) {
            Ok(()) => {
                debug!("event=blob_remove module=store status=ok hash={hash}");
                Ok(true)
            }
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(false),
            Err(err) => Err(err.into()),
        }
    }
}
