//! Content-addressable blob storage.
//!
//! # Responsibility
//! - Address stored bytes purely by their SHA-256 digest.
//! - Store each distinct content once, whatever references it.
//!
//! # Invariants
//! - `put` is idempotent: identical bytes map to the same hash and are never
//!   rewritten.
//! - A store never decides reclamation on its own; `remove` is only called by
//!   the version chain after it proved no version cites the hash.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::error::Error;
use std::fmt::{Display, Formatter};

mod fs_store;
mod memory_store;

pub use fs_store::FsContentStore;
pub use memory_store::MemoryContentStore;

static CONTENT_HASH_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[0-9a-f]{64}$").expect("valid content hash regex"));

pub type StoreResult<T> = Result<T, StoreError>;

/// Errors from content store operations.
#[derive(Debug)]
pub enum StoreError {
    /// No content is stored under this hash.
    NotFound(ContentHash),
    /// Value is not a lowercase hex SHA-256 digest.
    InvalidHash(String),
    /// Stored bytes no longer hash to their address.
    Corrupted(ContentHash),
    Io(std::io::Error),
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound(hash) => write!(f, "content not found: {hash}"),
            Self::InvalidHash(value) => write!(f, "invalid content hash `{value}`"),
            Self::Corrupted(hash) => write!(f, "stored content does not match hash {hash}"),
            Self::Io(err) => write!(f, "{err}"),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for StoreError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

/// Lowercase hex SHA-256 digest of stored bytes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ContentHash(String);

impl ContentHash {
    /// Hashes `bytes`.
    pub fn of(bytes: &[u8]) -> Self {
        Self(hex::encode(Sha256::digest(bytes)))
    }

    /// Validates a hash read from storage or user input.
    pub fn parse(value: &str) -> StoreResult<Self> {
        if CONTENT_HASH_RE.is_match(value) {
            Ok(Self(value.to_string()))
        } else {
            Err(StoreError::InvalidHash(value.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for ContentHash {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for ContentHash {
    type Error = StoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<ContentHash> for String {
    fn from(value: ContentHash) -> Self {
        value.0
    }
}

/// Content-addressed blob storage backend.
pub trait ContentStore: Send + Sync {
    /// Stores `bytes` once and returns their hash.
    fn put(&self, bytes: &[u8]) -> StoreResult<ContentHash>;
    /// Reads the bytes stored under `hash`.
    fn get(&self, hash: &ContentHash) -> StoreResult<Vec<u8>>;
    /// Returns whether bytes are stored under `hash`.
    fn exists(&self, hash: &ContentHash) -> StoreResult<bool>;
    /// Physically removes the bytes under `hash`. Returns `false` when there
    /// was nothing to remove.
    fn remove(&self, hash: &ContentHash) -> StoreResult<bool>;
}

#[cfg(test)]
mod tests {
    use super::{ContentHash, StoreError};

    #[test]
    fn hash_is_lowercase_hex_sha256() {
        let hash = ContentHash::of(b"abc");
        assert_eq!(
            hash.as_str(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
        assert_eq!(ContentHash::parse(hash.as_str()).unwrap(), hash);
    }

    #[test]
    fn parse_rejects_non_digest_values() {
        assert!(matches!(
            ContentHash::parse("ABC"),
            Err(StoreError::InvalidHash(_))
        ));
        assert!(matches!(
            ContentHash::parse(&"A".repeat(64)),
            Err(StoreError::InvalidHash(_))
        ));
        assert!(matches!(
            ContentHash::parse("../etc/passwd"),
            Err(StoreError::InvalidHash(_))
        ));
    }
}
