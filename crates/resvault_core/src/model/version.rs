//! Resource versions: immutable snapshots in a per-resource append-only log.
//!
//! # Invariants
//! - `version_number` starts at 1 and strictly increases per resource.
//! - A version row never changes after insert; only its presence does.

use crate::model::resource::ResourceId;
use crate::store::ContentHash;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stable version identifier.
pub type VersionId = Uuid;

/// Pixel dimensions reported by the upload pipeline for image content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceVersion {
    pub id: VersionId,
    pub resource_id: ResourceId,
    pub version_number: u32,
    pub content_hash: ContentHash,
    pub content_type: String,
    pub size: u64,
    pub dimensions: Option<Dimensions>,
    pub comment: String,
    /// Epoch ms.
    pub created_at: i64,
}

/// Content reference for a version about to be appended.
///
/// The bytes behind `content_hash` must already be in the content store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewVersion {
    pub content_hash: ContentHash,
    pub content_type: String,
    pub size: u64,
    pub dimensions: Option<Dimensions>,
    pub comment: String,
    /// When set, the append fails unless it would receive exactly this number.
    pub expected_number: Option<u32>,
}

/// New-version upload for an existing resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionUpload {
    pub content_type: String,
    pub bytes: Vec<u8>,
    pub comment: Option<String>,
    pub dimensions: Option<Dimensions>,
    pub expected_number: Option<u32>,
}

impl VersionUpload {
    pub fn new(content_type: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            content_type: content_type.into(),
            bytes: bytes.into(),
            comment: None,
            dimensions: None,
            expected_number: None,
        }
    }

    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }
}

/// Result of a version delete.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VersionDeletion {
    pub version: ResourceVersion,
    /// Whether the blob went with it (no other version cited the hash).
    pub blob_reclaimed: bool,
}

/// Side-by-side view of two versions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VersionComparison {
    pub resource1: ResourceId,
    pub resource2: ResourceId,
    pub number1: u32,
    pub number2: u32,
    /// Byte-identical content. Independent of number and comment.
    pub same_hash: bool,
    pub same_type: bool,
    pub size1: u64,
    pub size2: u64,
    /// `size2 - size1`.
    pub size_delta: i64,
    pub dimensions1: Option<Dimensions>,
    pub dimensions2: Option<Dimensions>,
    pub same_dimensions: bool,
}

impl VersionComparison {
    pub fn between(first: &ResourceVersion, second: &ResourceVersion) -> Self {
        Self {
            resource1: first.resource_id,
            resource2: second.resource_id,
            number1: first.version_number,
            number2: second.version_number,
            same_hash: first.content_hash == second.content_hash,
            same_type: first.content_type == second.content_type,
            size1: first.size,
            size2: second.size,
            size_delta: second.size as i64 - first.size as i64,
            dimensions1: first.dimensions,
            dimensions2: second.dimensions,
            same_dimensions: first.dimensions == second.dimensions,
        }
    }
}

/// Comment attached to a version created by restore.
pub fn restore_comment(restored_number: u32) -> String {
    format!("Restored from version {restored_number}")
}
