//! Resource entity: a stored file with metadata and a version chain.
//!
//! # Invariants
//! - `current_version_id` names a version owned by this resource.
//! - `hash`, `content_type` and `file_size` mirror the current version.
//! - `own_meta` holds the full metadata when `series_id` is `None`, and only
//!   the member overrides otherwise.

use crate::model::meta::{shallow_merge, MetaDocument};
use crate::model::series::{Series, SeriesId};
use crate::model::version::{Dimensions, VersionId};
use crate::store::ContentHash;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stable resource identifier.
pub type ResourceId = Uuid;

/// Persisted resource record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resource {
    pub id: ResourceId,
    pub name: String,
    pub current_version_id: VersionId,
    pub series_id: Option<SeriesId>,
    pub own_meta: MetaDocument,
    pub content_type: String,
    pub hash: ContentHash,
    pub file_size: u64,
    /// Epoch ms.
    pub created_at: i64,
    /// Epoch ms.
    pub updated_at: i64,
}

impl Resource {
    /// Computes the metadata callers observe for this resource.
    ///
    /// `series` must be the series named by `series_id`; passing `None` (or a
    /// resource without a series) yields `own_meta` unchanged.
    pub fn effective_meta(&self, series: Option<&Series>) -> MetaDocument {
        match series {
            Some(series) if self.series_id == Some(series.id) => {
                shallow_merge(&series.meta, &self.own_meta)
            }
            _ => self.own_meta.clone(),
        }
    }
}

/// First upload of a new resource, as handed over by the upload pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct UploadRequest {
    pub name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
    /// Full metadata of the new resource. Donated to the series when
    /// `series_slug` names a series that does not exist yet.
    pub meta: MetaDocument,
    pub series_slug: Option<String>,
    pub comment: Option<String>,
    pub dimensions: Option<Dimensions>,
}

impl UploadRequest {
    /// Creates a request with empty metadata and no series.
    pub fn new(
        name: impl Into<String>,
        content_type: impl Into<String>,
        bytes: impl Into<Vec<u8>>,
    ) -> Self {
        Self {
            name: name.into(),
            content_type: content_type.into(),
            bytes: bytes.into(),
            meta: MetaDocument::new(),
            series_slug: None,
            comment: None,
            dimensions: None,
        }
    }

    pub fn with_meta(mut self, meta: MetaDocument) -> Self {
        self.meta = meta;
        self
    }

    pub fn in_series(mut self, slug: impl Into<String>) -> Self {
        self.series_slug = Some(slug.into());
        self
    }
}

/// Summary of a resource delete cascade.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResourceDeletion {
    pub resource_id: ResourceId,
    pub versions_deleted: usize,
    /// Hashes whose blobs were physically reclaimed.
    pub reclaimed: Vec<ContentHash>,
    /// Series the resource left, and whether that emptied it.
    pub left_series: Option<SeriesLeave>,
}

/// Outcome of a resource leaving its series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SeriesLeave {
    pub series_id: SeriesId,
    pub series_deleted: bool,
}
