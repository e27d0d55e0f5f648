//! Resource registry use-case service.
//!
//! # Responsibility
//! - Entry point for the upload pipeline (first upload of a resource).
//! - Resource reads, own-metadata edits and the delete cascade.

use crate::model::meta::MetaDocument;
use crate::model::resource::{Resource, ResourceDeletion, ResourceId, UploadRequest};
use crate::repo::error::{RepoError, RepoResult};
use crate::repo::resource_repo::{CreatedResource, ResourceRepository};
use crate::service::log_outcome;
use std::time::Instant;

/// Use-case service over a resource repository.
pub struct ResourceService<R: ResourceRepository> {
    repo: R,
}

impl<R: ResourceRepository> ResourceService<R> {
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Stores the upload as version 1 of a new resource, joining or founding
    /// the requested series.
    pub fn create_resource(&self, request: &UploadRequest) -> RepoResult<CreatedResource> {
        let started_at = Instant::now();
        let result = self.repo.create_resource(request);
        let context = match &result {
            Ok(created) => format!(
                "resource_id={} version_id={} hash={} size={} series_id={}",
                created.resource.id,
                created.version.id,
                created.version.content_hash,
                created.version.size,
                created
                    .series
                    .map_or_else(|| "none".to_string(), |s| s.series_id.to_string())
            ),
            Err(_) => format!("size={}", request.bytes.len()),
        };
        log_outcome("resource_create", "resource", &context, started_at, &result);
        result
    }

    pub fn get_resource(&self, resource_id: ResourceId) -> RepoResult<Resource> {
        self.repo
            .get_resource(resource_id)?
            .ok_or(RepoError::ResourceNotFound(resource_id))
    }

    pub fn list_resources(&self, limit: Option<u32>, offset: u32) -> RepoResult<Vec<Resource>> {
        self.repo.list_resources(limit, offset)
    }

    /// Metadata as callers observe it: series document overlaid by own keys.
    pub fn effective_meta(&self, resource_id: ResourceId) -> RepoResult<MetaDocument> {
        self.repo.effective_meta(resource_id)
    }

    /// Replaces the resource's own metadata (its overrides, when in a series).
    pub fn set_own_meta(
        &self,
        resource_id: ResourceId,
        own_meta: &MetaDocument,
    ) -> RepoResult<Resource> {
        let started_at = Instant::now();
        let result = self.repo.set_own_meta(resource_id, own_meta);
        let context = format!("resource_id={resource_id} keys={}", own_meta.len());
        log_outcome("resource_meta_set", "resource", &context, started_at, &result);
        result
    }

    /// Deletes every version, leaves the series, then removes the resource.
    pub fn delete_resource(&self, resource_id: ResourceId) -> RepoResult<ResourceDeletion> {
        let started_at = Instant::now();
        let result = self.repo.delete_resource(resource_id);
        let context = match &result {
            Ok(deletion) => format!(
                "resource_id={resource_id} versions_deleted={} blobs_reclaimed={} series_deleted={}",
                deletion.versions_deleted,
                deletion.reclaimed.len(),
                deletion.left_series.is_some_and(|left| left.series_deleted)
            ),
            Err(_) => format!("resource_id={resource_id}"),
        };
        log_outcome("resource_delete", "resource", &context, started_at, &result);
        result
    }
}
