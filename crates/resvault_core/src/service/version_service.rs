//! Version chain use-case service.
//!
//! # Responsibility
//! - Append, restore, delete, compare and list resource versions.
//!
//! # Invariants
//! - A restore of a missing or foreign version fails; it never falls back to
//!   a neighbouring version.
//! - Deleting the current version is reported as a conflict, never a no-op.

use crate::model::resource::ResourceId;
use crate::model::version::{
    NewVersion, ResourceVersion, VersionComparison, VersionDeletion, VersionId, VersionUpload,
};
use crate::repo::error::{RepoError, RepoResult};
use crate::repo::version_repo::VersionRepository;
use crate::service::log_outcome;
use std::time::Instant;

/// Use-case service over a version repository.
pub struct VersionService<R: VersionRepository> {
    repo: R,
}

impl<R: VersionRepository> VersionService<R> {
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Stores new content and promotes it as the next version.
    pub fn upload_version(
        &self,
        resource_id: ResourceId,
        upload: &VersionUpload,
    ) -> RepoResult<ResourceVersion> {
        let started_at = Instant::now();
        let result = self.repo.upload_version(resource_id, upload);
        log_outcome(
            "version_upload",
            "version",
            &version_context(resource_id, &result),
            started_at,
            &result,
        );
        result
    }

    /// Appends a version for content the caller already stored.
    pub fn create_version(
        &self,
        resource_id: ResourceId,
        new_version: &NewVersion,
    ) -> RepoResult<ResourceVersion> {
        let started_at = Instant::now();
        let result = self.repo.create_version(resource_id, new_version);
        log_outcome(
            "version_create",
            "version",
            &version_context(resource_id, &result),
            started_at,
            &result,
        );
        result
    }

    /// Re-promotes an older version's content as a brand new version.
    ///
    /// Restoring version 1 of `{1, 2, 3}` yields version 4.
    pub fn restore_version(
        &self,
        resource_id: ResourceId,
        version_id: VersionId,
    ) -> RepoResult<ResourceVersion> {
        let started_at = Instant::now();
        let result = self.repo.restore_version(resource_id, version_id);
        let context = match &result {
            Ok(version) => format!(
                "resource_id={resource_id} restored_version_id={version_id} version_number={}",
                version.version_number
            ),
            Err(_) => format!("resource_id={resource_id} restored_version_id={version_id}"),
        };
        log_outcome("version_restore", "version", &context, started_at, &result);
        result
    }

    /// Deletes a non-current version.
    pub fn delete_version(
        &self,
        resource_id: ResourceId,
        version_id: VersionId,
    ) -> RepoResult<VersionDeletion> {
        let started_at = Instant::now();
        let result = self.repo.delete_version(resource_id, version_id);
        let context = match &result {
            Ok(deletion) => format!(
                "resource_id={resource_id} version_id={version_id} blob_reclaimed={}",
                deletion.blob_reclaimed
            ),
            Err(_) => format!("resource_id={resource_id} version_id={version_id}"),
        };
        log_outcome("version_delete", "version", &context, started_at, &result);
        result
    }

    /// Deletes every non-current version older than the newest `keep_last`.
    pub fn cleanup_versions(
        &self,
        resource_id: ResourceId,
        keep_last: u32,
    ) -> RepoResult<Vec<VersionDeletion>> {
        let started_at = Instant::now();
        let result = self.repo.cleanup_versions(resource_id, keep_last);
        let context = match &result {
            Ok(deleted) => format!(
                "resource_id={resource_id} keep_last={keep_last} deleted={}",
                deleted.len()
            ),
            Err(_) => format!("resource_id={resource_id} keep_last={keep_last}"),
        };
        log_outcome("version_cleanup", "version", &context, started_at, &result);
        result
    }

    /// Compares two versions, possibly of different resources.
    pub fn compare_versions(
        &self,
        first: VersionId,
        second: VersionId,
    ) -> RepoResult<VersionComparison> {
        let first = self
            .repo
            .find_version(first)?
            .ok_or(RepoError::UnknownVersion(first))?;
        let second = self
            .repo
            .find_version(second)?
            .ok_or(RepoError::UnknownVersion(second))?;
        Ok(VersionComparison::between(&first, &second))
    }

    /// Lists versions of a resource, newest number first.
    pub fn list_versions(&self, resource_id: ResourceId) -> RepoResult<Vec<ResourceVersion>> {
        self.repo.list_versions(resource_id)
    }

    pub fn get_version(
        &self,
        resource_id: ResourceId,
        version_id: VersionId,
    ) -> RepoResult<ResourceVersion> {
        self.repo
            .get_version(resource_id, version_id)?
            .ok_or(RepoError::VersionNotFound {
                resource_id,
                version_id,
            })
    }

    /// Reads the bytes of one version.
    ///
    /// A version whose blob is gone fails with `MissingContent`, never with
    /// empty bytes.
    pub fn version_content(
        &self,
        resource_id: ResourceId,
        version_id: VersionId,
    ) -> RepoResult<Vec<u8>> {
        self.repo.read_content(resource_id, version_id)
    }
}

fn version_context(resource_id: ResourceId, result: &RepoResult<ResourceVersion>) -> String {
    match result {
        Ok(version) => format!(
            "resource_id={resource_id} version_id={} version_number={} hash={}",
            version.id, version.version_number, version.content_hash
        ),
        Err(_) => format!("resource_id={resource_id}"),
    }
}
