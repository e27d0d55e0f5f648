//! Series use-case service.

use crate::model::meta::MetaDocument;
use crate::model::resource::{ResourceId, SeriesLeave};
use crate::model::series::{Series, SeriesId, SeriesPatch};
use crate::repo::error::{RepoError, RepoResult};
use crate::repo::series_repo::{SeriesJoin, SeriesRepository};
use crate::service::log_outcome;
use std::time::Instant;

/// Use-case service over a series repository.
pub struct SeriesService<R: SeriesRepository> {
    repo: R,
}

impl<R: SeriesRepository> SeriesService<R> {
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Joins (or founds) the series `slug` with an explicit metadata document.
    pub fn join_or_create(
        &self,
        slug: &str,
        resource_id: ResourceId,
        resource_meta: &MetaDocument,
    ) -> RepoResult<SeriesJoin> {
        let started_at = Instant::now();
        let result = self.repo.join_or_create(slug, resource_id, resource_meta);
        log_outcome(
            "series_join",
            "series",
            &join_context(resource_id, &result),
            started_at,
            &result,
        );
        result
    }

    /// Moves an existing resource into the series `slug`, keeping its
    /// effective metadata unchanged.
    pub fn attach(&self, slug: &str, resource_id: ResourceId) -> RepoResult<SeriesJoin> {
        let started_at = Instant::now();
        let result = self.repo.attach(slug, resource_id);
        log_outcome(
            "series_attach",
            "series",
            &join_context(resource_id, &result),
            started_at,
            &result,
        );
        result
    }

    /// Detaches a resource from its series; the series is deleted when this
    /// was its last member.
    pub fn remove_resource_from_series(&self, resource_id: ResourceId) -> RepoResult<SeriesLeave> {
        let started_at = Instant::now();
        let result = self.repo.leave(resource_id);
        let context = match &result {
            Ok(left) => format!(
                "resource_id={resource_id} series_id={} series_deleted={}",
                left.series_id, left.series_deleted
            ),
            Err(_) => format!("resource_id={resource_id}"),
        };
        log_outcome("series_leave", "series", &context, started_at, &result);
        result
    }

    /// Detaches every member (each keeps its effective metadata), then
    /// removes the series. Returns the former members.
    pub fn delete_series(&self, series_id: SeriesId) -> RepoResult<Vec<ResourceId>> {
        let started_at = Instant::now();
        let result = self.repo.delete_series(series_id);
        let context = match &result {
            Ok(members) => format!("series_id={series_id} members={}", members.len()),
            Err(_) => format!("series_id={series_id}"),
        };
        log_outcome("series_delete", "series", &context, started_at, &result);
        result
    }

    pub fn update_series(&self, series_id: SeriesId, patch: &SeriesPatch) -> RepoResult<Series> {
        let started_at = Instant::now();
        let result = self.repo.update_series(series_id, patch);
        let context = format!(
            "series_id={series_id} name_changed={} meta_changed={}",
            patch.name.is_some(),
            patch.meta.is_some()
        );
        log_outcome("series_update", "series", &context, started_at, &result);
        result
    }

    pub fn get_series(&self, series_id: SeriesId) -> RepoResult<Series> {
        self.repo
            .get_series(series_id)?
            .ok_or(RepoError::SeriesNotFound(series_id))
    }

    pub fn get_series_by_slug(&self, slug: &str) -> RepoResult<Option<Series>> {
        self.repo.get_series_by_slug(slug)
    }

    pub fn list_members(&self, series_id: SeriesId) -> RepoResult<Vec<ResourceId>> {
        self.repo.list_members(series_id)
    }
}

fn join_context(resource_id: ResourceId, result: &RepoResult<SeriesJoin>) -> String {
    match result {
        Ok(joined) => format!(
            "resource_id={resource_id} series_id={} created={}",
            joined.series_id, joined.created
        ),
        Err(_) => format!("resource_id={resource_id}"),
    }
}
