//! Resource registry persistence.
//!
//! # Responsibility
//! - Create a resource together with its first version (and series
//!   membership) in one transaction.
//! - Cascade resource deletion through versions, blobs and series.
//!
//! # Invariants
//! - A resource row is never visible without its current version: both are
//!   inserted before the transaction commits.
//! - Delete order is versions, then series leave, then the resource row,
//!   then blobs no version cites any more.

use crate::model::meta::{normalize_slug, MetaDocument};
use crate::model::resource::{Resource, ResourceDeletion, ResourceId, UploadRequest};
use crate::model::series::SeriesId;
use crate::model::version::{NewVersion, ResourceVersion};
use crate::repo::error::{RepoError, RepoResult};
use crate::repo::series_repo::{self, SeriesJoin};
use crate::repo::version_repo::{
    current_version_id, ensure_blob_present, insert_version, list_versions_for,
    reclaim_blob, remove_version_row, size_to_db,
};
use crate::repo::{
    ensure_connection_ready, meta_column, non_negative_u64, parse_hash_column, parse_meta_column,
    parse_uuid,
};
use crate::store::ContentStore;
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction, TransactionBehavior};
use serde::Serialize;
use uuid::Uuid;

const RESOURCE_SELECT_SQL: &str = "SELECT
    id,
    name,
    current_version_id,
    series_id,
    own_meta,
    content_type,
    hash,
    file_size,
    created_at,
    updated_at
FROM resources";

const LIST_DEFAULT_LIMIT: u32 = 50;
const LIST_LIMIT_MAX: u32 = 500;

/// Newly created resource with its first version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CreatedResource {
    pub resource: Resource,
    pub version: ResourceVersion,
    pub series: Option<SeriesJoin>,
}

/// Repository interface for the resource registry.
pub trait ResourceRepository {
    /// Stores the upload and creates resource + version 1 (+ series join).
    fn create_resource(&self, request: &UploadRequest) -> RepoResult<CreatedResource>;
    fn get_resource(&self, resource_id: ResourceId) -> RepoResult<Option<Resource>>;
    /// Lists resources, newest first. `limit` defaults to 50 and caps at 500.
    fn list_resources(&self, limit: Option<u32>, offset: u32) -> RepoResult<Vec<Resource>>;
    /// Merges the series document (if any) under the resource's own keys.
    fn effective_meta(&self, resource_id: ResourceId) -> RepoResult<MetaDocument>;
    /// Replaces the resource's own metadata document.
    fn set_own_meta(&self, resource_id: ResourceId, own_meta: &MetaDocument)
        -> RepoResult<Resource>;
    /// Deletes all versions, leaves the series, removes the resource.
    fn delete_resource(&self, resource_id: ResourceId) -> RepoResult<ResourceDeletion>;
}

/// SQLite-backed resource repository.
pub struct SqliteResourceRepository<'conn> {
    conn: &'conn Connection,
    store: &'conn dyn ContentStore,
}

impl<'conn> SqliteResourceRepository<'conn> {
    pub fn try_new(conn: &'conn Connection, store: &'conn dyn ContentStore) -> RepoResult<Self> {
        ensure_connection_ready(conn)?;
        Ok(Self { conn, store })
    }
}

impl ResourceRepository for SqliteResourceRepository<'_> {
    fn create_resource(&self, request: &UploadRequest) -> RepoResult<CreatedResource> {
        let slug = request
            .series_slug
            .as_deref()
            .map(normalize_slug)
            .transpose()?;
        let content_hash = self.store.put(&request.bytes)?;

        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        ensure_blob_present(self.store, &content_hash, &request.bytes)?;

        let resource_id = Uuid::new_v4();
        let version_id = Uuid::new_v4();
        let size = request.bytes.len() as u64;
        // The composite key to `resource_versions` is deferred, so the row may
        // name its first version before that version exists.
        tx.execute(
            "INSERT INTO resources (
                id,
                name,
                current_version_id,
                content_type,
                hash,
                file_size,
                own_meta
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7);",
            params![
                resource_id.to_string(),
                request.name.as_str(),
                version_id.to_string(),
                request.content_type.as_str(),
                content_hash.as_str(),
                size_to_db(size)?,
                meta_column(&request.meta),
            ],
        )?;

        let version = insert_version(
            &tx,
            version_id,
            resource_id,
            1,
            &NewVersion {
                content_hash,
                content_type: request.content_type.clone(),
                size,
                dimensions: request.dimensions,
                comment: request.comment.clone().unwrap_or_default(),
                expected_number: None,
            },
        )?;

        let series = match slug {
            Some(slug) => Some(series_repo::join_or_create(
                &tx,
                &slug,
                resource_id,
                &request.meta,
            )?),
            None => None,
        };

        let resource =
            load_resource(&tx, resource_id)?.ok_or(RepoError::ResourceNotFound(resource_id))?;
        tx.commit()?;

        Ok(CreatedResource {
            resource,
            version,
            series,
        })
    }

    fn get_resource(&self, resource_id: ResourceId) -> RepoResult<Option<Resource>> {
        load_resource(self.conn, resource_id)
    }

    fn list_resources(&self, limit: Option<u32>, offset: u32) -> RepoResult<Vec<Resource>> {
        let limit = match limit {
            Some(0) | None => LIST_DEFAULT_LIMIT,
            Some(value) => value.min(LIST_LIMIT_MAX),
        };
        let mut stmt = self.conn.prepare(&format!(
            "{RESOURCE_SELECT_SQL}
             ORDER BY created_at DESC, id ASC
             LIMIT ?1 OFFSET ?2;"
        ))?;
        let mut rows = stmt.query(params![limit, offset])?;
        let mut resources = Vec::new();
        while let Some(row) = rows.next()? {
            resources.push(parse_resource_row(row)?);
        }
        Ok(resources)
    }

    fn effective_meta(&self, resource_id: ResourceId) -> RepoResult<MetaDocument> {
        series_repo::effective_meta(self.conn, resource_id)
    }

    fn set_own_meta(
        &self,
        resource_id: ResourceId,
        own_meta: &MetaDocument,
    ) -> RepoResult<Resource> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let changed = tx.execute(
            "UPDATE resources
             SET
                own_meta = ?2,
                updated_at = (strftime('%s', 'now') * 1000)
             WHERE id = ?1;",
            params![resource_id.to_string(), meta_column(own_meta)],
        )?;
        if changed == 0 {
            return Err(RepoError::ResourceNotFound(resource_id));
        }
        let resource =
            load_resource(&tx, resource_id)?.ok_or(RepoError::ResourceNotFound(resource_id))?;
        tx.commit()?;
        Ok(resource)
    }

    fn delete_resource(&self, resource_id: ResourceId) -> RepoResult<ResourceDeletion> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        current_version_id(&tx, resource_id)?;

        let versions = list_versions_for(&tx, resource_id)?;
        let versions_deleted = versions.len();
        let mut unreferenced = Vec::new();
        for version in versions {
            if remove_version_row(&tx, &version)? {
                unreferenced.push(version.content_hash);
            }
        }

        let left_series = series_repo::leave(&tx, resource_id)?;
        tx.execute(
            "DELETE FROM resources WHERE id = ?1;",
            [resource_id.to_string()],
        )?;

        let reclaimed = unreferenced
            .into_iter()
            .filter(|hash| reclaim_blob(self.store, hash))
            .collect();
        tx.commit()?;

        Ok(ResourceDeletion {
            resource_id,
            versions_deleted,
            reclaimed,
            left_series,
        })
    }
}

pub(crate) fn load_resource(
    conn: &Connection,
    resource_id: ResourceId,
) -> RepoResult<Option<Resource>> {
    let mut stmt = conn.prepare(&format!("{RESOURCE_SELECT_SQL} WHERE id = ?1;"))?;
    let mut rows = stmt.query([resource_id.to_string()])?;
    if let Some(row) = rows.next()? {
        return Ok(Some(parse_resource_row(row)?));
    }
    Ok(None)
}

/// Reads the series membership half of a resource.
pub(crate) fn load_membership(
    conn: &Connection,
    resource_id: ResourceId,
) -> RepoResult<(Option<SeriesId>, MetaDocument)> {
    let row: Option<(Option<String>, String)> = conn
        .query_row(
            "SELECT series_id, own_meta FROM resources WHERE id = ?1;",
            [resource_id.to_string()],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()?;
    let (series_text, meta_text) = row.ok_or(RepoError::ResourceNotFound(resource_id))?;
    let series_id = series_text
        .map(|value| parse_uuid(&value, "resources.series_id"))
        .transpose()?;
    Ok((series_id, parse_meta_column(&meta_text, "resources.own_meta")?))
}

/// Writes the series membership half of a resource.
pub(crate) fn write_membership(
    conn: &Connection,
    resource_id: ResourceId,
    series_id: Option<SeriesId>,
    own_meta: &MetaDocument,
) -> RepoResult<()> {
    let changed = conn.execute(
        "UPDATE resources
         SET
            series_id = ?2,
            own_meta = ?3,
            updated_at = (strftime('%s', 'now') * 1000)
         WHERE id = ?1;",
        params![
            resource_id.to_string(),
            series_id.map(|id| id.to_string()),
            meta_column(own_meta),
        ],
    )?;
    if changed == 0 {
        return Err(RepoError::ResourceNotFound(resource_id));
    }
    Ok(())
}

fn parse_resource_row(row: &Row<'_>) -> RepoResult<Resource> {
    let id_text: String = row.get("id")?;
    let current_text: String = row.get("current_version_id")?;
    let hash_text: String = row.get("hash")?;
    let meta_text: String = row.get("own_meta")?;
    let series_id = row
        .get::<_, Option<String>>("series_id")?
        .map(|value| parse_uuid(&value, "resources.series_id"))
        .transpose()?;

    Ok(Resource {
        id: parse_uuid(&id_text, "resources.id")?,
        name: row.get("name")?,
        current_version_id: parse_uuid(&current_text, "resources.current_version_id")?,
        series_id,
        own_meta: parse_meta_column(&meta_text, "resources.own_meta")?,
        content_type: row.get("content_type")?,
        hash: parse_hash_column(&hash_text, "resources.hash")?,
        file_size: non_negative_u64(row.get("file_size")?, "resources.file_size")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}
