//! Version chain persistence: append, restore, delete and list.
//!
//! # Responsibility
//! - Assign version numbers and move the current pointer atomically.
//! - Decide blob reclamation from the rows that still cite a hash.
//!
//! # Invariants
//! - Number assignment (`MAX + 1`) and the current-pointer update share one
//!   immediate transaction; `UNIQUE(resource_id, version_number)` rejects any
//!   second writer that slipped past.
//! - Restore always appends; it never reuses or rewinds a number.
//! - The current version is never deleted.
//! - A blob is removed from the content store only inside the transaction
//!   that deleted the last version row citing its hash, after every SQL step
//!   of that transaction succeeded. A failed remove leaves an orphan blob,
//!   never a version without content.

use crate::model::resource::ResourceId;
use crate::model::version::{
    restore_comment, Dimensions, NewVersion, ResourceVersion, VersionDeletion, VersionId,
    VersionUpload,
};
use crate::repo::error::{RepoError, RepoResult};
use crate::repo::{ensure_connection_ready, non_negative_u64, parse_hash_column, parse_uuid};
use crate::store::{ContentHash, ContentStore, StoreError};
use log::{error, warn};
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction, TransactionBehavior};
use uuid::Uuid;

const VERSION_SELECT_SQL: &str = "SELECT
    id,
    resource_id,
    version_number,
    content_hash,
    content_type,
    size,
    width,
    height,
    comment,
    created_at
FROM resource_versions";

/// Repository interface for the per-resource version chain.
pub trait VersionRepository {
    /// Stores `upload.bytes` and appends them as the new current version.
    fn upload_version(
        &self,
        resource_id: ResourceId,
        upload: &VersionUpload,
    ) -> RepoResult<ResourceVersion>;
    /// Appends a version for content already in the store and promotes it.
    fn create_version(
        &self,
        resource_id: ResourceId,
        new_version: &NewVersion,
    ) -> RepoResult<ResourceVersion>;
    /// Appends a copy of an older version's content reference and promotes it.
    fn restore_version(
        &self,
        resource_id: ResourceId,
        version_id: VersionId,
    ) -> RepoResult<ResourceVersion>;
    /// Deletes one non-current version.
    fn delete_version(
        &self,
        resource_id: ResourceId,
        version_id: VersionId,
    ) -> RepoResult<VersionDeletion>;
    /// Deletes non-current versions older than the newest `keep_last`.
    fn cleanup_versions(
        &self,
        resource_id: ResourceId,
        keep_last: u32,
    ) -> RepoResult<Vec<VersionDeletion>>;
    /// Loads one version scoped to its owning resource.
    fn get_version(
        &self,
        resource_id: ResourceId,
        version_id: VersionId,
    ) -> RepoResult<Option<ResourceVersion>>;
    /// Loads one version by id alone.
    fn find_version(&self, version_id: VersionId) -> RepoResult<Option<ResourceVersion>>;
    /// Lists all versions of a resource, newest number first.
    fn list_versions(&self, resource_id: ResourceId) -> RepoResult<Vec<ResourceVersion>>;
    /// Reads the bytes of one version from the content store.
    fn read_content(&self, resource_id: ResourceId, version_id: VersionId)
        -> RepoResult<Vec<u8>>;
}

/// SQLite-backed version repository.
pub struct SqliteVersionRepository<'conn> {
    conn: &'conn Connection,
    store: &'conn dyn ContentStore,
}

impl<'conn> SqliteVersionRepository<'conn> {
    /// Creates repository from a migrated connection and its content store.
    pub fn try_new(conn: &'conn Connection, store: &'conn dyn ContentStore) -> RepoResult<Self> {
        ensure_connection_ready(conn)?;
        Ok(Self { conn, store })
    }
}

impl VersionRepository for SqliteVersionRepository<'_> {
    fn upload_version(
        &self,
        resource_id: ResourceId,
        upload: &VersionUpload,
    ) -> RepoResult<ResourceVersion> {
        let content_hash = self.store.put(&upload.bytes)?;

        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        ensure_blob_present(self.store, &content_hash, &upload.bytes)?;
        let new_version = NewVersion {
            content_hash,
            content_type: upload.content_type.clone(),
            size: upload.bytes.len() as u64,
            dimensions: upload.dimensions,
            comment: upload.comment.clone().unwrap_or_default(),
            expected_number: upload.expected_number,
        };
        let version = append_version(&tx, resource_id, &new_version)?;
        tx.commit()?;
        Ok(version)
    }

    fn create_version(
        &self,
        resource_id: ResourceId,
        new_version: &NewVersion,
    ) -> RepoResult<ResourceVersion> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        if !self.store.exists(&new_version.content_hash)? {
            return Err(StoreError::NotFound(new_version.content_hash.clone()).into());
        }
        let version = append_version(&tx, resource_id, new_version)?;
        tx.commit()?;
        Ok(version)
    }

    fn restore_version(
        &self,
        resource_id: ResourceId,
        version_id: VersionId,
    ) -> RepoResult<ResourceVersion> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let target = load_owned_version(&tx, resource_id, version_id)?;
        let new_version = NewVersion {
            content_hash: target.content_hash,
            content_type: target.content_type,
            size: target.size,
            dimensions: target.dimensions,
            comment: restore_comment(target.version_number),
            expected_number: None,
        };
        let version = append_version(&tx, resource_id, &new_version)?;
        tx.commit()?;
        Ok(version)
    }

    fn delete_version(
        &self,
        resource_id: ResourceId,
        version_id: VersionId,
    ) -> RepoResult<VersionDeletion> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let version = load_owned_version(&tx, resource_id, version_id)?;
        if current_version_id(&tx, resource_id)? == version.id {
            return Err(RepoError::CurrentVersionDelete {
                resource_id,
                version_id,
            });
        }
        let unreferenced = remove_version_row(&tx, &version)?;
        let blob_reclaimed = unreferenced && reclaim_blob(self.store, &version.content_hash);
        tx.commit()?;
        Ok(VersionDeletion {
            version,
            blob_reclaimed,
        })
    }

    fn cleanup_versions(
        &self,
        resource_id: ResourceId,
        keep_last: u32,
    ) -> RepoResult<Vec<VersionDeletion>> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let current_id = current_version_id(&tx, resource_id)?;
        let mut removed = Vec::new();
        for (index, version) in list_versions_for(&tx, resource_id)?
            .into_iter()
            .enumerate()
        {
            if version.id == current_id || index < keep_last as usize {
                continue;
            }
            let unreferenced = remove_version_row(&tx, &version)?;
            removed.push((version, unreferenced));
        }

        let deleted = removed
            .into_iter()
            .map(|(version, unreferenced)| {
                let blob_reclaimed =
                    unreferenced && reclaim_blob(self.store, &version.content_hash);
                VersionDeletion {
                    version,
                    blob_reclaimed,
                }
            })
            .collect();
        tx.commit()?;
        Ok(deleted)
    }

    fn get_version(
        &self,
        resource_id: ResourceId,
        version_id: VersionId,
    ) -> RepoResult<Option<ResourceVersion>> {
        Ok(load_version(self.conn, version_id)?.filter(|v| v.resource_id == resource_id))
    }

    fn find_version(&self, version_id: VersionId) -> RepoResult<Option<ResourceVersion>> {
        load_version(self.conn, version_id)
    }

    fn list_versions(&self, resource_id: ResourceId) -> RepoResult<Vec<ResourceVersion>> {
        // Resolves the resource first so an unknown id is NotFound, not `[]`.
        current_version_id(self.conn, resource_id)?;
        list_versions_for(self.conn, resource_id)
    }

    fn read_content(
        &self,
        resource_id: ResourceId,
        version_id: VersionId,
    ) -> RepoResult<Vec<u8>> {
        let version = load_owned_version(self.conn, resource_id, version_id)?;
        match self.store.get(&version.content_hash) {
            Ok(bytes) => Ok(bytes),
            Err(StoreError::NotFound(hash)) => {
                error!(
                    "event=version_content module=version status=error error_code=missing_content resource_id={resource_id} version_id={version_id} hash={hash}"
                );
                Err(RepoError::MissingContent { version_id, hash })
            }
            Err(err) => Err(err.into()),
        }
    }
}

/// Appends `new_version` at `MAX + 1` and promotes it to current.
pub(crate) fn append_version(
    conn: &Connection,
    resource_id: ResourceId,
    new_version: &NewVersion,
) -> RepoResult<ResourceVersion> {
    current_version_id(conn, resource_id)?;
    let next = next_version_number(conn, resource_id)?;
    if let Some(expected) = new_version.expected_number {
        if expected != next {
            return Err(RepoError::NonMonotonicVersion {
                resource_id,
                expected,
                next,
            });
        }
    }

    let version = insert_version(conn, Uuid::new_v4(), resource_id, next, new_version)?;
    promote_version(conn, &version)?;
    Ok(version)
}

/// Inserts one version row with a caller-chosen id and number.
pub(crate) fn insert_version(
    conn: &Connection,
    version_id: VersionId,
    resource_id: ResourceId,
    version_number: u32,
    new_version: &NewVersion,
) -> RepoResult<ResourceVersion> {
    conn.execute(
        "INSERT INTO resource_versions (
            id,
            resource_id,
            version_number,
            content_hash,
            content_type,
            size,
            width,
            height,
            comment
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9);",
        params![
            version_id.to_string(),
            resource_id.to_string(),
            version_number,
            new_version.content_hash.as_str(),
            new_version.content_type.as_str(),
            size_to_db(new_version.size)?,
            new_version.dimensions.map(|d| d.width),
            new_version.dimensions.map(|d| d.height),
            new_version.comment.as_str(),
        ],
    )?;

    load_version(conn, version_id)?.ok_or(RepoError::VersionNotFound {
        resource_id,
        version_id,
    })
}

/// Points the resource at `version` and mirrors its content fields.
pub(crate) fn promote_version(conn: &Connection, version: &ResourceVersion) -> RepoResult<()> {
    let changed = conn.execute(
        "UPDATE resources
         SET
            current_version_id = ?2,
            hash = ?3,
            content_type = ?4,
            file_size = ?5,
            updated_at = (strftime('%s', 'now') * 1000)
         WHERE id = ?1;",
        params![
            version.resource_id.to_string(),
            version.id.to_string(),
            version.content_hash.as_str(),
            version.content_type.as_str(),
            size_to_db(version.size)?,
        ],
    )?;
    if changed == 0 {
        return Err(RepoError::ResourceNotFound(version.resource_id));
    }
    Ok(())
}

/// Deletes one version row.
///
/// Returns whether its hash is now unreferenced. The blob itself stays until
/// [`reclaim_blob`] runs at the end of the owning transaction.
pub(crate) fn remove_version_row(conn: &Connection, version: &ResourceVersion) -> RepoResult<bool> {
    conn.execute(
        "DELETE FROM resource_versions WHERE id = ?1;",
        [version.id.to_string()],
    )?;
    Ok(count_hash_references(conn, &version.content_hash)? == 0)
}

/// Removes an unreferenced blob. Call only after the last SQL statement of
/// the deleting transaction, right before commit.
///
/// Never fails: a store error is logged and leaves an orphan blob behind.
pub(crate) fn reclaim_blob(store: &dyn ContentStore, hash: &ContentHash) -> bool {
    match store.remove(hash) {
        Ok(true) => true,
        Ok(false) => {
            warn!(
                "event=blob_reclaim module=version status=skipped reason=already_absent hash={hash}"
            );
            false
        }
        Err(err) => {
            warn!(
                "event=blob_reclaim module=version status=error reason=orphaned hash={hash} error={err}"
            );
            false
        }
    }
}

/// Number of version rows (any resource) citing `hash`.
pub(crate) fn count_hash_references(conn: &Connection, hash: &ContentHash) -> RepoResult<i64> {
    let count = conn.query_row(
        "SELECT COUNT(*) FROM resource_versions WHERE content_hash = ?1;",
        [hash.as_str()],
        |row| row.get(0),
    )?;
    Ok(count)
}

/// Resolves the current version id of a resource.
pub(crate) fn current_version_id(
    conn: &Connection,
    resource_id: ResourceId,
) -> RepoResult<VersionId> {
    let value: Option<String> = conn
        .query_row(
            "SELECT current_version_id FROM resources WHERE id = ?1;",
            [resource_id.to_string()],
            |row| row.get(0),
        )
        .optional()?;
    match value {
        Some(value) => parse_uuid(&value, "resources.current_version_id"),
        None => Err(RepoError::ResourceNotFound(resource_id)),
    }
}

pub(crate) fn list_versions_for(
    conn: &Connection,
    resource_id: ResourceId,
) -> RepoResult<Vec<ResourceVersion>> {
    let mut stmt = conn.prepare(&format!(
        "{VERSION_SELECT_SQL}
         WHERE resource_id = ?1
         ORDER BY version_number DESC;"
    ))?;
    let mut rows = stmt.query([resource_id.to_string()])?;
    let mut versions = Vec::new();
    while let Some(row) = rows.next()? {
        versions.push(parse_version_row(row)?);
    }
    Ok(versions)
}

fn load_version(conn: &Connection, version_id: VersionId) -> RepoResult<Option<ResourceVersion>> {
    let mut stmt = conn.prepare(&format!("{VERSION_SELECT_SQL} WHERE id = ?1;"))?;
    let mut rows = stmt.query([version_id.to_string()])?;
    if let Some(row) = rows.next()? {
        return Ok(Some(parse_version_row(row)?));
    }
    Ok(None)
}

fn load_owned_version(
    conn: &Connection,
    resource_id: ResourceId,
    version_id: VersionId,
) -> RepoResult<ResourceVersion> {
    load_version(conn, version_id)?
        .filter(|version| version.resource_id == resource_id)
        .ok_or(RepoError::VersionNotFound {
            resource_id,
            version_id,
        })
}

fn next_version_number(conn: &Connection, resource_id: ResourceId) -> RepoResult<u32> {
    let max: i64 = conn.query_row(
        "SELECT COALESCE(MAX(version_number), 0)
         FROM resource_versions
         WHERE resource_id = ?1;",
        [resource_id.to_string()],
        |row| row.get(0),
    )?;
    u32::try_from(max + 1).map_err(|_| {
        RepoError::InvalidData(format!(
            "version number overflow for resource {resource_id}"
        ))
    })
}

/// Re-stores `bytes` if a concurrent delete reclaimed their blob between the
/// pre-transaction `put` and now. Holding the write lock, nothing can reclaim
/// it again before commit.
pub(crate) fn ensure_blob_present(
    store: &dyn ContentStore,
    hash: &ContentHash,
    bytes: &[u8],
) -> RepoResult<()> {
    if store.exists(hash)? {
        return Ok(());
    }
    warn!("event=blob_put module=version status=retry reason=reclaimed_concurrently hash={hash}");
    store.put(bytes)?;
    Ok(())
}

fn parse_version_row(row: &Row<'_>) -> RepoResult<ResourceVersion> {
    let id_text: String = row.get("id")?;
    let resource_text: String = row.get("resource_id")?;
    let hash_text: String = row.get("content_hash")?;
    let number: i64 = row.get("version_number")?;
    let version_number = u32::try_from(number)
        .ok()
        .filter(|value| *value > 0)
        .ok_or_else(|| {
            RepoError::InvalidData(format!(
                "invalid version number `{number}` in resource_versions.version_number"
            ))
        })?;

    let dimensions = match (
        row.get::<_, Option<u32>>("width")?,
        row.get::<_, Option<u32>>("height")?,
    ) {
        (Some(width), Some(height)) => Some(Dimensions { width, height }),
        (None, None) => None,
        _ => {
            return Err(RepoError::InvalidData(format!(
                "partial dimensions in resource_versions row `{id_text}`"
            )));
        }
    };

    Ok(ResourceVersion {
        id: parse_uuid(&id_text, "resource_versions.id")?,
        resource_id: parse_uuid(&resource_text, "resource_versions.resource_id")?,
        version_number,
        content_hash: parse_hash_column(&hash_text, "resource_versions.content_hash")?,
        content_type: row.get("content_type")?,
        size: non_negative_u64(row.get("size")?, "resource_versions.size")?,
        dimensions,
        comment: row.get("comment")?,
        created_at: row.get("created_at")?,
    })
}

pub(crate) fn size_to_db(size: u64) -> RepoResult<i64> {
    i64::try_from(size)
        .map_err(|_| RepoError::InvalidData(format!("content size {size} exceeds storage range")))
}
