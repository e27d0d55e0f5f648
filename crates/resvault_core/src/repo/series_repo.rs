//! Series persistence and the copy-on-join / merge-on-leave protocol.
//!
//! # Responsibility
//! - Create series on first join, diff member metadata against the shared
//!   document, merge it back on leave.
//! - Delete a series the moment its last member is gone.
//!
//! # Invariants
//! - Reading `series.meta` and writing the member's `own_meta` happen in one
//!   immediate transaction.
//! - Right after a join, `own_meta` holds no key whose value equals the
//!   series value. Later edits to the series do not re-diff members.
//! - A series row never exists with zero members after a leave commits.

use crate::model::meta::{diff_own_meta, normalize_slug, shallow_merge, MetaDocument, MetaError};
use crate::model::resource::{ResourceId, SeriesLeave};
use crate::model::series::{Series, SeriesId, SeriesPatch};
use crate::repo::error::{RepoError, RepoResult};
use crate::repo::resource_repo::{load_membership, load_resource, write_membership};
use crate::repo::{ensure_connection_ready, meta_column, parse_meta_column, parse_uuid};
use rusqlite::{params, Connection, Row, Transaction, TransactionBehavior};
use serde::Serialize;
use uuid::Uuid;

const SERIES_SELECT_SQL: &str = "SELECT
    id,
    slug,
    name,
    meta,
    created_at,
    updated_at
FROM series";

/// Outcome of a join.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SeriesJoin {
    pub series_id: SeriesId,
    /// Whether the join created the series (full metadata donation).
    pub created: bool,
}

/// Repository interface for series membership and the shared document.
pub trait SeriesRepository {
    /// Attaches a resource to the series named `slug`, creating it if needed.
    fn join_or_create(
        &self,
        slug: &str,
        resource_id: ResourceId,
        resource_meta: &MetaDocument,
    ) -> RepoResult<SeriesJoin>;
    /// Moves a resource into the series `slug` using its current effective
    /// metadata as the join document.
    fn attach(&self, slug: &str, resource_id: ResourceId) -> RepoResult<SeriesJoin>;
    /// Detaches a resource, merging the shared document into its own.
    fn leave(&self, resource_id: ResourceId) -> RepoResult<SeriesLeave>;
    /// Detaches every member, then removes the series.
    fn delete_series(&self, series_id: SeriesId) -> RepoResult<Vec<ResourceId>>;
    fn get_series(&self, series_id: SeriesId) -> RepoResult<Option<Series>>;
    fn get_series_by_slug(&self, slug: &str) -> RepoResult<Option<Series>>;
    fn update_series(&self, series_id: SeriesId, patch: &SeriesPatch) -> RepoResult<Series>;
    /// Member ids in stable order.
    fn list_members(&self, series_id: SeriesId) -> RepoResult<Vec<ResourceId>>;
}

/// SQLite-backed series repository.
pub struct SqliteSeriesRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteSeriesRepository<'conn> {
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn)?;
        Ok(Self { conn })
    }
}

impl SeriesRepository for SqliteSeriesRepository<'_> {
    fn join_or_create(
        &self,
        slug: &str,
        resource_id: ResourceId,
        resource_meta: &MetaDocument,
    ) -> RepoResult<SeriesJoin> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let joined = join_or_create(&tx, slug, resource_id, resource_meta)?;
        tx.commit()?;
        Ok(joined)
    }

    fn attach(&self, slug: &str, resource_id: ResourceId) -> RepoResult<SeriesJoin> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let effective = effective_meta(&tx, resource_id)?;
        let joined = join_or_create(&tx, slug, resource_id, &effective)?;
        tx.commit()?;
        Ok(joined)
    }

    fn leave(&self, resource_id: ResourceId) -> RepoResult<SeriesLeave> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let left = leave(&tx, resource_id)?.ok_or(RepoError::NotInSeries(resource_id))?;
        tx.commit()?;
        Ok(left)
    }

    fn delete_series(&self, series_id: SeriesId) -> RepoResult<Vec<ResourceId>> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        if load_series(&tx, series_id)?.is_none() {
            return Err(RepoError::SeriesNotFound(series_id));
        }
        let members = list_member_ids(&tx, series_id)?;
        for member in &members {
            leave(&tx, *member)?;
        }
        // No-op when the last leave already removed the row.
        tx.execute("DELETE FROM series WHERE id = ?1;", [series_id.to_string()])?;
        tx.commit()?;
        Ok(members)
    }

    fn get_series(&self, series_id: SeriesId) -> RepoResult<Option<Series>> {
        load_series(self.conn, series_id)
    }

    fn get_series_by_slug(&self, slug: &str) -> RepoResult<Option<Series>> {
        load_series_by_slug(self.conn, &normalize_slug(slug)?)
    }

    fn update_series(&self, series_id: SeriesId, patch: &SeriesPatch) -> RepoResult<Series> {
        let name = match patch.name.as_deref().map(str::trim) {
            Some("") => return Err(MetaError::BlankName.into()),
            other => other,
        };

        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let changed = tx.execute(
            "UPDATE series
             SET
                name = COALESCE(?2, name),
                meta = COALESCE(?3, meta),
                updated_at = (strftime('%s', 'now') * 1000)
             WHERE id = ?1;",
            params![
                series_id.to_string(),
                name,
                patch.meta.as_ref().map(meta_column),
            ],
        )?;
        if changed == 0 {
            return Err(RepoError::SeriesNotFound(series_id));
        }
        let series = load_series(&tx, series_id)?.ok_or(RepoError::SeriesNotFound(series_id))?;
        tx.commit()?;
        Ok(series)
    }

    fn list_members(&self, series_id: SeriesId) -> RepoResult<Vec<ResourceId>> {
        if load_series(self.conn, series_id)?.is_none() {
            return Err(RepoError::SeriesNotFound(series_id));
        }
        list_member_ids(self.conn, series_id)
    }
}

/// Joins `resource_id` to the series `slug`; see [`SeriesRepository::join_or_create`].
///
/// A resource that already belongs to another series leaves it first, so its
/// previous shared metadata is merged back before the new diff is taken.
/// Re-joining the current series only re-diffs `own_meta`; the series row
/// (id, name, shared document) is untouched.
pub(crate) fn join_or_create(
    conn: &Connection,
    slug: &str,
    resource_id: ResourceId,
    resource_meta: &MetaDocument,
) -> RepoResult<SeriesJoin> {
    let slug = normalize_slug(slug)?;
    let (current, _) = load_membership(conn, resource_id)?;
    let rejoined = match current {
        Some(series_id) => load_series(conn, series_id)?.filter(|series| series.slug == slug),
        None => None,
    };
    let existing = match rejoined {
        Some(series) => Some(series),
        None => {
            leave(conn, resource_id)?;
            load_series_by_slug(conn, &slug)?
        }
    };

    match existing {
        Some(series) => {
            let own_meta = diff_own_meta(resource_meta, &series.meta);
            write_membership(conn, resource_id, Some(series.id), &own_meta)?;
            Ok(SeriesJoin {
                series_id: series.id,
                created: false,
            })
        }
        None => {
            let series_id = Uuid::new_v4();
            conn.execute(
                "INSERT INTO series (id, slug, name, meta) VALUES (?1, ?2, ?2, ?3);",
                params![series_id.to_string(), slug, meta_column(resource_meta)],
            )?;
            write_membership(conn, resource_id, Some(series_id), &MetaDocument::new())?;
            Ok(SeriesJoin {
                series_id,
                created: true,
            })
        }
    }
}

/// Detaches `resource_id` from its series, if any.
///
/// Returns `None` when the resource is not a member.
pub(crate) fn leave(conn: &Connection, resource_id: ResourceId) -> RepoResult<Option<SeriesLeave>> {
    let (series_id, own_meta) = load_membership(conn, resource_id)?;
    let Some(series_id) = series_id else {
        return Ok(None);
    };

    let series = load_series(conn, series_id)?.ok_or_else(|| {
        RepoError::InvalidData(format!(
            "resource {resource_id} references missing series {series_id}"
        ))
    })?;
    let merged = shallow_merge(&series.meta, &own_meta);
    write_membership(conn, resource_id, None, &merged)?;

    let series_deleted = count_members(conn, series_id)? == 0;
    if series_deleted {
        conn.execute("DELETE FROM series WHERE id = ?1;", [series_id.to_string()])?;
    }

    Ok(Some(SeriesLeave {
        series_id,
        series_deleted,
    }))
}

/// Series document overlaid by the resource's own keys.
pub(crate) fn effective_meta(
    conn: &Connection,
    resource_id: ResourceId,
) -> RepoResult<MetaDocument> {
    let resource =
        load_resource(conn, resource_id)?.ok_or(RepoError::ResourceNotFound(resource_id))?;
    let series = match resource.series_id {
        Some(series_id) => Some(load_series(conn, series_id)?.ok_or_else(|| {
            RepoError::InvalidData(format!(
                "resource {resource_id} references missing series {series_id}"
            ))
        })?),
        None => None,
    };
    Ok(resource.effective_meta(series.as_ref()))
}

pub(crate) fn load_series(conn: &Connection, series_id: SeriesId) -> RepoResult<Option<Series>> {
    let mut stmt = conn.prepare(&format!("{SERIES_SELECT_SQL} WHERE id = ?1;"))?;
    let mut rows = stmt.query([series_id.to_string()])?;
    if let Some(row) = rows.next()? {
        return Ok(Some(parse_series_row(row)?));
    }
    Ok(None)
}

fn load_series_by_slug(conn: &Connection, slug: &str) -> RepoResult<Option<Series>> {
    let mut stmt = conn.prepare(&format!("{SERIES_SELECT_SQL} WHERE slug = ?1;"))?;
    let mut rows = stmt.query([slug])?;
    if let Some(row) = rows.next()? {
        return Ok(Some(parse_series_row(row)?));
    }
    Ok(None)
}

fn count_members(conn: &Connection, series_id: SeriesId) -> RepoResult<i64> {
    let count = conn.query_row(
        "SELECT COUNT(*) FROM resources WHERE series_id = ?1;",
        [series_id.to_string()],
        |row| row.get(0),
    )?;
    Ok(count)
}

fn list_member_ids(conn: &Connection, series_id: SeriesId) -> RepoResult<Vec<ResourceId>> {
    let mut stmt = conn.prepare(
        "SELECT id
         FROM resources
         WHERE series_id = ?1
         ORDER BY created_at ASC, id ASC;",
    )?;
    let mut rows = stmt.query([series_id.to_string()])?;
    let mut ids = Vec::new();
    while let Some(row) = rows.next()? {
        let value: String = row.get(0)?;
        ids.push(parse_uuid(&value, "resources.id")?);
    }
    Ok(ids)
}

fn parse_series_row(row: &Row<'_>) -> RepoResult<Series> {
    let id_text: String = row.get("id")?;
    let meta_text: String = row.get("meta")?;
    Ok(Series {
        id: parse_uuid(&id_text, "series.id")?,
        slug: row.get("slug")?,
        name: row.get("name")?,
        meta: parse_meta_column(&meta_text, "series.meta")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}
