//! Repository layer contracts and SQLite implementations.
//!
//! # Responsibility
//! - Define use-case oriented data access contracts for resources, versions
//!   and series.
//! - Keep SQL and transaction boundaries inside the persistence layer.
//!
//! # Invariants
//! - Every mutating trait method runs as exactly one `BEGIN IMMEDIATE`
//!   transaction. Module-level helpers never open transactions themselves so
//!   that cascades (resource delete, upload + join) can compose them.
//! - Repository APIs return semantic errors (`VersionNotFound`,
//!   `CurrentVersionDelete`, ...) in addition to DB transport errors.

pub mod error;
pub mod resource_repo;
pub mod series_repo;
pub mod version_repo;

use crate::db::migrations::latest_version;
use crate::model::meta::{meta_to_string, parse_meta, MetaDocument};
use error::{RepoError, RepoResult};
use rusqlite::Connection;
use uuid::Uuid;

/// Tables (and their required columns) every vault repository depends on.
const REQUIRED_SCHEMA: &[(&str, &[&str])] = &[
    (
        "resources",
        &[
            "id",
            "name",
            "current_version_id",
            "series_id",
            "content_type",
            "hash",
            "file_size",
            "own_meta",
        ],
    ),
    (
        "resource_versions",
        &[
            "id",
            "resource_id",
            "version_number",
            "content_hash",
            "content_type",
            "size",
            "width",
            "height",
            "comment",
            "created_at",
        ],
    ),
    ("series", &["id", "slug", "name", "meta"]),
];

pub(crate) fn ensure_connection_ready(conn: &Connection) -> RepoResult<()> {
    let expected_version = latest_version();
    let actual_version: u32 = conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;
    if actual_version != expected_version {
        return Err(RepoError::UninitializedConnection {
            expected_version,
            actual_version,
        });
    }

    for &(table, columns) in REQUIRED_SCHEMA {
        if !table_exists(conn, table)? {
            return Err(RepoError::MissingRequiredTable(table));
        }
        for &column in columns {
            if !table_has_column(conn, table, column)? {
                return Err(RepoError::MissingRequiredColumn { table, column });
            }
        }
    }

    Ok(())
}

fn table_exists(conn: &Connection, table: &str) -> RepoResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1
            FROM sqlite_master
            WHERE type = 'table' AND name = ?1
        );",
        [table],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

fn table_has_column(conn: &Connection, table: &str, column: &str) -> RepoResult<bool> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({table});"))?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let current: String = row.get(1)?;
        if current == column {
            return Ok(true);
        }
    }
    Ok(false)
}

pub(crate) fn parse_uuid(value: &str, column: &'static str) -> RepoResult<Uuid> {
    Uuid::parse_str(value)
        .map_err(|_| RepoError::InvalidData(format!("invalid uuid `{value}` in {column}")))
}

pub(crate) fn parse_meta_column(raw: &str, column: &'static str) -> RepoResult<MetaDocument> {
    parse_meta(raw).map_err(|err| RepoError::InvalidData(format!("{column}: {err}")))
}

pub(crate) fn meta_column(meta: &MetaDocument) -> String {
    meta_to_string(meta)
}

pub(crate) fn parse_hash_column(
    raw: &str,
    column: &'static str,
) -> RepoResult<crate::store::ContentHash> {
    crate::store::ContentHash::parse(raw)
        .map_err(|_| RepoError::InvalidData(format!("invalid content hash `{raw}` in {column}")))
}

pub(crate) fn non_negative_u64(value: i64, column: &'static str) -> RepoResult<u64> {
    u64::try_from(value)
        .map_err(|_| RepoError::InvalidData(format!("negative value `{value}` in {column}")))
}
