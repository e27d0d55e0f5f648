//! Catalog database: connection bootstrap and the vault schema.
//!
//! The catalog holds three tables: `resources` (registry + current pointer),
//! `resource_versions` (append-only log) and `series` (shared metadata).
//! Blob bytes never live here; rows only cite content hashes.
//!
//! # Invariants
//! - `PRAGMA user_version` equals the number of the last applied migration
//!   file (`0001_resources_versions.sql`, `0002_series.sql`, ...).
//! - A catalog stamped with a newer version than this binary knows is
//!   refused rather than opened read-write.

use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod migrations;
mod open;

pub use open::{open_db, open_db_in_memory};

pub type DbResult<T> = Result<T, DbError>;

/// Catalog open/migrate failures.
#[derive(Debug)]
pub enum DbError {
    /// SQLite transport error, including busy timeouts from a competing writer.
    Sqlite(rusqlite::Error),
    /// The catalog was written by a newer resvault.
    UnsupportedSchemaVersion {
        db_version: u32,
        latest_supported: u32,
    },
}

impl Display for DbError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sqlite(err) => write!(f, "catalog database error: {err}"),
            Self::UnsupportedSchemaVersion {
                db_version,
                latest_supported,
            } => write!(
                f,
                "catalog schema version {db_version} is newer than this build supports ({latest_supported}); upgrade resvault"
            ),
        }
    }
}

impl Error for DbError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Sqlite(err) => Some(err),
            Self::UnsupportedSchemaVersion { .. } => None,
        }
    }
}

impl From<rusqlite::Error> for DbError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sqlite(value)
    }
}
