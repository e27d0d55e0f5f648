//! Repository error taxonomy shared by resource, version and series storage.

use crate::db::DbError;
use crate::model::meta::MetaError;
use crate::model::resource::ResourceId;
use crate::model::series::SeriesId;
use crate::model::version::VersionId;
use crate::store::{ContentHash, StoreError};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type RepoResult<T> = Result<T, RepoError>;

/// Coarse classification callers map to user-visible messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Id absent, or present but owned by another parent.
    NotFound,
    /// Request contradicts current state (deleting the current version).
    Conflict,
    /// Malformed input.
    Validation,
    /// Stored state violates an internal invariant. Server-class failure.
    Consistency,
    /// Storage transport failure.
    Internal,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NotFound => "not_found",
            Self::Conflict => "conflict",
            Self::Validation => "validation",
            Self::Consistency => "consistency",
            Self::Internal => "internal",
        }
    }
}

#[derive(Debug)]
pub enum RepoError {
    Db(DbError),
    Store(StoreError),
    ResourceNotFound(ResourceId),
    /// Version does not exist or belongs to a different resource.
    VersionNotFound {
        resource_id: ResourceId,
        version_id: VersionId,
    },
    /// Version id looked up without an owning resource.
    UnknownVersion(VersionId),
    SeriesNotFound(SeriesId),
    /// Resource is not attached to any series.
    NotInSeries(ResourceId),
    /// The current version of a resource can never be deleted.
    CurrentVersionDelete {
        resource_id: ResourceId,
        version_id: VersionId,
    },
    /// Caller expected a different next version number.
    NonMonotonicVersion {
        resource_id: ResourceId,
        expected: u32,
        next: u32,
    },
    Validation(MetaError),
    /// A version cites a hash the content store does not hold.
    MissingContent {
        version_id: VersionId,
        hash: ContentHash,
    },
    /// Connection schema is not at the expected migrated version.
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    MissingRequiredTable(&'static str),
    MissingRequiredColumn {
        table: &'static str,
        column: &'static str,
    },
    /// Persisted row cannot be converted into a valid record.
    InvalidData(String),
}

impl RepoError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::ResourceNotFound(_)
            | Self::VersionNotFound { .. }
            | Self::UnknownVersion(_)
            | Self::SeriesNotFound(_)
            | Self::NotInSeries(_)
            | Self::Store(StoreError::NotFound(_)) => ErrorKind::NotFound,
            Self::CurrentVersionDelete { .. } => ErrorKind::Conflict,
            Self::NonMonotonicVersion { .. } | Self::Validation(_) => ErrorKind::Validation,
            Self::MissingContent { .. } | Self::InvalidData(_) => ErrorKind::Consistency,
            Self::Store(StoreError::Corrupted(_)) => ErrorKind::Consistency,
            Self::Store(StoreError::InvalidHash(_)) => ErrorKind::Validation,
            Self::Db(_)
            | Self::Store(_)
            | Self::UninitializedConnection { .. }
            | Self::MissingRequiredTable(_)
            | Self::MissingRequiredColumn { .. } => ErrorKind::Internal,
        }
    }
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::Store(err) => write!(f, "{err}"),
            Self::ResourceNotFound(id) => write!(f, "resource not found: {id}"),
            Self::VersionNotFound {
                resource_id,
                version_id,
            } => write!(
                f,
                "version {version_id} not found for resource {resource_id}"
            ),
            Self::UnknownVersion(id) => write!(f, "version not found: {id}"),
            Self::SeriesNotFound(id) => write!(f, "series not found: {id}"),
            Self::NotInSeries(id) => write!(f, "resource {id} is not in a series"),
            Self::CurrentVersionDelete {
                resource_id,
                version_id,
            } => write!(
                f,
                "cannot delete version {version_id}: it is the current version of resource {resource_id}"
            ),
            Self::NonMonotonicVersion {
                resource_id,
                expected,
                next,
            } => write!(
                f,
                "resource {resource_id} would receive version {next}, caller expected {expected}"
            ),
            Self::Validation(err) => write!(f, "{err}"),
            Self::MissingContent { version_id, hash } => write!(
                f,
                "content {hash} referenced by version {version_id} is missing from the content store"
            ),
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "vault repository requires schema version {expected_version}, got {actual_version}"
            ),
            Self::MissingRequiredTable(table) => {
                write!(f, "vault repository requires table `{table}`")
            }
            Self::MissingRequiredColumn { table, column } => write!(
                f,
                "vault repository requires column `{column}` in table `{table}`"
            ),
            Self::InvalidData(message) => write!(f, "invalid persisted vault data: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::Store(err) => Some(err),
            Self::Validation(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

impl From<StoreError> for RepoError {
    fn from(value: StoreError) -> Self {
        Self::Store(value)
    }
}

impl From<MetaError> for RepoError {
    fn from(value: MetaError) -> Self {
        Self::Validation(value)
    }
}

#[cfg(test)]
mod tests {
    use super::{ErrorKind, RepoError};
    use uuid::Uuid;

    #[test]
    fn current_version_delete_is_a_conflict_with_specific_message() {
        let err = RepoError::CurrentVersionDelete {
            resource_id: Uuid::new_v4(),
            version_id: Uuid::new_v4(),
        };
        assert_eq!(err.kind(), ErrorKind::Conflict);
        assert!(err.to_string().contains("current version"));
    }

    #[test]
    fn missing_content_is_a_consistency_failure() {
        let err = RepoError::MissingContent {
            version_id: Uuid::new_v4(),
            hash: crate::store::ContentHash::of(b"gone"),
        };
        assert_eq!(err.kind(), ErrorKind::Consistency);
    }
}
