//! Core of the resvault resource store.
//!
//! Content-addressed blobs, a per-resource version chain and series with
//! shared metadata. This crate owns every lifecycle invariant; the CLI only
//! forwards requests.

pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;
pub mod store;
pub mod vault;

pub use config::{ConfigError, VaultConfig};
pub use logging::{default_log_level, init_logging, logging_status};
pub use model::meta::{MetaDocument, MetaError};
pub use model::resource::{Resource, ResourceDeletion, ResourceId, SeriesLeave, UploadRequest};
pub use model::series::{Series, SeriesId, SeriesPatch};
pub use model::version::{
    Dimensions, NewVersion, ResourceVersion, VersionComparison, VersionDeletion, VersionId,
    VersionUpload,
};
pub use repo::error::{ErrorKind, RepoError, RepoResult};
pub use repo::resource_repo::CreatedResource;
pub use repo::series_repo::SeriesJoin;
pub use store::{ContentHash, ContentStore, FsContentStore, MemoryContentStore, StoreError};
pub use vault::Vault;

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
