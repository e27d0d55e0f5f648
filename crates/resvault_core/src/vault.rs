//! Vault handle: one catalog connection plus one content store.
//!
//! Repositories borrow both for the duration of a call; services are built
//! on demand and dropped right after.

use crate::config::{ConfigError, VaultConfig};
use crate::db::{open_db, open_db_in_memory};
use crate::repo::error::RepoResult;
use crate::repo::resource_repo::SqliteResourceRepository;
use crate::repo::series_repo::SqliteSeriesRepository;
use crate::repo::version_repo::SqliteVersionRepository;
use crate::service::resource_service::ResourceService;
use crate::service::series_service::SeriesService;
use crate::service::version_service::VersionService;
use crate::store::{ContentStore, FsContentStore, MemoryContentStore};
use log::info;
use rusqlite::Connection;

/// Open vault.
pub struct Vault {
    conn: Connection,
    store: Box<dyn ContentStore>,
}

impl Vault {
    /// Opens the catalog and blob directory named by `config`.
    pub fn open(config: &VaultConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let conn = open_db(&config.db_path)?;
        let store = FsContentStore::open(&config.blob_dir)?;
        info!(
            "event=vault_open module=vault status=ok db_path={} blob_dir={}",
            config.db_path.display(),
            config.blob_dir.display()
        );
        Ok(Self::with_store(conn, Box::new(store)))
    }

    /// Fully in-memory vault (catalog and blobs).
    pub fn in_memory() -> Result<Self, ConfigError> {
        let conn = open_db_in_memory()?;
        Ok(Self::with_store(conn, Box::new(MemoryContentStore::new())))
    }

    /// Wraps an already migrated connection.
    pub fn with_store(conn: Connection, store: Box<dyn ContentStore>) -> Self {
        Self { conn, store }
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    pub fn store(&self) -> &dyn ContentStore {
        self.store.as_ref()
    }

    pub fn resources(&self) -> RepoResult<ResourceService<SqliteResourceRepository<'_>>> {
        let repo = SqliteResourceRepository::try_new(&self.conn, self.store.as_ref())?;
        Ok(ResourceService::new(repo))
    }

    pub fn versions(&self) -> RepoResult<VersionService<SqliteVersionRepository<'_>>> {
        let repo = SqliteVersionRepository::try_new(&self.conn, self.store.as_ref())?;
        Ok(VersionService::new(repo))
    }

    pub fn series(&self) -> RepoResult<SeriesService<SqliteSeriesRepository<'_>>> {
        let repo = SqliteSeriesRepository::try_new(&self.conn)?;
        Ok(SeriesService::new(repo))
    }
}
