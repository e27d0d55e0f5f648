//! resvault command-line front end.
//!
//! # Responsibility
//! - Map subcommands onto `resvault_core` services.
//! - Print results as JSON on stdout, errors on stderr.

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use resvault_core::model::meta::parse_meta;
use resvault_core::{
    MetaDocument, ResourceId, SeriesId, SeriesPatch, UploadRequest, Vault, VaultConfig, VersionId,
    VersionUpload,
};
use serde::Serialize;
use std::path::{Path, PathBuf};

const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

#[derive(Parser)]
#[command(name = "resvault")]
#[command(about = "Versioned, content-addressed resource store", version)]
struct Cli {
    /// Catalog database (overrides RESVAULT_DB_PATH)
    #[arg(long, global = true)]
    db: Option<PathBuf>,
    /// Blob directory (overrides RESVAULT_BLOB_DIR)
    #[arg(long, global = true)]
    blobs: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Store a file as a new resource
    Upload {
        file: PathBuf,
        #[arg(long)]
        name: Option<String>,
        #[arg(long, default_value = DEFAULT_CONTENT_TYPE)]
        content_type: String,
        /// Metadata document as a JSON object
        #[arg(long)]
        meta: Option<String>,
        /// Join (or found) this series
        #[arg(long)]
        series: Option<String>,
        #[arg(long)]
        comment: Option<String>,
    },
    /// Store a file as the next version of a resource
    NewVersion {
        resource: ResourceId,
        file: PathBuf,
        #[arg(long, default_value = DEFAULT_CONTENT_TYPE)]
        content_type: String,
        #[arg(long)]
        comment: Option<String>,
        /// Fail unless the new version gets exactly this number
        #[arg(long)]
        expect: Option<u32>,
    },
    /// List versions, newest first
    Versions { resource: ResourceId },
    /// Re-promote an old version as a new one
    Restore {
        resource: ResourceId,
        version: VersionId,
    },
    /// Delete a non-current version
    DeleteVersion {
        resource: ResourceId,
        version: VersionId,
    },
    /// Compare two versions
    Compare { first: VersionId, second: VersionId },
    /// Write the bytes of a version to a file
    Content {
        resource: ResourceId,
        version: VersionId,
        #[arg(long)]
        out: PathBuf,
    },
    /// Delete old non-current versions
    Cleanup {
        resource: ResourceId,
        #[arg(long, default_value_t = 5)]
        keep: u32,
    },
    /// Show one resource
    Show { resource: ResourceId },
    /// List resources, newest first
    List {
        #[arg(long)]
        limit: Option<u32>,
        #[arg(long, default_value_t = 0)]
        offset: u32,
    },
    /// Print effective metadata
    Meta { resource: ResourceId },
    /// Replace a resource's own metadata
    SetMeta { resource: ResourceId, meta: String },
    /// Delete a resource with all its versions
    Delete { resource: ResourceId },
    /// Series operations
    #[command(subcommand)]
    Series(SeriesCommands),
}

#[derive(Subcommand)]
enum SeriesCommands {
    /// Show a series by slug
    Show { slug: String },
    /// List member resource ids
    Members { series: SeriesId },
    /// Move a resource into a series, founding it if needed
    Join { slug: String, resource: ResourceId },
    /// Detach a resource from its series
    Leave { resource: ResourceId },
    /// Rename a series or replace its metadata document
    Update {
        series: SeriesId,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        meta: Option<String>,
    },
    /// Detach all members and delete the series
    Delete { series: SeriesId },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = VaultConfig::from_env()?;
    if let Some(db) = cli.db {
        config = config.with_db_path(db);
    }
    if let Some(blobs) = cli.blobs {
        config = config.with_blob_dir(blobs);
    }
    config.init_logging()?;

    let vault = Vault::open(&config)
        .with_context(|| format!("failed to open vault at {}", config.db_path.display()))?;
    run(&vault, cli.command)
}

fn run(vault: &Vault, command: Commands) -> Result<()> {
    match command {
        Commands::Upload {
            file,
            name,
            content_type,
            meta,
            series,
            comment,
        } => {
            let bytes = read_file(&file)?;
            let name = match name {
                Some(name) => name,
                None => file_name(&file)?,
            };
            let mut request = UploadRequest::new(name, content_type, bytes);
            request.meta = parse_meta_arg(meta.as_deref())?;
            request.series_slug = series;
            request.comment = comment;
            print_json(&vault.resources()?.create_resource(&request)?)
        }
        Commands::NewVersion {
            resource,
            file,
            content_type,
            comment,
            expect,
        } => {
            let mut upload = VersionUpload::new(content_type, read_file(&file)?);
            upload.comment = comment;
            upload.expected_number = expect;
            print_json(&vault.versions()?.upload_version(resource, &upload)?)
        }
        Commands::Versions { resource } => {
            print_json(&vault.versions()?.list_versions(resource)?)
        }
        Commands::Restore { resource, version } => {
            print_json(&vault.versions()?.restore_version(resource, version)?)
        }
        Commands::DeleteVersion { resource, version } => {
            print_json(&vault.versions()?.delete_version(resource, version)?)
        }
        Commands::Compare { first, second } => {
            print_json(&vault.versions()?.compare_versions(first, second)?)
        }
        Commands::Content {
            resource,
            version,
            out,
        } => {
            let bytes = vault.versions()?.version_content(resource, version)?;
            std::fs::write(&out, &bytes)
                .with_context(|| format!("failed to write {}", out.display()))?;
            print_json(&serde_json::json!({ "written": bytes.len(), "path": out }))
        }
        Commands::Cleanup { resource, keep } => {
            print_json(&vault.versions()?.cleanup_versions(resource, keep)?)
        }
        Commands::Show { resource } => print_json(&vault.resources()?.get_resource(resource)?),
        Commands::List { limit, offset } => {
            print_json(&vault.resources()?.list_resources(limit, offset)?)
        }
        Commands::Meta { resource } => print_json(&vault.resources()?.effective_meta(resource)?),
        Commands::SetMeta { resource, meta } => {
            let meta = parse_meta_arg(Some(&meta))?;
            print_json(&vault.resources()?.set_own_meta(resource, &meta)?)
        }
        Commands::Delete { resource } => {
            print_json(&vault.resources()?.delete_resource(resource)?)
        }
        Commands::Series(command) => run_series(vault, command),
    }
}

fn run_series(vault: &Vault, command: SeriesCommands) -> Result<()> {
    let series = vault.series()?;
    match command {
        SeriesCommands::Show { slug } => {
            let found = series
                .get_series_by_slug(&slug)?
                .ok_or_else(|| anyhow!("series not found: {slug}"))?;
            print_json(&found)
        }
        SeriesCommands::Members { series: series_id } => {
            print_json(&series.list_members(series_id)?)
        }
        SeriesCommands::Join { slug, resource } => print_json(&series.attach(&slug, resource)?),
        SeriesCommands::Leave { resource } => {
            print_json(&series.remove_resource_from_series(resource)?)
        }
        SeriesCommands::Update {
            series: series_id,
            name,
            meta,
        } => {
            let patch = SeriesPatch {
                name,
                meta: meta.as_deref().map(parse_meta).transpose()?,
            };
            print_json(&series.update_series(series_id, &patch)?)
        }
        SeriesCommands::Delete { series: series_id } => {
            print_json(&series.delete_series(series_id)?)
        }
    }
}

fn parse_meta_arg(raw: Option<&str>) -> Result<MetaDocument> {
    match raw {
        Some(raw) => Ok(parse_meta(raw)?),
        None => Ok(MetaDocument::new()),
    }
}

fn read_file(path: &Path) -> Result<Vec<u8>> {
    std::fs::read(path).with_context(|| format!("failed to read {}", path.display()))
}

fn file_name(path: &Path) -> Result<String> {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .ok_or_else(|| anyhow!("cannot derive a resource name from {}", path.display()))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
