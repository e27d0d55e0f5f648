//! Core use-case services.
//!
//! # Responsibility
//! - Expose the vault operations consumed by the API layer.
//! - Emit one metadata-only outcome event per operation.
//! - Keep callers decoupled from SQL and content store details.

pub mod resource_service;
pub mod series_service;
pub mod version_service;

use crate::repo::error::{ErrorKind, RepoResult};
use log::{error, info, warn};
use std::time::Instant;

/// Logs the outcome of one operation.
///
/// `context` is a preformatted `key=value` list of ids. Expected rejections
/// (not found, conflict, validation) log at `warn`; consistency and storage
/// failures log at `error`.
pub(crate) fn log_outcome<T>(
    event: &str,
    module: &str,
    context: &str,
    started_at: Instant,
    result: &RepoResult<T>,
) {
    let duration_ms = started_at.elapsed().as_millis();
    match result {
        Ok(_) => info!("event={event} module={module} status=ok {context} duration_ms={duration_ms}"),
        Err(err) => match err.kind() {
            ErrorKind::Consistency | ErrorKind::Internal => error!(
                "event={event} module={module} status=error {context} duration_ms={duration_ms} error_code={} error={err}",
                err.kind().as_str()
            ),
            kind => warn!(
                "event={event} module={module} status=rejected {context} duration_ms={duration_ms} error_code={}",
                kind.as_str()
            ),
        },
    }
}
