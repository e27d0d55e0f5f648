//! Series: one shared metadata document for a group of resources.

use crate::model::meta::MetaDocument;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stable series identifier.
pub type SeriesId = Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Series {
    pub id: SeriesId,
    /// Unique, trimmed, non-blank.
    pub slug: String,
    pub name: String,
    pub meta: MetaDocument,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Partial update for a series.
///
/// `meta` replaces the whole shared document. Member overrides are left as
/// they are, so an override can end up equal to the new shared value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SeriesPatch {
    pub name: Option<String>,
    pub meta: Option<MetaDocument>,
}
