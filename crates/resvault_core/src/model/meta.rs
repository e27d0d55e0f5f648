//! Metadata documents and the shallow merge/diff rules behind series sharing.
//!
//! # Responsibility
//! - Parse and validate metadata documents (JSON objects only).
//! - Compute effective metadata and per-member overrides.
//!
//! # Invariants
//! - `shallow_merge(base, overlay)` never recurses: a nested object in
//!   `overlay` replaces the whole value under that key.
//! - `diff_own_meta` keeps exactly the keys whose value differs from the
//!   series document, including keys the series does not have.

use serde_json::{Map, Value};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Flat key/value metadata document.
pub type MetaDocument = Map<String, Value>;

/// Validation errors for metadata documents and series slugs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MetaError {
    /// Input is not valid JSON.
    Malformed(String),
    /// Input is valid JSON but not an object.
    NotAnObject(&'static str),
    /// Series slug is blank after trim.
    BlankSlug,
    /// Series name is blank after trim.
    BlankName,
}

impl Display for MetaError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Malformed(message) => write!(f, "malformed metadata document: {message}"),
            Self::NotAnObject(kind) => {
                write!(f, "metadata document must be a JSON object, got {kind}")
            }
            Self::BlankSlug => write!(f, "series slug must not be blank"),
            Self::BlankName => write!(f, "series name must not be blank"),
        }
    }
}

impl Error for MetaError {}

/// Parses a serialized metadata document.
pub fn parse_meta(raw: &str) -> Result<MetaDocument, MetaError> {
    let value: Value =
        serde_json::from_str(raw).map_err(|err| MetaError::Malformed(err.to_string()))?;
    meta_from_value(value)
}

/// Converts an arbitrary JSON value into a metadata document.
pub fn meta_from_value(value: Value) -> Result<MetaDocument, MetaError> {
    match value {
        Value::Object(map) => Ok(map),
        Value::Null => Err(MetaError::NotAnObject("null")),
        Value::Bool(_) => Err(MetaError::NotAnObject("boolean")),
        Value::Number(_) => Err(MetaError::NotAnObject("number")),
        Value::String(_) => Err(MetaError::NotAnObject("string")),
        Value::Array(_) => Err(MetaError::NotAnObject("array")),
    }
}

/// Serializes a metadata document for persistence.
pub fn meta_to_string(meta: &MetaDocument) -> String {
    Value::Object(meta.clone()).to_string()
}

/// Returns `base` with every key of `overlay` written over it.
pub fn shallow_merge(base: &MetaDocument, overlay: &MetaDocument) -> MetaDocument {
    let mut merged = base.clone();
    for (key, value) in overlay {
        merged.insert(key.clone(), value.clone());
    }
    merged
}

/// Returns the keys of `resource_meta` that a series member has to keep
/// locally because the series document holds a different value (or none).
pub fn diff_own_meta(resource_meta: &MetaDocument, series_meta: &MetaDocument) -> MetaDocument {
    resource_meta
        .iter()
        .filter(|(key, value)| series_meta.get(key.as_str()) != Some(*value))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect()
}

/// Trims a series slug and rejects blank input.
pub fn normalize_slug(slug: &str) -> Result<String, MetaError> {
    let trimmed = slug.trim();
    if trimmed.is_empty() {
        return Err(MetaError::BlankSlug);
    }
    Ok(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::{diff_own_meta, normalize_slug, parse_meta, shallow_merge, MetaError};
    use serde_json::json;

    fn doc(value: serde_json::Value) -> super::MetaDocument {
        super::meta_from_value(value).unwrap()
    }

    #[test]
    fn overlay_keys_win_on_merge() {
        let base = doc(json!({"artist": "alice", "page": 1}));
        let overlay = doc(json!({"page": 2, "lang": "en"}));
        let merged = shallow_merge(&base, &overlay);
        assert_eq!(merged, doc(json!({"artist": "alice", "page": 2, "lang": "en"})));
    }

    #[test]
    fn merge_replaces_nested_objects_wholesale() {
        let base = doc(json!({"source": {"site": "a", "id": 1}}));
        let overlay = doc(json!({"source": {"site": "b"}}));
        let merged = shallow_merge(&base, &overlay);
        assert_eq!(merged["source"], json!({"site": "b"}));
    }

    #[test]
    fn diff_keeps_only_differing_and_missing_keys() {
        let resource = doc(json!({"artist": "alice", "page": 2, "lang": "en"}));
        let series = doc(json!({"artist": "alice", "page": 1}));
        assert_eq!(
            diff_own_meta(&resource, &series),
            doc(json!({"page": 2, "lang": "en"}))
        );
    }

    #[test]
    fn diff_treats_type_changes_as_differences() {
        let resource = doc(json!({"page": "1"}));
        let series = doc(json!({"page": 1}));
        assert_eq!(diff_own_meta(&resource, &series), resource);
    }

    #[test]
    fn parse_rejects_non_objects_and_garbage() {
        assert_eq!(parse_meta("[1,2]"), Err(MetaError::NotAnObject("array")));
        assert_eq!(parse_meta("null"), Err(MetaError::NotAnObject("null")));
        assert!(matches!(parse_meta("{oops"), Err(MetaError::Malformed(_))));
        assert!(parse_meta("{}").unwrap().is_empty());
    }

    #[test]
    fn slug_is_trimmed_and_must_not_be_blank() {
        assert_eq!(normalize_slug("  comic-1 ").unwrap(), "comic-1");
        assert_eq!(normalize_slug("   "), Err(MetaError::BlankSlug));
    }
}
