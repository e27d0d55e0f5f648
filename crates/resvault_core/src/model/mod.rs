//! Domain model for stored resources, their versions and shared series.
//!
//! # Responsibility
//! - Define canonical records used by repository and service layers.
//! - Own the pure metadata helpers (merge, diff, validation).
//!
//! # Invariants
//! - Every entity is identified by a stable UUID.
//! - "Current version" lives only on `Resource`, never on a version row.

pub mod meta;
pub mod resource;
pub mod series;
pub mod version;
