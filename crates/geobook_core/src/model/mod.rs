//! Domain model for narrative locations, spatial entities and media assets.
//!
//! # Responsibility
//! - Define canonical records shared by repositories and services.
//!
//! # Invariants
//! - Ownership is one-directional: chapter -> location -> media asset.
//!   Back-references (`chapter_id`, `location_id`) are lookup-only.
//! - Geometry text held by any model passes `geometry::validate`.

pub mod location;
pub mod media;
pub mod spatial_entity;

/// Row id of a chapter. Lookup-only reference.
pub type ChapterId = i64;
/// Row id of a location.
pub type LocationId = i64;
/// Row id of a spatial entity.
pub type SpatialEntityId = i64;
/// Row id of a media asset.
pub type AssetId = i64;

/// Current wall clock in Unix epoch milliseconds.
pub(crate) fn now_epoch_ms() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as i64)
        .unwrap_or_default()
}
