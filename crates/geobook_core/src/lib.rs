//! Core domain logic for Geobook.
//! Spatial search, geometry synthesis and media persistence for the
//! story map live here; front ends only route and render.

pub mod config;
pub mod db;
pub mod geometry;
pub mod logging;
pub mod media;
pub mod model;
pub mod repo;
pub mod service;
pub mod spatial;
pub mod storage;

pub use config::{ConfigError, GeobookConfig};
pub use db::{open_configured_db, open_db, open_db_in_memory, DbError, DbResult};
pub use geometry::{GeometryError, GeometryKindHint, ShapeKind};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use media::features::FeatureExtractor;
pub use media::thumbnail::ThumbnailPipeline;
pub use media::MediaError;
pub use model::location::{Location, NewLocation};
pub use model::media::{MediaAsset, StorageOutcome};
pub use model::spatial_entity::SpatialEntity;
pub use repo::{RepoError, RepoResult};
pub use service::media_service::{MediaService, UploadReceipt, UploadRequest};
pub use service::spatial_entity_service::{CreateEntityRequest, SpatialEntityService};
pub use spatial::search::{
    DegradedResultWarning, DistanceQuery, SearchError, SearchOutcome, SearchTier,
    TieredDistanceSearch,
};
pub use storage::asset_store::{AssetContent, AssetStore, Replacement};
pub use storage::capability::{CapabilityProbe, CapabilityUnavailable, NativeOperation};
pub use storage::AssetError;

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
