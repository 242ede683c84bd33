//! Spatial entity use-case service.
//!
//! # Invariants
//! - Entities are never persisted without geometry.
//! - Caller-supplied geometry must pass `geometry::validate`; otherwise
//!   geometry is generated for the entity kind.

use crate::geometry::{ShapeKind, DEFAULT_CENTER};
use crate::model::spatial_entity::SpatialEntity;
use crate::model::{ChapterId, SpatialEntityId};
use crate::repo::spatial_entity_repo::SpatialEntityRepository;
use crate::repo::{RepoError, RepoResult};
use log::info;

/// Input for creating one spatial entity.
#[derive(Debug, Clone, PartialEq)]
pub struct CreateEntityRequest {
    pub name: String,
    pub kind: ShapeKind,
    /// Explicit geometry; generated from `center` when absent.
    pub geometry_text: Option<String>,
    /// `(latitude, longitude)`; `DEFAULT_CENTER` when absent.
    pub center: Option<(f64, f64)>,
    pub description: Option<String>,
    pub color: Option<String>,
    pub chapter_id: Option<ChapterId>,
}

impl CreateEntityRequest {
    pub fn new(name: impl Into<String>, kind: ShapeKind) -> Self {
        Self {
            name: name.into(),
            kind,
            geometry_text: None,
            center: None,
            description: None,
            color: None,
            chapter_id: None,
        }
    }
}

pub struct SpatialEntityService<R: SpatialEntityRepository> {
    repo: R,
}

impl<R: SpatialEntityRepository> SpatialEntityService<R> {
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Builds, validates and stores a new entity; returns it with its id.
    pub fn create_entity(&self, request: &CreateEntityRequest) -> RepoResult<SpatialEntity> {
        let mut entity = SpatialEntity::new(request.name.trim(), request.kind);
        entity.set_description(request.description.clone());
        entity.set_color(request.color.clone());
        entity.chapter_id = request.chapter_id;

        match request.geometry_text.as_deref() {
            Some(text) => entity.set_geometry(text.trim())?,
            None => {
                let (latitude, longitude) = request.center.unwrap_or(DEFAULT_CENTER);
                entity.generate_geometry(latitude, longitude)?;
            }
        }

        let id = self.repo.create_entity(&entity)?;
        entity.id = Some(id);
        info!(
            "event=entity_create module=service status=ok entity_id={} kind={}",
            id,
            entity.kind()
        );
        Ok(entity)
    }

    /// Replaces an entity's geometry with a fresh shape of the same kind
    /// centered at `(latitude, longitude)`.
    pub fn regenerate_geometry(
        &self,
        id: SpatialEntityId,
        latitude: f64,
        longitude: f64,
    ) -> RepoResult<SpatialEntity> {
        let mut entity = self.repo.get_entity(id)?.ok_or(RepoError::NotFound {
            entity: "spatial entity",
            id,
        })?;
        entity.generate_geometry(latitude, longitude)?;
        self.repo.update_entity(&entity)?;
        Ok(entity)
    }

    pub fn get_entity(&self, id: SpatialEntityId) -> RepoResult<Option<SpatialEntity>> {
        self.repo.get_entity(id)
    }

    pub fn list_entities(&self, kind: Option<ShapeKind>) -> RepoResult<Vec<SpatialEntity>> {
        self.repo.list_entities(kind)
    }
}
