//! Spatial entity domain model.
//!
//! # Invariants
//! - `kind` cannot change once geometry has been generated against it.
//! - Every mutating setter strictly advances `updated_at`.
//! - `geometry_text` always passes `geometry::validate`.

use crate::geometry::{self, GeometryError, GeometryResult, ShapeKind};
use crate::model::{now_epoch_ms, ChapterId, SpatialEntityId};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Typed shape drawn on the map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpatialEntity {
    /// `None` until the row is persisted.
    pub id: Option<SpatialEntityId>,
    name: String,
    kind: ShapeKind,
    geometry_text: Option<String>,
    description: Option<String>,
    color: Option<String>,
    /// Unix epoch milliseconds.
    pub created_at: i64,
    /// Unix epoch milliseconds.
    updated_at: i64,
    pub chapter_id: Option<ChapterId>,
}

/// Model-level rule violations for spatial entities.
#[derive(Debug, Clone, PartialEq)]
pub enum SpatialEntityError {
    EmptyName,
    KindLocked { current: ShapeKind, requested: ShapeKind },
    MissingGeometry,
    Geometry(GeometryError),
}

impl Display for SpatialEntityError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyName => write!(f, "spatial entity name is required"),
            Self::KindLocked { current, requested } => write!(
                f,
                "spatial entity kind `{current}` is fixed by its geometry; cannot switch to `{requested}`"
            ),
            Self::MissingGeometry => write!(f, "spatial entity has no geometry"),
            Self::Geometry(err) => write!(f, "{err}"),
        }
    }
}

impl Error for SpatialEntityError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Geometry(err) => Some(err),
            _ => None,
        }
    }
}

impl From<GeometryError> for SpatialEntityError {
    fn from(value: GeometryError) -> Self {
        Self::Geometry(value)
    }
}

impl SpatialEntity {
    /// Creates an unsaved entity without geometry.
    pub fn new(name: impl Into<String>, kind: ShapeKind) -> Self {
        let now = now_epoch_ms();
        Self {
            id: None,
            name: name.into(),
            kind,
            geometry_text: None,
            description: None,
            color: None,
            created_at: now,
            updated_at: now,
            chapter_id: None,
        }
    }

    /// Rebuilds a persisted entity. Used by repository row mapping.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn from_parts(
        id: SpatialEntityId,
        name: String,
        kind: ShapeKind,
        geometry_text: String,
        description: Option<String>,
        color: Option<String>,
        created_at: i64,
        updated_at: i64,
        chapter_id: Option<ChapterId>,
    ) -> Self {
        Self {
            id: Some(id),
            name,
            kind,
            geometry_text: Some(geometry_text),
            description,
            color,
            created_at,
            updated_at,
            chapter_id,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> ShapeKind {
        self.kind
    }

    pub fn geometry_text(&self) -> Option<&str> {
        self.geometry_text.as_deref()
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn color(&self) -> Option<&str> {
        self.color.as_deref()
    }

    pub fn updated_at(&self) -> i64 {
        self.updated_at
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
        self.touch();
    }

    pub fn set_description(&mut self, description: Option<String>) {
        self.description = description;
        self.touch();
    }

    pub fn set_color(&mut self, color: Option<String>) {
        self.color = color;
        self.touch();
    }

    /// Replaces geometry text after syntactic validation.
    pub fn set_geometry(&mut self, text: impl Into<String>) -> GeometryResult<()> {
        let text = text.into();
        if !geometry::validate(&text) {
            return Err(GeometryError::InvalidGeometryText(text));
        }
        self.geometry_text = Some(text);
        self.touch();
        Ok(())
    }

    /// Generates geometry for the current kind around the given center.
    pub fn generate_geometry(&mut self, center_lat: f64, center_lng: f64) -> GeometryResult<()> {
        let text = geometry::generate(self.kind, center_lat, center_lng)?;
        self.geometry_text = Some(text);
        self.touch();
        Ok(())
    }

    /// Changes the kind while no geometry exists yet.
    pub fn set_kind(&mut self, kind: ShapeKind) -> Result<(), SpatialEntityError> {
        if kind == self.kind {
            return Ok(());
        }
        if self.geometry_text.is_some() {
            return Err(SpatialEntityError::KindLocked {
                current: self.kind,
                requested: kind,
            });
        }
        self.kind = kind;
        self.touch();
        Ok(())
    }

    /// Checks write-time invariants.
    pub fn validate(&self) -> Result<(), SpatialEntityError> {
        if self.name.trim().is_empty() {
            return Err(SpatialEntityError::EmptyName);
        }
        let text = self
            .geometry_text
            .as_deref()
            .ok_or(SpatialEntityError::MissingGeometry)?;
        if !geometry::validate(text) {
            return Err(GeometryError::InvalidGeometryText(text.to_string()).into());
        }
        Ok(())
    }

    fn touch(&mut self) {
        self.updated_at = now_epoch_ms().max(self.updated_at + 1);
    }
}

#[cfg(test)]
mod tests {
    use super::{SpatialEntity, SpatialEntityError};
    use crate::geometry::ShapeKind;

    #[test]
    fn every_setter_advances_updated_at() {
        let mut entity = SpatialEntity::new("harbor", ShapeKind::Point);
        let mut last = entity.updated_at();

        entity.set_name("old harbor");
        assert!(entity.updated_at() > last);
        last = entity.updated_at();

        entity.set_color(Some("#ff0000".to_string()));
        assert!(entity.updated_at() > last);
        last = entity.updated_at();

        entity.set_description(Some("where the ship docks".to_string()));
        assert!(entity.updated_at() > last);
        last = entity.updated_at();

        entity.set_geometry("POINT(1 2)").unwrap();
        assert!(entity.updated_at() > last);
    }

    #[test]
    fn kind_is_locked_after_geometry_generation() {
        let mut entity = SpatialEntity::new("square", ShapeKind::Polygon);
        entity.set_kind(ShapeKind::Circle).unwrap();
        entity.generate_geometry(40.0, -74.0).unwrap();

        let err = entity.set_kind(ShapeKind::Point).unwrap_err();
        assert_eq!(
            err,
            SpatialEntityError::KindLocked {
                current: ShapeKind::Circle,
                requested: ShapeKind::Point,
            }
        );
        entity.set_kind(ShapeKind::Circle).unwrap();
        assert_eq!(entity.kind(), ShapeKind::Circle);
    }

    #[test]
    fn invalid_geometry_is_rejected_and_previous_text_kept() {
        let mut entity = SpatialEntity::new("road", ShapeKind::LineString);
        entity.generate_geometry(1.0, 2.0).unwrap();
        let before = entity.geometry_text().map(str::to_string);

        assert!(entity.set_geometry("CIRCLE(1 2)").is_err());
        assert_eq!(entity.geometry_text().map(str::to_string), before);
    }

    #[test]
    fn validate_requires_name_and_geometry() {
        let mut entity = SpatialEntity::new("  ", ShapeKind::Point);
        assert_eq!(entity.validate().unwrap_err(), SpatialEntityError::EmptyName);

        entity.set_name("well");
        assert_eq!(
            entity.validate().unwrap_err(),
            SpatialEntityError::MissingGeometry
        );

        entity.generate_geometry(0.0, 0.0).unwrap();
        entity.validate().unwrap();
    }
}
