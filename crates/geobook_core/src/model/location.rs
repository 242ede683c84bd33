//! Location domain model.

use crate::geometry::{self, GeometryError, GeometryResult};
use crate::model::{ChapterId, LocationId};
use serde::{Deserialize, Serialize};

/// A narrative place pinned on the map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub id: LocationId,
    pub chapter_id: Option<ChapterId>,
    pub latitude: f64,
    pub longitude: f64,
    pub place_name: String,
    /// Normalized geometry text, valid per `geometry::validate` when set.
    pub geometry_text: Option<String>,
}

/// Insert model for a new location row.
#[derive(Debug, Clone, PartialEq)]
pub struct NewLocation {
    pub chapter_id: Option<ChapterId>,
    pub latitude: f64,
    pub longitude: f64,
    pub place_name: String,
    pub geometry_text: Option<String>,
}

impl NewLocation {
    pub fn new(place_name: impl Into<String>, latitude: f64, longitude: f64) -> Self {
        Self {
            chapter_id: None,
            latitude,
            longitude,
            place_name: place_name.into(),
            geometry_text: None,
        }
    }

    /// Checks coordinate ranges and optional geometry text.
    pub fn validate(&self) -> GeometryResult<()> {
        if !self.latitude.is_finite() || !self.longitude.is_finite() {
            return Err(GeometryError::NonFiniteCoordinate);
        }
        if !(-90.0..=90.0).contains(&self.latitude) || !(-180.0..=180.0).contains(&self.longitude)
        {
            return Err(GeometryError::CenterOutOfRange {
                latitude: self.latitude,
                longitude: self.longitude,
            });
        }
        validate_optional_geometry(self.geometry_text.as_deref())
    }
}

pub(crate) fn validate_optional_geometry(text: Option<&str>) -> GeometryResult<()> {
    match text {
        Some(value) if !geometry::validate(value) => {
            Err(GeometryError::InvalidGeometryText(value.to_string()))
        }
        _ => Ok(()),
    }
}
