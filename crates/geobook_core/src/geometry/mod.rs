//! Geometry synthesis and syntactic validation.
//!
//! # Responsibility
//! - Define the closed catalog of shape kinds used by spatial entities.
//! - Build WKT-like text for those shapes around a center point.
//! - Validate and classify geometry text at the storage boundary.
//!
//! # Invariants
//! - Generated text always passes [`validate`].
//! - Coordinates are written as `x y` = `longitude latitude`.
//! - Vendor-extension text (`SDO_GEOMETRY(...)`) is passed through opaquely.

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

mod synth;

pub use synth::{
    build_polygon, coordinate_pairs, extract_kind_hint, generate, validate, CIRCLE_SEGMENTS,
    DEFAULT_CENTER, GEOMETRY_OFFSET_DEGREES,
};

pub type GeometryResult<T> = Result<T, GeometryError>;

/// Shape catalog for spatial entities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShapeKind {
    Point,
    LineString,
    Polygon,
    Circle,
    Rectangle,
}

impl ShapeKind {
    pub const ALL: [ShapeKind; 5] = [
        ShapeKind::Point,
        ShapeKind::LineString,
        ShapeKind::Polygon,
        ShapeKind::Circle,
        ShapeKind::Rectangle,
    ];

    /// Stable storage id.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Point => "point",
            Self::LineString => "linestring",
            Self::Polygon => "polygon",
            Self::Circle => "circle",
            Self::Rectangle => "rectangle",
        }
    }

    /// Parses a storage id or an upper-case form name such as `LINESTRING`.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "point" => Some(Self::Point),
            "linestring" | "line_string" => Some(Self::LineString),
            "polygon" => Some(Self::Polygon),
            "circle" => Some(Self::Circle),
            "rectangle" => Some(Self::Rectangle),
            _ => None,
        }
    }

    /// Wire-level family the generated text belongs to.
    ///
    /// Circles and rectangles are emitted as closed polygon rings.
    pub fn geometry_family(self) -> GeometryKindHint {
        match self {
            Self::Point => GeometryKindHint::Point,
            Self::LineString => GeometryKindHint::LineString,
            Self::Polygon | Self::Circle | Self::Rectangle => GeometryKindHint::Polygon,
        }
    }
}

impl Display for ShapeKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Best-effort classification of geometry text. Not authoritative.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GeometryKindHint {
    Point,
    LineString,
    Polygon,
    Unknown,
}

impl GeometryKindHint {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Point => "POINT",
            Self::LineString => "LINESTRING",
            Self::Polygon => "POLYGON",
            Self::Unknown => "UNKNOWN",
        }
    }
}

/// Validation errors for coordinates and geometry text.
#[derive(Debug, Clone, PartialEq)]
pub enum GeometryError {
    /// Coordinate arrays must hold at least three complete `x y` pairs.
    InvalidCoordinateCount(usize),
    NonFiniteCoordinate,
    CenterOutOfRange { latitude: f64, longitude: f64 },
    InvalidGeometryText(String),
}

impl Display for GeometryError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidCoordinateCount(len) => write!(
                f,
                "polygon requires at least 3 coordinate pairs (6 values) in complete pairs, got {len} values"
            ),
            Self::NonFiniteCoordinate => write!(f, "coordinates must be finite numbers"),
            Self::CenterOutOfRange {
                latitude,
                longitude,
            } => write!(
                f,
                "center ({latitude}, {longitude}) is outside latitude [-90, 90] / longitude [-180, 180]"
            ),
            Self::InvalidGeometryText(text) => {
                write!(f, "invalid geometry text `{}`", summarize(text))
            }
        }
    }
}

impl Error for GeometryError {}

fn summarize(text: &str) -> String {
    const MAX_CHARS: usize = 48;
    let mut head = text.chars().take(MAX_CHARS).collect::<String>();
    if text.chars().count() > MAX_CHARS {
        head.push_str("...");
    }
    head
}

#[cfg(test)]
mod tests {
    use super::{GeometryError, GeometryKindHint, ShapeKind};

    #[test]
    fn shape_kind_parses_storage_ids_and_form_names() {
        for kind in ShapeKind::ALL {
            assert_eq!(ShapeKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(ShapeKind::parse("LINESTRING"), Some(ShapeKind::LineString));
        assert_eq!(ShapeKind::parse(" Circle "), Some(ShapeKind::Circle));
        assert_eq!(ShapeKind::parse("hexagon"), None);
    }

    #[test]
    fn circles_and_rectangles_belong_to_polygon_family() {
        assert_eq!(ShapeKind::Circle.geometry_family(), GeometryKindHint::Polygon);
        assert_eq!(
            ShapeKind::Rectangle.geometry_family(),
            GeometryKindHint::Polygon
        );
        assert_eq!(ShapeKind::Point.geometry_family(), GeometryKindHint::Point);
    }

    #[test]
    fn invalid_text_error_truncates_long_input() {
        let message = GeometryError::InvalidGeometryText("X".repeat(200)).to_string();
        assert!(message.ends_with("...`"));
        assert!(message.len() < 120);
    }
}
