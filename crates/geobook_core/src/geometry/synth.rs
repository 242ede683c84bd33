//! WKT-like text builders, validator and kind classifier.

use super::{GeometryError, GeometryKindHint, GeometryResult, ShapeKind};
use once_cell::sync::Lazy;
use regex::Regex;
use std::f64::consts::PI;

/// Offset unit used for every synthesized shape, in degrees.
pub const GEOMETRY_OFFSET_DEGREES: f64 = 0.01;
/// Number of vertices used to approximate a circle.
pub const CIRCLE_SEGMENTS: usize = 16;
/// Map center `(latitude, longitude)` used when callers supply none.
pub const DEFAULT_CENTER: (f64, f64) = (40.7128, -74.0060);

const WKT_PREFIXES: &[&str] = &["POINT(", "LINESTRING(", "POLYGON("];
const VENDOR_PREFIX: &str = "SDO_GEOMETRY(";

// SDO gtype is DLTT: dimension, LRS measure, two-digit geometry type.
static VENDOR_GTYPE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^SDO_GEOMETRY\(\s*(\d)(\d)(\d{2})\s*,").expect("vendor gtype regex is valid")
});

/// Builds geometry text for `kind` around the given center.
///
/// Output is deterministic for equal inputs.
///
/// # Errors
/// - `NonFiniteCoordinate` / `CenterOutOfRange` for unusable centers.
pub fn generate(kind: ShapeKind, center_lat: f64, center_lng: f64) -> GeometryResult<String> {
    if !center_lat.is_finite() || !center_lng.is_finite() {
        return Err(GeometryError::NonFiniteCoordinate);
    }
    if !(-90.0..=90.0).contains(&center_lat) || !(-180.0..=180.0).contains(&center_lng) {
        return Err(GeometryError::CenterOutOfRange {
            latitude: center_lat,
            longitude: center_lng,
        });
    }

    let (x, y) = (center_lng, center_lat);
    let offset = GEOMETRY_OFFSET_DEGREES;

    match kind {
        ShapeKind::Point => Ok(format!("POINT({})", format_pair(x, y))),
        ShapeKind::LineString => Ok(format!(
            "LINESTRING({}, {})",
            format_pair(x, y),
            format_pair(x + offset, y + offset)
        )),
        ShapeKind::Polygon => build_polygon(&square_ring(x, y, offset)),
        ShapeKind::Rectangle => build_polygon(&square_ring(x, y, offset / 2.0)),
        ShapeKind::Circle => build_polygon(&circle_ring(x, y, offset)),
    }
}

/// Builds a closed `POLYGON((...))` ring from flat `x y` coordinates.
///
/// The ring is closed by repeating the first pair when the caller did not.
///
/// # Errors
/// - `InvalidCoordinateCount` when fewer than 6 values or an odd count.
/// - `NonFiniteCoordinate` when any value is NaN or infinite.
pub fn build_polygon(coords: &[f64]) -> GeometryResult<String> {
    if coords.len() < 6 || coords.len() % 2 != 0 {
        return Err(GeometryError::InvalidCoordinateCount(coords.len()));
    }
    if coords.iter().any(|value| !value.is_finite()) {
        return Err(GeometryError::NonFiniteCoordinate);
    }

    let mut pairs = coords
        .chunks_exact(2)
        .map(|pair| (pair[0], pair[1]))
        .collect::<Vec<_>>();
    if pairs.first() != pairs.last() {
        pairs.push(pairs[0]);
    }

    let ring = pairs
        .iter()
        .map(|(x, y)| format_pair(*x, *y))
        .collect::<Vec<_>>()
        .join(", ");
    Ok(format!("POLYGON(({ring}))"))
}

/// Returns whether `text` is accepted geometry text.
///
/// Accepts the three WKT literals and the vendor-extension wrapper,
/// case-insensitively after trimming. Coordinates are not interpreted.
pub fn validate(text: &str) -> bool {
    let normalized = text.trim().to_ascii_uppercase();
    if normalized.is_empty() {
        return false;
    }
    WKT_PREFIXES
        .iter()
        .chain(std::iter::once(&VENDOR_PREFIX))
        .any(|prefix| normalized.starts_with(prefix))
}

/// Classifies geometry text from its structural markers.
pub fn extract_kind_hint(text: &str) -> GeometryKindHint {
    if !validate(text) {
        return GeometryKindHint::Unknown;
    }

    let normalized = text.trim().to_ascii_uppercase();
    if normalized.starts_with(VENDOR_PREFIX) {
        return VENDOR_GTYPE
            .captures(&normalized)
            .map_or(GeometryKindHint::Unknown, |caps| match &caps[3] {
                "01" => GeometryKindHint::Point,
                "02" => GeometryKindHint::LineString,
                "03" => GeometryKindHint::Polygon,
                _ => GeometryKindHint::Unknown,
            });
    }

    if normalized.starts_with("POINT(") {
        GeometryKindHint::Point
    } else if normalized.starts_with("LINESTRING(") {
        GeometryKindHint::LineString
    } else {
        GeometryKindHint::Polygon
    }
}

/// Reads the `x y` pairs out of WKT text.
///
/// Returns `None` for vendor-extension text or malformed coordinate lists.
pub fn coordinate_pairs(text: &str) -> Option<Vec<(f64, f64)>> {
    let normalized = text.trim();
    if !validate(normalized) || normalized.to_ascii_uppercase().starts_with(VENDOR_PREFIX) {
        return None;
    }

    let open = normalized.find('(')?;
    let body = normalized[open..].trim_matches(|ch| ch == '(' || ch == ')');
    body.split(',')
        .map(|pair| {
            let mut parts = pair.split_whitespace();
            let x = parts.next()?.parse::<f64>().ok()?;
            let y = parts.next()?.parse::<f64>().ok()?;
            if parts.next().is_some() {
                return None;
            }
            Some((x, y))
        })
        .collect()
}

fn format_pair(x: f64, y: f64) -> String {
    format!("{x:.6} {y:.6}")
}

fn square_ring(x: f64, y: f64, half_width: f64) -> Vec<f64> {
    vec![
        x - half_width,
        y - half_width,
        x + half_width,
        y - half_width,
        x + half_width,
        y + half_width,
        x - half_width,
        y + half_width,
        x - half_width,
        y - half_width,
    ]
}

fn circle_ring(x: f64, y: f64, radius: f64) -> Vec<f64> {
    let step = 2.0 * PI / CIRCLE_SEGMENTS as f64;
    let mut coords = Vec::with_capacity((CIRCLE_SEGMENTS + 1) * 2);
    for index in 0..CIRCLE_SEGMENTS {
        let angle = step * index as f64;
        coords.push(x + radius * angle.cos());
        coords.push(y + radius * angle.sin());
    }
    coords.push(coords[0]);
    coords.push(coords[1]);
    coords
}

#[cfg(test)]
mod tests {
    use super::{
        build_polygon, coordinate_pairs, extract_kind_hint, generate, validate, CIRCLE_SEGMENTS,
    };
    use crate::geometry::{GeometryError, GeometryKindHint, ShapeKind};

    #[test]
    fn generated_text_validates_and_matches_kind_family() {
        let centers = [(40.0, -74.0), (0.0, 0.0), (-33.8688, 151.2093), (89.9, 179.9)];
        for (lat, lng) in centers {
            for kind in ShapeKind::ALL {
                let text = generate(kind, lat, lng).expect("generate should succeed");
                assert!(validate(&text), "{kind} output should validate: {text}");
                assert_eq!(extract_kind_hint(&text), kind.geometry_family());
            }
        }
    }

    #[test]
    fn point_is_longitude_then_latitude() {
        let text = generate(ShapeKind::Point, 40.7128, -74.006).unwrap();
        assert_eq!(text, "POINT(-74.006000 40.712800)");
    }

    #[test]
    fn line_string_offsets_second_point_on_both_axes() {
        let text = generate(ShapeKind::LineString, 10.0, 20.0).unwrap();
        assert_eq!(text, "LINESTRING(20.000000 10.000000, 20.010000 10.010000)");
    }

    #[test]
    fn polygon_and_rectangle_are_closed_five_point_squares() {
        let polygon = coordinate_pairs(&generate(ShapeKind::Polygon, 10.0, 20.0).unwrap()).unwrap();
        assert_eq!(polygon.len(), 5);
        assert_eq!(polygon.first(), polygon.last());
        assert!((polygon[0].0 - 19.99).abs() < 1e-9);
        assert!((polygon[2].1 - 10.01).abs() < 1e-9);

        let rectangle =
            coordinate_pairs(&generate(ShapeKind::Rectangle, 10.0, 20.0).unwrap()).unwrap();
        assert_eq!(rectangle.len(), 5);
        assert!((rectangle[0].0 - 19.995).abs() < 1e-9);
        assert!((rectangle[2].1 - 10.005).abs() < 1e-9);
    }

    #[test]
    fn circle_has_seventeen_pairs_and_is_closed() {
        for (lat, lng) in [(40.0, -74.0), (-12.5, 130.25), (0.0, 0.0)] {
            let text = generate(ShapeKind::Circle, lat, lng).unwrap();
            let pairs = coordinate_pairs(&text).unwrap();
            assert_eq!(pairs.len(), CIRCLE_SEGMENTS + 1);
            assert_eq!(pairs.first(), pairs.last());
            for (x, y) in &pairs {
                let radius = ((x - lng).powi(2) + (y - lat).powi(2)).sqrt();
                assert!((radius - 0.01).abs() < 1e-5);
            }
        }
    }

    #[test]
    fn build_polygon_rejects_short_and_odd_arrays() {
        assert_eq!(
            build_polygon(&[0.0, 0.0, 1.0, 1.0]).unwrap_err(),
            GeometryError::InvalidCoordinateCount(4)
        );
        assert_eq!(
            build_polygon(&[0.0, 0.0, 1.0, 0.0, 1.0, 1.0, 0.0]).unwrap_err(),
            GeometryError::InvalidCoordinateCount(7)
        );
    }

    #[test]
    fn build_polygon_closes_open_rings() {
        let text = build_polygon(&[0.0, 0.0, 1.0, 0.0, 1.0, 1.0]).unwrap();
        assert_eq!(
            text,
            "POLYGON((0.000000 0.000000, 1.000000 0.000000, 1.000000 1.000000, 0.000000 0.000000))"
        );
    }

    #[test]
    fn build_polygon_rejects_non_finite_values() {
        let err = build_polygon(&[0.0, 0.0, 1.0, f64::NAN, 1.0, 1.0]).unwrap_err();
        assert_eq!(err, GeometryError::NonFiniteCoordinate);
    }

    #[test]
    fn generate_rejects_out_of_range_center() {
        let err = generate(ShapeKind::Point, 91.0, 0.0).unwrap_err();
        assert!(matches!(err, GeometryError::CenterOutOfRange { .. }));
    }

    #[test]
    fn validate_is_case_insensitive_and_accepts_vendor_wrapper() {
        assert!(validate("point(1 2)"));
        assert!(validate("  LineString(1 2, 3 4)"));
        assert!(validate(
            "SDO_GEOMETRY(2001, 8307, SDO_POINT_TYPE(-74.0, 40.0, NULL), NULL, NULL)"
        ));
        assert!(!validate(""));
        assert!(!validate("   "));
        assert!(!validate("MULTIPOINT((1 2))"));
        assert!(!validate("POINT (1 2)"));
        assert!(!validate("{\"type\":\"Point\"}"));
    }

    #[test]
    fn vendor_gtype_drives_kind_hint() {
        assert_eq!(
            extract_kind_hint("SDO_GEOMETRY(2001, 8307, SDO_POINT_TYPE(1, 2, NULL), NULL, NULL)"),
            GeometryKindHint::Point
        );
        assert_eq!(
            extract_kind_hint("sdo_geometry(2002, 8307, NULL, SDO_ELEM_INFO_ARRAY(1,2,1), SDO_ORDINATE_ARRAY(1, 2, 3, 4))"),
            GeometryKindHint::LineString
        );
        assert_eq!(
            extract_kind_hint("SDO_GEOMETRY(3003, 8307, NULL, NULL, NULL)"),
            GeometryKindHint::Polygon
        );
        assert_eq!(
            extract_kind_hint("SDO_GEOMETRY(2005, 8307, NULL, NULL, NULL)"),
            GeometryKindHint::Unknown
        );
        assert_eq!(extract_kind_hint("garbage"), GeometryKindHint::Unknown);
    }

    #[test]
    fn coordinate_pairs_ignores_vendor_text() {
        assert!(coordinate_pairs("SDO_GEOMETRY(2001, 8307, NULL, NULL, NULL)").is_none());
        assert_eq!(
            coordinate_pairs("POINT(1.5 -2.25)").unwrap(),
            vec![(1.5, -2.25)]
        );
        assert!(coordinate_pairs("POINT(1.5)").is_none());
    }
}
