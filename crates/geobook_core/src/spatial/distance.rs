//! Great-circle distance on a spherical earth.

use std::error::Error;
use std::fmt::{Display, Formatter};

/// Mean earth radius in kilometers.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Slack for in-process radius comparisons. The cosine formula loses
/// precision at short range and can overshoot by up to about 0.1 m.
pub const DISTANCE_EPSILON_KM: f64 = 1e-3;

/// Validated latitude/longitude pair in degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coordinate {
    latitude: f64,
    longitude: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CoordinateError {
    NonFinite,
    OutOfRange { latitude: f64, longitude: f64 },
}

impl Display for CoordinateError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NonFinite => write!(f, "coordinate must be finite"),
            Self::OutOfRange {
                latitude,
                longitude,
            } => write!(f, "coordinate ({latitude}, {longitude}) is out of range"),
        }
    }
}

impl Error for CoordinateError {}

impl Coordinate {
    pub fn new(latitude: f64, longitude: f64) -> Result<Self, CoordinateError> {
        if !latitude.is_finite() || !longitude.is_finite() {
            return Err(CoordinateError::NonFinite);
        }
        if !(-90.0..=90.0).contains(&latitude) || !(-180.0..=180.0).contains(&longitude) {
            return Err(CoordinateError::OutOfRange {
                latitude,
                longitude,
            });
        }
        Ok(Self {
            latitude,
            longitude,
        })
    }

    pub fn latitude(self) -> f64 {
        self.latitude
    }

    pub fn longitude(self) -> f64 {
        self.longitude
    }
}

/// Spherical law of cosines distance in kilometers.
///
/// `d = R * acos(cos(lat1)cos(lat2)cos(lng2 - lng1) + sin(lat1)sin(lat2))`
/// Identical coordinates are exactly zero apart.
pub fn great_circle_km(from: Coordinate, to: Coordinate) -> f64 {
    if from == to {
        return 0.0;
    }
    let lat1 = from.latitude.to_radians();
    let lat2 = to.latitude.to_radians();
    let delta_lng = (to.longitude - from.longitude).to_radians();

    let cosine = lat1.cos() * lat2.cos() * delta_lng.cos() + lat1.sin() * lat2.sin();
    // Rounding can push near-identical points just past 1.0.
    EARTH_RADIUS_KM * cosine.clamp(-1.0, 1.0).acos()
}

/// Haversine distance in kilometers. Numerically stable for short ranges.
pub fn haversine_km(from: Coordinate, to: Coordinate) -> f64 {
    let lat1 = from.latitude.to_radians();
    let lat2 = to.latitude.to_radians();
    let delta_lat = lat2 - lat1;
    let delta_lng = (to.longitude - from.longitude).to_radians();

    let a = (delta_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (delta_lng / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * a.sqrt().min(1.0).asin()
}
