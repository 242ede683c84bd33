//! Tiered distance search.
//!
//! # Responsibility
//! - Answer "locations within `radius_km` of a center" for map queries.
//! - Fall back from the SQL spatial predicate, to an in-process
//!   great-circle scan, to the unfiltered location set.
//!
//! # Invariants
//! - Input validation fails fast and is never retried.
//! - Tier failures are contained here; only the final tier is observable.
//! - Unfiltered results always carry `degraded = true`.
//! - Result order is unspecified.
//! - Rows with invalid geometry text are rejected, as repository reads do.

use crate::db::DbError;
use crate::model::location::Location;
use crate::repo::location_repo::{checked, parse_location_row, LOCATION_SELECT_SQL};
use crate::spatial::distance::{great_circle_km, Coordinate, DISTANCE_EPSILON_KM};
use crate::spatial::extension::WITHIN_DISTANCE_FUNCTION;
use log::{info, warn};
use rusqlite::{params, Connection};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Instant;

/// Result type for search APIs.
pub type SearchResult<T> = Result<T, SearchError>;

/// Search-layer error for query validation, DB interaction and decoding.
#[derive(Debug)]
pub enum SearchError {
    /// Center or radius cannot be searched.
    InvalidQuery { message: String },
    /// Only the unfiltered tier could answer and strict mode is on.
    Degraded(DegradedResultWarning),
    Db(DbError),
    InvalidData(String),
}

impl Display for SearchError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidQuery { message } => write!(f, "invalid distance query: {message}"),
            Self::Degraded(warning) => write!(f, "{warning}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::InvalidData(message) => write!(f, "invalid location row: {message}"),
        }
    }
}

impl Error for SearchError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DbError> for SearchError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for SearchError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Center point plus radius, in degrees and kilometers.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DistanceQuery {
    pub latitude: f64,
    pub longitude: f64,
    pub radius_km: f64,
}

impl DistanceQuery {
    pub fn new(latitude: f64, longitude: f64, radius_km: f64) -> Self {
        Self {
            latitude,
            longitude,
            radius_km,
        }
    }

    fn center(&self) -> SearchResult<Coordinate> {
        if !self.radius_km.is_finite() || self.radius_km < 0.0 {
            return Err(SearchError::InvalidQuery {
                message: format!(
                    "radius must be a finite non-negative number, got {}",
                    self.radius_km
                ),
            });
        }
        Coordinate::new(self.latitude, self.longitude).map_err(|err| SearchError::InvalidQuery {
            message: err.to_string(),
        })
    }
}

/// Strategy that produced a search result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchTier {
    /// SQL spatial predicate.
    NativeSpatial,
    /// In-process great-circle filter over every row.
    GreatCircle,
    /// Every location, without distance filtering.
    Unfiltered,
}

impl SearchTier {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NativeSpatial => "native_spatial",
            Self::GreatCircle => "great_circle",
            Self::Unfiltered => "unfiltered",
        }
    }
}

/// Marks a result that was not distance-filtered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DegradedResultWarning {
    pub reason: String,
}

impl Display for DegradedResultWarning {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "distance filtering unavailable, returning all locations: {}",
            self.reason
        )
    }
}

/// Search result plus how it was obtained.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchOutcome {
    pub locations: Vec<Location>,
    pub degraded: bool,
    pub tier: SearchTier,
    degraded_reason: Option<String>,
}

impl SearchOutcome {
    /// Returns the degradation warning for unfiltered results.
    pub fn warning(&self) -> Option<DegradedResultWarning> {
        if !self.degraded {
            return None;
        }
        Some(DegradedResultWarning {
            reason: self
                .degraded_reason
                .clone()
                .unwrap_or_else(|| "unknown".to_string()),
        })
    }
}

/// Distance search with graceful degradation.
#[derive(Debug, Clone, Default)]
pub struct TieredDistanceSearch {
    strict_degraded: bool,
}

impl TieredDistanceSearch {
    pub fn new() -> Self {
        Self::default()
    }

    /// When set, an unfiltered fallback is reported as `SearchError::Degraded`.
    pub fn strict(mut self, strict_degraded: bool) -> Self {
        self.strict_degraded = strict_degraded;
        self
    }

    /// Finds locations within `query.radius_km` of the query center.
    ///
    /// # Errors
    /// - `InvalidQuery` for unusable centers or radii.
    /// - `Degraded` when strict mode is on and only the unfiltered tier answered.
    /// - `Db` when even the unfiltered read fails.
    pub fn search(&self, conn: &Connection, query: &DistanceQuery) -> SearchResult<SearchOutcome> {
        query.center()?;
        let started_at = Instant::now();

        let native_err = match native_within_distance(conn, query) {
            Ok(locations) => {
                return Ok(self.finish(started_at, SearchTier::NativeSpatial, locations, None));
            }
            Err(err) => err,
        };
        warn!(
            "event=distance_search module=spatial status=fallback from=native_spatial to=great_circle error={}",
            native_err
        );

        let scan_err = match great_circle_scan(conn, query) {
            Ok(locations) => {
                return Ok(self.finish(started_at, SearchTier::GreatCircle, locations, None));
            }
            Err(err) => err,
        };
        warn!(
            "event=distance_search module=spatial status=fallback from=great_circle to=unfiltered error={}",
            scan_err
        );

        let reason = format!(
            "spatial predicate failed ({native_err}); great-circle scan failed ({scan_err})"
        );
        if self.strict_degraded {
            return Err(SearchError::Degraded(DegradedResultWarning { reason }));
        }

        let locations = all_locations(conn)?;
        Ok(self.finish(started_at, SearchTier::Unfiltered, locations, Some(reason)))
    }

    fn finish(
        &self,
        started_at: Instant,
        tier: SearchTier,
        locations: Vec<Location>,
        degraded_reason: Option<String>,
    ) -> SearchOutcome {
        info!(
            "event=distance_search module=spatial status=ok tier={} hits={} duration_ms={}",
            tier.as_str(),
            locations.len(),
            started_at.elapsed().as_millis()
        );
        SearchOutcome {
            locations,
            degraded: degraded_reason.is_some(),
            tier,
            degraded_reason,
        }
    }
}

/// First tier: SQL spatial predicate. Fails when the extension is absent.
pub fn native_within_distance(
    conn: &Connection,
    query: &DistanceQuery,
) -> SearchResult<Vec<Location>> {
    query.center()?;
    let mut stmt = conn.prepare(&format!(
        "{LOCATION_SELECT_SQL}
         WHERE {WITHIN_DISTANCE_FUNCTION}(latitude, longitude, ?1, ?2, ?3) = 1;"
    ))?;
    let rows = stmt.query_map(
        params![query.latitude, query.longitude, query.radius_km],
        parse_location_row,
    )?;

    let mut locations = Vec::new();
    for location in rows {
        locations.push(checked_row(location?)?);
    }
    Ok(locations)
}

/// Second tier: great-circle distance evaluated for every stored row.
pub fn great_circle_scan(conn: &Connection, query: &DistanceQuery) -> SearchResult<Vec<Location>> {
    let center = query.center()?;
    let mut matches = Vec::new();

    for location in all_locations(conn)? {
        let point = Coordinate::new(location.latitude, location.longitude).map_err(|err| {
            SearchError::InvalidData(format!("location {}: {err}", location.id))
        })?;
        if great_circle_km(center, point) <= query.radius_km + DISTANCE_EPSILON_KM {
            matches.push(location);
        }
    }
    Ok(matches)
}

fn all_locations(conn: &Connection) -> SearchResult<Vec<Location>> {
    let mut stmt = conn.prepare(&format!("{LOCATION_SELECT_SQL};"))?;
    let rows = stmt.query_map([], parse_location_row)?;

    let mut locations = Vec::new();
    for location in rows {
        locations.push(checked_row(location?)?);
    }
    Ok(locations)
}

// Same geometry check the location repository applies on reads.
fn checked_row(location: Location) -> SearchResult<Location> {
    checked(location).map_err(|err| SearchError::InvalidData(err.to_string()))
}
