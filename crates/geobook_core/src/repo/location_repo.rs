//! Location repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Create and read location rows for map and search use-cases.
//! - Keep location geometry text in sync with validated input.
//!
//! # Invariants
//! - Write paths validate coordinates and geometry before SQL mutations.
//! - Read paths reject invalid persisted geometry instead of masking it.

use crate::geometry::{self, ShapeKind};
use crate::model::location::{validate_optional_geometry, Location, NewLocation};
use crate::model::LocationId;
use crate::repo::{RepoError, RepoResult};
use log::debug;
use rusqlite::{params, Connection, OptionalExtension, Row};

pub(crate) const LOCATION_SELECT_SQL: &str = "SELECT
    id,
    chapter_id,
    latitude,
    longitude,
    place_name,
    geometry_text
FROM locations";

/// Repository interface for location operations.
pub trait LocationRepository {
    fn create_location(&self, location: &NewLocation) -> RepoResult<LocationId>;
    fn get_location(&self, id: LocationId) -> RepoResult<Option<Location>>;
    fn list_locations(&self) -> RepoResult<Vec<Location>>;
    /// Replaces (or clears) the stored geometry text.
    fn set_geometry(&self, id: LocationId, geometry_text: Option<&str>) -> RepoResult<()>;
    /// Derives point geometry from the row's own coordinates and stores it.
    fn sync_point_geometry(&self, id: LocationId) -> RepoResult<String>;
}

/// SQLite-backed location repository.
pub struct SqliteLocationRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteLocationRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl LocationRepository for SqliteLocationRepository<'_> {
    fn create_location(&self, location: &NewLocation) -> RepoResult<LocationId> {
        location.validate()?;

        self.conn.execute(
            "INSERT INTO locations (
                chapter_id,
                latitude,
                longitude,
                place_name,
                geometry_text
            ) VALUES (?1, ?2, ?3, ?4, ?5);",
            params![
                location.chapter_id,
                location.latitude,
                location.longitude,
                location.place_name.as_str(),
                location.geometry_text.as_deref(),
            ],
        )?;

        let id = self.conn.last_insert_rowid();
        debug!("event=location_create module=repo status=ok location_id={id}");
        Ok(id)
    }

    fn get_location(&self, id: LocationId) -> RepoResult<Option<Location>> {
        let location = self
            .conn
            .query_row(
                &format!("{LOCATION_SELECT_SQL} WHERE id = ?1;"),
                [id],
                parse_location_row,
            )
            .optional()?;

        match location {
            Some(location) => Ok(Some(checked(location)?)),
            None => Ok(None),
        }
    }

    fn list_locations(&self) -> RepoResult<Vec<Location>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{LOCATION_SELECT_SQL} ORDER BY id ASC;"))?;
        let rows = stmt.query_map([], parse_location_row)?;

        let mut locations = Vec::new();
        for location in rows {
            locations.push(checked(location?)?);
        }
        Ok(locations)
    }

    fn set_geometry(&self, id: LocationId, geometry_text: Option<&str>) -> RepoResult<()> {
        validate_optional_geometry(geometry_text)?;

        let changed = self.conn.execute(
            "UPDATE locations SET geometry_text = ?2 WHERE id = ?1;",
            params![id, geometry_text],
        )?;
        if changed == 0 {
            return Err(RepoError::NotFound {
                entity: "location",
                id,
            });
        }
        Ok(())
    }

    fn sync_point_geometry(&self, id: LocationId) -> RepoResult<String> {
        let location = self.get_location(id)?.ok_or(RepoError::NotFound {
            entity: "location",
            id,
        })?;
        let text = geometry::generate(ShapeKind::Point, location.latitude, location.longitude)?;
        self.set_geometry(id, Some(&text))?;
        Ok(text)
    }
}

/// Maps one `LOCATION_SELECT_SQL` row without semantic checks.
pub(crate) fn parse_location_row(row: &Row<'_>) -> rusqlite::Result<Location> {
    Ok(Location {
        id: row.get("id")?,
        chapter_id: row.get("chapter_id")?,
        latitude: row.get("latitude")?,
        longitude: row.get("longitude")?,
        place_name: row.get("place_name")?,
        geometry_text: row.get("geometry_text")?,
    })
}

/// Rejects rows whose geometry text fails validation.
pub(crate) fn checked(location: Location) -> RepoResult<Location> {
    if let Some(text) = location.geometry_text.as_deref() {
        if !geometry::validate(text) {
            return Err(RepoError::InvalidData(format!(
                "invalid geometry text in locations.geometry_text for id {}",
                location.id
            )));
        }
    }
    Ok(location)
}
