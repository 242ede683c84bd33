//! Optional SQL spatial functions backing the native "within distance" tier.
//!
//! The functions are registered per connection and may be absent; queries
//! that reference them then fail and the search falls back.

use crate::spatial::distance::{haversine_km, Coordinate};
use log::info;
use rusqlite::functions::{Context, FunctionFlags};
use rusqlite::Connection;

/// `geo_distance_km(lat1, lng1, lat2, lng2) -> REAL`
pub const DISTANCE_FUNCTION: &str = "geo_distance_km";
/// `geo_within_distance(lat1, lng1, lat2, lng2, radius_km) -> 0|1`
pub const WITHIN_DISTANCE_FUNCTION: &str = "geo_within_distance";

/// Registers the spatial functions on `conn`.
pub fn register_spatial_functions(conn: &Connection) -> rusqlite::Result<()> {
    let flags = FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC;

    conn.create_scalar_function(DISTANCE_FUNCTION, 4, flags, |ctx| {
        let (from, to) = coordinate_args(ctx)?;
        Ok(haversine_km(from, to))
    })?;
    conn.create_scalar_function(WITHIN_DISTANCE_FUNCTION, 5, flags, |ctx| {
        let (from, to) = coordinate_args(ctx)?;
        let radius_km: f64 = ctx.get(4)?;
        Ok(haversine_km(from, to) <= radius_km)
    })?;

    info!("event=spatial_functions module=spatial status=registered");
    Ok(())
}

/// Removes the spatial functions from `conn`.
pub fn unregister_spatial_functions(conn: &Connection) -> rusqlite::Result<()> {
    conn.remove_function(DISTANCE_FUNCTION, 4)?;
    conn.remove_function(WITHIN_DISTANCE_FUNCTION, 5)?;
    info!("event=spatial_functions module=spatial status=removed");
    Ok(())
}

fn coordinate_args(ctx: &Context<'_>) -> rusqlite::Result<(Coordinate, Coordinate)> {
    let from = Coordinate::new(ctx.get(0)?, ctx.get(1)?)
        .map_err(|err| rusqlite::Error::UserFunctionError(Box::new(err)))?;
    let to = Coordinate::new(ctx.get(2)?, ctx.get(3)?)
        .map_err(|err| rusqlite::Error::UserFunctionError(Box::new(err)))?;
    Ok((from, to))
}

#[cfg(test)]
mod tests {
    use super::{register_spatial_functions, unregister_spatial_functions};
    use rusqlite::Connection;

    #[test]
    fn registered_functions_compute_distance() {
        let conn = Connection::open_in_memory().unwrap();
        register_spatial_functions(&conn).unwrap();

        let distance: f64 = conn
            .query_row("SELECT geo_distance_km(0.0, 0.0, 1.0, 0.0);", [], |row| {
                row.get(0)
            })
            .unwrap();
        assert!((distance - 111.195).abs() < 0.01);

        let within: bool = conn
            .query_row(
                "SELECT geo_within_distance(0.0, 0.0, 1.0, 0.0, 100.0);",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert!(!within);
    }

    #[test]
    fn out_of_range_arguments_raise_sql_errors() {
        let conn = Connection::open_in_memory().unwrap();
        register_spatial_functions(&conn).unwrap();

        let result = conn.query_row(
            "SELECT geo_distance_km(95.0, 0.0, 1.0, 0.0);",
            [],
            |row| row.get::<_, f64>(0),
        );
        assert!(result.is_err());
    }

    #[test]
    fn unregistered_functions_are_unknown_to_sql() {
        let conn = Connection::open_in_memory().unwrap();
        register_spatial_functions(&conn).unwrap();
        unregister_spatial_functions(&conn).unwrap();

        let result = conn.prepare("SELECT geo_distance_km(0.0, 0.0, 1.0, 0.0);");
        assert!(result.is_err());
    }
}
