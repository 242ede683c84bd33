mod common;

use common::seed_location;
use geobook_core::spatial::extension::{register_spatial_functions, unregister_spatial_functions};
use geobook_core::{
    open_db_in_memory, DistanceQuery, SearchError, SearchTier, TieredDistanceSearch,
};
use rusqlite::Connection;
use std::collections::BTreeSet;

const KM_PER_LATITUDE_DEGREE: f64 = 111.195;

/// Seeds locations 1 km, 4 km and 10 km north of (40.0, -74.0).
fn seeded() -> Connection {
    let conn = open_db_in_memory().unwrap();
    for (name, km) in [("one", 1.0), ("four", 4.0), ("ten", 10.0)] {
        seed_location(&conn, name, 40.0 + km / KM_PER_LATITUDE_DEGREE, -74.0);
    }
    conn
}

fn names(locations: &[geobook_core::Location]) -> BTreeSet<String> {
    locations
        .iter()
        .map(|location| location.place_name.clone())
        .collect()
}

fn expected(values: &[&str]) -> BTreeSet<String> {
    values.iter().map(|value| value.to_string()).collect()
}

#[test]
fn native_tier_filters_by_radius() {
    let conn = seeded();
    register_spatial_functions(&conn).unwrap();

    let outcome = TieredDistanceSearch::new()
        .search(&conn, &DistanceQuery::new(40.0, -74.0, 5.0))
        .unwrap();

    assert_eq!(outcome.tier, SearchTier::NativeSpatial);
    assert!(!outcome.degraded);
    assert!(outcome.warning().is_none());
    assert_eq!(names(&outcome.locations), expected(&["one", "four"]));
}

#[test]
fn great_circle_tier_matches_native_tier() {
    let conn = seeded();

    let outcome = TieredDistanceSearch::new()
        .search(&conn, &DistanceQuery::new(40.0, -74.0, 5.0))
        .unwrap();

    assert_eq!(outcome.tier, SearchTier::GreatCircle);
    assert!(!outcome.degraded);
    assert_eq!(names(&outcome.locations), expected(&["one", "four"]));
}

#[test]
fn removing_spatial_functions_falls_back_between_calls() {
    let conn = seeded();
    register_spatial_functions(&conn).unwrap();
    let query = DistanceQuery::new(40.0, -74.0, 5.0);
    let search = TieredDistanceSearch::new();

    let first = search.search(&conn, &query).unwrap();
    assert_eq!(first.tier, SearchTier::NativeSpatial);

    unregister_spatial_functions(&conn).unwrap();
    let second = search.search(&conn, &query).unwrap();
    assert_eq!(second.tier, SearchTier::GreatCircle);
}

#[test]
fn zero_radius_matches_only_the_center() {
    let conn = seeded();
    seed_location(&conn, "center", 40.0, -74.0);

    let outcome = TieredDistanceSearch::new()
        .search(&conn, &DistanceQuery::new(40.0, -74.0, 0.0))
        .unwrap();
    assert_eq!(names(&outcome.locations), expected(&["center"]));
}

#[test]
fn zero_radius_tiers_agree_on_the_center() {
    let conn = seeded();
    seed_location(&conn, "center", 40.0, -74.0);
    let query = DistanceQuery::new(40.0, -74.0, 0.0);
    let search = TieredDistanceSearch::new();

    let scanned = search.search(&conn, &query).unwrap();
    register_spatial_functions(&conn).unwrap();
    let native = search.search(&conn, &query).unwrap();

    assert_eq!(scanned.tier, SearchTier::GreatCircle);
    assert_eq!(native.tier, SearchTier::NativeSpatial);
    assert_eq!(names(&scanned.locations), names(&native.locations));
}

#[test]
fn rows_with_invalid_geometry_are_rejected_like_repository_reads() {
    let conn = seeded();
    conn.execute(
        "INSERT INTO locations (latitude, longitude, place_name, geometry_text)
         VALUES (40.0, -74.0, 'scribble', 'CIRCLE(1 2)');",
        [],
    )
    .unwrap();

    let err = TieredDistanceSearch::new()
        .search(&conn, &DistanceQuery::new(40.0, -74.0, 5.0))
        .unwrap_err();
    assert!(matches!(err, SearchError::InvalidData(_)));
}

/// A legacy row with an impossible latitude breaks both filtered tiers.
fn with_corrupt_row() -> Connection {
    let conn = seeded();
    register_spatial_functions(&conn).unwrap();
    conn.execute(
        "INSERT INTO locations (latitude, longitude, place_name) VALUES (95.0, 0.0, 'legacy');",
        [],
    )
    .unwrap();
    conn
}

#[test]
fn both_filtered_tiers_failing_returns_every_location_flagged() {
    let conn = with_corrupt_row();

    let outcome = TieredDistanceSearch::new()
        .search(&conn, &DistanceQuery::new(40.0, -74.0, 5.0))
        .unwrap();

    assert_eq!(outcome.tier, SearchTier::Unfiltered);
    assert!(outcome.degraded);
    assert!(outcome.warning().is_some());
    assert_eq!(
        names(&outcome.locations),
        expected(&["one", "four", "ten", "legacy"])
    );
}

#[test]
fn strict_mode_reports_degradation_as_error() {
    let conn = with_corrupt_row();

    let err = TieredDistanceSearch::new()
        .strict(true)
        .search(&conn, &DistanceQuery::new(40.0, -74.0, 5.0))
        .unwrap_err();
    assert!(matches!(err, SearchError::Degraded(_)));
}

#[test]
fn invalid_query_fails_before_any_tier() {
    let conn = seeded();
    let search = TieredDistanceSearch::new();

    for query in [
        DistanceQuery::new(f64::NAN, -74.0, 5.0),
        DistanceQuery::new(40.0, 200.0, 5.0),
        DistanceQuery::new(40.0, -74.0, -1.0),
    ] {
        let err = search.search(&conn, &query).unwrap_err();
        assert!(matches!(err, SearchError::InvalidQuery { .. }));
    }
}

#[test]
fn unfiltered_read_failure_is_a_storage_error() {
    let conn = with_corrupt_row();
    conn.execute_batch("DROP TABLE locations;").unwrap();

    let err = TieredDistanceSearch::new()
        .search(&conn, &DistanceQuery::new(40.0, -74.0, 5.0))
        .unwrap_err();
    assert!(matches!(err, SearchError::Db(_)));
}
