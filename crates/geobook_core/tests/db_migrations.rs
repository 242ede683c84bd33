use geobook_core::config::StorageConfig;
use geobook_core::db::migrations::latest_version;
use geobook_core::db::{open_configured_db, open_db, open_db_in_memory, DbError};
use geobook_core::CapabilityProbe;
use rusqlite::Connection;

#[test]
fn open_db_in_memory_applies_all_migrations() {
    let conn = open_db_in_memory().unwrap();

    assert_eq!(schema_version(&conn), latest_version());
    for table in ["chapters", "locations", "spatial_entities", "media_assets"] {
        assert!(table_exists(&conn, table), "table {table} does not exist");
    }
    assert!(!table_exists(&conn, "media_native_objects"));
}

#[test]
fn opening_same_database_twice_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("geobook.db");

    let conn_first = open_db(&path).unwrap();
    assert_eq!(schema_version(&conn_first), latest_version());
    drop(conn_first);

    let conn_second = open_db(&path).unwrap();
    assert_eq!(schema_version(&conn_second), latest_version());
    assert!(table_exists(&conn_second, "locations"));
}

#[test]
fn opening_database_with_newer_schema_version_returns_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("future.db");

    let conn = Connection::open(&path).unwrap();
    conn.execute_batch("PRAGMA user_version = 999;").unwrap();
    drop(conn);

    let err = open_db(&path).unwrap_err();
    match err {
        DbError::UnsupportedSchemaVersion {
            db_version,
            latest_supported,
        } => {
            assert_eq!(db_version, 999);
            assert_eq!(latest_supported, latest_version());
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn configured_open_installs_enabled_extensions_only() {
    let dir = tempfile::tempdir().unwrap();
    let probe = CapabilityProbe::sqlite();

    let full = open_configured_db(&StorageConfig {
        database_path: dir.path().join("full.db"),
        native_objects: true,
        spatial_functions: true,
    })
    .unwrap();
    assert!(probe.is_available(&full));
    let distance: f64 = full
        .query_row("SELECT geo_distance_km(0.0, 0.0, 0.0, 1.0);", [], |row| {
            row.get(0)
        })
        .unwrap();
    assert!((distance - 111.19).abs() < 0.1);

    let bare = open_configured_db(&StorageConfig {
        database_path: dir.path().join("bare.db"),
        native_objects: false,
        spatial_functions: false,
    })
    .unwrap();
    assert!(!probe.is_available(&bare));
    assert!(bare
        .query_row("SELECT geo_distance_km(0.0, 0.0, 0.0, 1.0);", [], |row| {
            row.get::<_, f64>(0)
        })
        .is_err());
}

#[test]
fn media_assets_reject_unknown_storage_outcome() {
    let conn = open_db_in_memory().unwrap();
    conn.execute(
        "INSERT INTO locations (latitude, longitude, place_name) VALUES (0.0, 0.0, 'Origin');",
        [],
    )
    .unwrap();

    let result = conn.execute(
        "INSERT INTO media_assets (location_id, mime_type, file_path, storage_outcome)
         VALUES (1, 'image/png', 'a.png', 'cloud');",
        [],
    );
    assert!(result.is_err());
}

fn schema_version(conn: &Connection) -> u32 {
    conn.query_row("PRAGMA user_version;", [], |row| row.get(0))
        .unwrap()
}

fn table_exists(conn: &Connection, table_name: &str) -> bool {
    conn.query_row(
        "SELECT EXISTS(
            SELECT 1
            FROM sqlite_master
            WHERE type = 'table' AND name = ?1
        );",
        [table_name],
        |row| row.get(0),
    )
    .unwrap()
}
