#![allow(dead_code)]

use geobook_core::model::media::NewMediaAsset;
use geobook_core::repo::location_repo::{LocationRepository, SqliteLocationRepository};
use geobook_core::repo::media_repo::{MediaRepository, SqliteMediaRepository};
use geobook_core::NewLocation;
use image::{ImageFormat, Rgb, RgbImage};
use rusqlite::Connection;
use std::io::Cursor;

pub fn seed_location(conn: &Connection, name: &str, latitude: f64, longitude: f64) -> i64 {
    SqliteLocationRepository::new(conn)
        .create_location(&NewLocation::new(name, latitude, longitude))
        .unwrap()
}

/// Inserts a metadata row with no stored content yet.
pub fn seed_asset(conn: &Connection, mime_type: &str) -> i64 {
    let location_id = seed_location(conn, "Harbor", 40.0, -74.0);
    SqliteMediaRepository::new(conn)
        .create_media(&NewMediaAsset {
            location_id,
            mime_type: mime_type.to_string(),
            file_path: "unused.bin".to_string(),
            description: None,
        })
        .unwrap()
}

pub fn encode(image: &RgbImage, format: ImageFormat) -> Vec<u8> {
    let mut bytes = Cursor::new(Vec::new());
    image.write_to(&mut bytes, format).unwrap();
    bytes.into_inner()
}

pub fn solid_png(width: u32, height: u32, color: [u8; 3]) -> Vec<u8> {
    encode(&RgbImage::from_pixel(width, height, Rgb(color)), ImageFormat::Png)
}

/// PNG whose pixels all differ, so any rotation is observable.
pub fn gradient_png(width: u32, height: u32) -> Vec<u8> {
    let image = RgbImage::from_fn(width, height, |x, y| {
        Rgb([(x * 17 % 256) as u8, (y * 29 % 256) as u8, ((x + y) * 7 % 256) as u8])
    });
    encode(&image, ImageFormat::Png)
}

pub fn outcome_tag(conn: &Connection, asset_id: i64) -> String {
    conn.query_row(
        "SELECT storage_outcome FROM media_assets WHERE id = ?1;",
        [asset_id],
        |row| row.get(0),
    )
    .unwrap()
}

pub fn blob_column(conn: &Connection, asset_id: i64) -> Option<Vec<u8>> {
    conn.query_row(
        "SELECT blob_content FROM media_assets WHERE id = ?1;",
        [asset_id],
        |row| row.get(0),
    )
    .unwrap()
}

/// Native content for the asset; `None` when the table or row is absent.
pub fn native_content(conn: &Connection, asset_id: i64) -> Option<Vec<u8>> {
    conn.query_row(
        "SELECT content FROM media_native_objects WHERE asset_id = ?1;",
        [asset_id],
        |row| row.get::<_, Option<Vec<u8>>>(0),
    )
    .ok()
    .flatten()
}
