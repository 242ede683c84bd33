mod common;

use common::{encode, gradient_png, seed_location};
use geobook_core::config::MediaConfig;
use geobook_core::geometry::{self, GeometryKindHint};
use geobook_core::repo::media_repo::{MediaRepository, SqliteMediaRepository};
use geobook_core::repo::spatial_entity_repo::SqliteSpatialEntityRepository;
use geobook_core::storage::native::install_native_objects;
use geobook_core::{
    open_db_in_memory, AssetStore, CreateEntityRequest, MediaError, MediaService, RepoError,
    ShapeKind, SpatialEntityService, StorageOutcome, UploadRequest,
};
use image::{ImageFormat, Rgb, RgbImage};
use std::path::Path;

fn media_service(root: &Path) -> MediaService {
    MediaService::new(
        AssetStore::default(),
        &MediaConfig {
            media_root: root.to_path_buf(),
            thumbnail_max_width: 200,
            thumbnail_max_height: 200,
        },
    )
}

#[test]
fn upload_keeps_disk_copy_row_content_and_thumbnail() {
    let dir = tempfile::tempdir().unwrap();
    let mut conn = open_db_in_memory().unwrap();
    install_native_objects(&conn).unwrap();
    let location_id = seed_location(&conn, "Lighthouse", 41.0, -71.0);
    let bytes = encode(
        &RgbImage::from_pixel(400, 100, Rgb([10, 200, 30])),
        ImageFormat::Png,
    );
    let service = media_service(dir.path());

    let receipt = service
        .upload(
            &mut conn,
            &UploadRequest {
                location_id,
                file_name: "../beacon shot.png",
                mime_type: "image/png",
                bytes: &bytes,
                description: Some("night view"),
            },
        )
        .unwrap();

    assert_eq!(receipt.outcome, StorageOutcome::NativeObject);
    assert!(receipt.file_path.starts_with(dir.path().join("images")));
    assert!(receipt
        .file_path
        .to_string_lossy()
        .ends_with("_beacon_shot.png"));
    assert_eq!(std::fs::read(&receipt.file_path).unwrap(), bytes);

    let thumbnail_path = receipt.thumbnail_path.unwrap();
    assert!(thumbnail_path.starts_with(dir.path().join("thumbnails")));
    let thumbnail = image::open(&thumbnail_path).unwrap();
    assert_eq!((thumbnail.width(), thumbnail.height()), (200, 50));

    let asset = SqliteMediaRepository::new(&conn)
        .get_media(receipt.asset_id)
        .unwrap()
        .unwrap();
    assert_eq!(asset.storage_outcome, StorageOutcome::NativeObject);
    assert_eq!(asset.description.as_deref(), Some("night view"));
    assert_eq!(
        asset.thumbnail_path.as_deref(),
        Some(thumbnail_path.to_string_lossy().as_ref())
    );
    assert_eq!(service.read(&conn, receipt.asset_id).unwrap().bytes, bytes);
}

#[test]
fn upload_to_unknown_location_fails_before_writing() {
    let dir = tempfile::tempdir().unwrap();
    let mut conn = open_db_in_memory().unwrap();

    let err = media_service(dir.path())
        .upload(
            &mut conn,
            &UploadRequest {
                location_id: 77,
                file_name: "a.png",
                mime_type: "image/png",
                bytes: b"abc",
                description: None,
            },
        )
        .unwrap_err();

    assert!(matches!(err, MediaError::Repo(RepoError::NotFound { .. })));
    assert!(!dir.path().join("images").exists());
}

#[test]
fn failed_persist_leaves_filesystem_only_and_read_uses_disk_copy() {
    let dir = tempfile::tempdir().unwrap();
    let mut conn = open_db_in_memory().unwrap();
    let location_id = seed_location(&conn, "Mill", 10.0, 10.0);
    conn.execute_batch(
        "CREATE TRIGGER blob_offline BEFORE UPDATE OF blob_content ON media_assets
         WHEN NEW.blob_content IS NOT NULL
         BEGIN
             SELECT RAISE(ABORT, 'blob path offline');
         END;",
    )
    .unwrap();
    let service = media_service(dir.path());

    let receipt = service
        .upload(
            &mut conn,
            &UploadRequest {
                location_id,
                file_name: "notes.txt",
                mime_type: "text/plain",
                bytes: b"field notes",
                description: None,
            },
        )
        .unwrap();

    assert_eq!(receipt.outcome, StorageOutcome::FilesystemOnly);
    assert_eq!(receipt.thumbnail_path, None);
    let content = service.read(&conn, receipt.asset_id).unwrap();
    assert_eq!(content.bytes, b"field notes".to_vec());
    assert_eq!(content.source, StorageOutcome::FilesystemOnly);
}

#[test]
fn service_rotation_refreshes_disk_copy() {
    let dir = tempfile::tempdir().unwrap();
    let mut conn = open_db_in_memory().unwrap();
    let location_id = seed_location(&conn, "Bridge", 0.0, 0.0);
    let service = media_service(dir.path());
    let receipt = service
        .upload(
            &mut conn,
            &UploadRequest {
                location_id,
                file_name: "bridge.png",
                mime_type: "image/png",
                bytes: &gradient_png(6, 2),
                description: None,
            },
        )
        .unwrap();
    assert_eq!(receipt.outcome, StorageOutcome::Blob);

    let rotated = service.rotate(&mut conn, receipt.asset_id, 90).unwrap();

    assert_eq!((rotated.width, rotated.height), (2, 6));
    assert_eq!(std::fs::read(&receipt.file_path).unwrap(), rotated.bytes);
    let thumbnail = image::open(receipt.thumbnail_path.unwrap()).unwrap();
    assert_eq!((thumbnail.width(), thumbnail.height()), (2, 6));
}

#[test]
fn upper_case_image_mime_still_gets_a_thumbnail() {
    let dir = tempfile::tempdir().unwrap();
    let mut conn = open_db_in_memory().unwrap();
    let location_id = seed_location(&conn, "Quay", 5.0, 5.0);

    let receipt = media_service(dir.path())
        .upload(
            &mut conn,
            &UploadRequest {
                location_id,
                file_name: "quay.png",
                mime_type: "IMAGE/PNG",
                bytes: &gradient_png(4, 4),
                description: None,
            },
        )
        .unwrap();

    assert!(receipt.thumbnail_path.is_some());
    let asset = SqliteMediaRepository::new(&conn)
        .get_media(receipt.asset_id)
        .unwrap()
        .unwrap();
    assert_eq!(asset.mime_type, "image/png");
}

#[test]
fn rotating_a_gif_moves_the_disk_copy_to_png() {
    let dir = tempfile::tempdir().unwrap();
    let mut conn = open_db_in_memory().unwrap();
    let location_id = seed_location(&conn, "Tower", 1.0, 1.0);
    let service = media_service(dir.path());
    let gif = encode(
        &RgbImage::from_pixel(4, 2, Rgb([200, 100, 50])),
        ImageFormat::Gif,
    );
    let receipt = service
        .upload(
            &mut conn,
            &UploadRequest {
                location_id,
                file_name: "tower.gif",
                mime_type: "image/gif",
                bytes: &gif,
                description: None,
            },
        )
        .unwrap();

    let rotated = service.rotate(&mut conn, receipt.asset_id, 90).unwrap();

    assert_eq!(rotated.mime_type, "image/png");
    let asset = SqliteMediaRepository::new(&conn)
        .get_media(receipt.asset_id)
        .unwrap()
        .unwrap();
    assert_eq!(asset.mime_type, "image/png");
    assert!(asset.file_path.ends_with("_tower.png"));
    assert_eq!(std::fs::read(&asset.file_path).unwrap(), rotated.bytes);
    assert!(!receipt.file_path.exists());
}

#[test]
fn entity_without_geometry_is_generated_at_default_center() {
    let conn = open_db_in_memory().unwrap();
    let service = SpatialEntityService::new(SqliteSpatialEntityRepository::new(&conn));

    let entity = service
        .create_entity(&CreateEntityRequest::new("  Old Town  ", ShapeKind::Circle))
        .unwrap();

    assert!(entity.id.is_some());
    assert_eq!(entity.name(), "Old Town");
    let text = entity.geometry_text().unwrap();
    assert_eq!(geometry::extract_kind_hint(text), GeometryKindHint::Polygon);
    let expected = geometry::generate(ShapeKind::Circle, 40.7128, -74.0060).unwrap();
    assert_eq!(text, expected);

    let stored = service.get_entity(entity.id.unwrap()).unwrap().unwrap();
    assert_eq!(stored.geometry_text(), Some(text));
}

#[test]
fn entity_with_supplied_geometry_must_validate() {
    let conn = open_db_in_memory().unwrap();
    let service = SpatialEntityService::new(SqliteSpatialEntityRepository::new(&conn));

    let mut request = CreateEntityRequest::new("Route", ShapeKind::LineString);
    request.geometry_text = Some("LINESTRING(1 2, 3 4)".to_string());
    let entity = service.create_entity(&request).unwrap();
    assert_eq!(entity.geometry_text(), Some("LINESTRING(1 2, 3 4)"));

    request.geometry_text = Some("CIRCLE(1 2)".to_string());
    let err = service.create_entity(&request).unwrap_err();
    assert!(matches!(err, RepoError::Validation(_)));

    let err = service
        .create_entity(&CreateEntityRequest::new("   ", ShapeKind::Point))
        .unwrap_err();
    assert!(matches!(err, RepoError::Validation(_)));
}

#[test]
fn regenerating_geometry_keeps_kind_and_moves_center() {
    let conn = open_db_in_memory().unwrap();
    let service = SpatialEntityService::new(SqliteSpatialEntityRepository::new(&conn));
    let created = service
        .create_entity(&CreateEntityRequest::new("Plaza", ShapeKind::Rectangle))
        .unwrap();
    let id = created.id.unwrap();

    let moved = service.regenerate_geometry(id, 51.5, -0.12).unwrap();

    assert_eq!(moved.kind(), ShapeKind::Rectangle);
    assert!(moved.updated_at() > created.updated_at());
    assert_eq!(
        moved.geometry_text(),
        Some(
            geometry::generate(ShapeKind::Rectangle, 51.5, -0.12)
                .unwrap()
                .as_str()
        )
    );
    assert_eq!(service.list_entities(Some(ShapeKind::Rectangle)).unwrap().len(), 1);
    assert!(service.list_entities(Some(ShapeKind::Point)).unwrap().is_empty());

    let err = service.regenerate_geometry(999, 0.0, 0.0).unwrap_err();
    assert!(matches!(err, RepoError::NotFound { .. }));
}
