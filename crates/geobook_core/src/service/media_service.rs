//! Media upload, read and rotate use-cases.
//!
//! # Responsibility
//! - Keep an on-disk copy of every upload next to the stored content.
//! - Route content through `AssetStore` and derive thumbnails.
//!
//! # Invariants
//! - A media row exists before its content is persisted.
//! - A failed content write leaves the row `filesystem_only`; the upload
//!   itself still succeeds.
//! - Thumbnail and on-disk copy maintenance is best-effort.
//! - The on-disk copy's extension follows the stored format; a rotation
//!   that turns a GIF into PNG moves `x.gif` to `x.png`.

use crate::config::MediaConfig;
use crate::media::thumbnail::{RotatedAsset, ThumbnailPipeline};
use crate::media::{MediaError, MediaResult};
use crate::model::media::{NewMediaAsset, StorageOutcome};
use crate::model::{AssetId, LocationId};
use crate::repo::location_repo::{LocationRepository, SqliteLocationRepository};
use crate::repo::media_repo::{MediaRepository, SqliteMediaRepository};
use crate::repo::RepoError;
use crate::storage::asset_store::{AssetContent, AssetStore};
use crate::storage::AssetError;
use log::{info, warn};
use rusqlite::Connection;
use std::path::{Path, PathBuf};
use uuid::Uuid;

const IMAGES_DIR: &str = "images";
const THUMBNAILS_DIR: &str = "thumbnails";

/// One uploaded file.
#[derive(Debug, Clone, Copy)]
pub struct UploadRequest<'a> {
    pub location_id: LocationId,
    pub file_name: &'a str,
    pub mime_type: &'a str,
    pub bytes: &'a [u8],
    pub description: Option<&'a str>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadReceipt {
    pub asset_id: AssetId,
    pub outcome: StorageOutcome,
    pub file_path: PathBuf,
    pub thumbnail_path: Option<PathBuf>,
}

pub struct MediaService {
    store: AssetStore,
    thumbnails: ThumbnailPipeline,
    media_root: PathBuf,
    thumbnail_max_width: u32,
    thumbnail_max_height: u32,
}

impl MediaService {
    pub fn new(store: AssetStore, config: &MediaConfig) -> Self {
        Self {
            store,
            thumbnails: ThumbnailPipeline,
            media_root: config.media_root.clone(),
            thumbnail_max_width: config.thumbnail_max_width,
            thumbnail_max_height: config.thumbnail_max_height,
        }
    }

    pub fn store(&self) -> &AssetStore {
        &self.store
    }

    /// Saves the upload to disk, records it and persists its content.
    ///
    /// # Errors
    /// - `Repo(NotFound)` when the location does not exist.
    /// - `Io` when the on-disk copy cannot be written.
    pub fn upload(
        &self,
        conn: &mut Connection,
        request: &UploadRequest<'_>,
    ) -> MediaResult<UploadReceipt> {
        SqliteLocationRepository::new(conn)
            .get_location(request.location_id)?
            .ok_or(RepoError::NotFound {
                entity: "location",
                id: request.location_id,
            })?;

        let images_dir = self.media_root.join(IMAGES_DIR);
        std::fs::create_dir_all(&images_dir)?;
        let file_path = images_dir.join(format!(
            "{}_{}",
            Uuid::new_v4(),
            sanitize_file_name(request.file_name)
        ));
        std::fs::write(&file_path, request.bytes)?;

        let asset_id = SqliteMediaRepository::new(conn).create_media(&NewMediaAsset {
            location_id: request.location_id,
            mime_type: request.mime_type.to_string(),
            file_path: file_path.to_string_lossy().into_owned(),
            description: request.description.map(str::to_string),
        })?;

        let outcome = match self
            .store
            .persist(conn, asset_id, request.bytes, request.mime_type)
        {
            Ok(outcome) => outcome,
            Err(err @ AssetError::Storage { .. }) => {
                warn!(
                    "event=media_upload module=service status=fallback asset_id={} outcome=filesystem_only error={}",
                    asset_id, err
                );
                StorageOutcome::FilesystemOnly
            }
            Err(err) => return Err(err.into()),
        };

        let thumbnail_path = if is_image_mime(request.mime_type) {
            self.write_thumbnail(conn, asset_id, request.bytes, None)
        } else {
            None
        };

        info!(
            "event=media_upload module=service status=ok asset_id={} outcome={} bytes={} thumbnail={}",
            asset_id,
            outcome,
            request.bytes.len(),
            thumbnail_path.is_some()
        );
        Ok(UploadReceipt {
            asset_id,
            outcome,
            file_path,
            thumbnail_path,
        })
    }

    /// Returns stored content, or the on-disk copy when the store holds none.
    pub fn read(&self, conn: &Connection, asset_id: AssetId) -> MediaResult<AssetContent> {
        match self.store.export(conn, asset_id) {
            Ok(content) => Ok(content),
            Err(AssetError::NotFound(_)) => {
                let asset = SqliteMediaRepository::new(conn)
                    .get_media(asset_id)?
                    .ok_or(AssetError::NotFound(asset_id))?;
                let bytes = std::fs::read(&asset.file_path).map_err(|err| {
                    warn!(
                        "event=media_read module=service status=error asset_id={} source=filesystem error={}",
                        asset_id, err
                    );
                    AssetError::NotFound(asset_id)
                })?;
                Ok(AssetContent {
                    bytes,
                    mime_type: asset.mime_type,
                    source: StorageOutcome::FilesystemOnly,
                })
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Rotates stored content, then refreshes the on-disk copy and thumbnail.
    pub fn rotate(
        &self,
        conn: &mut Connection,
        asset_id: AssetId,
        degrees_clockwise: u32,
    ) -> MediaResult<RotatedAsset> {
        let rotated = self
            .thumbnails
            .rotate(conn, &self.store, asset_id, degrees_clockwise)?;

        match SqliteMediaRepository::new(conn).get_media(asset_id) {
            Ok(Some(asset)) => {
                if let Err(err) =
                    self.replace_disk_copy(conn, asset_id, Path::new(&asset.file_path), &rotated)
                {
                    warn!(
                        "event=media_rotate module=service status=error asset_id={} step=disk_copy error={}",
                        asset_id, err
                    );
                }
                let existing = asset.thumbnail_path.map(PathBuf::from);
                self.write_thumbnail(conn, asset_id, &rotated.bytes, existing);
            }
            Ok(None) => {}
            Err(err) => warn!(
                "event=media_rotate module=service status=error asset_id={} step=metadata error={}",
                asset_id, err
            ),
        }
        Ok(rotated)
    }

    /// Writes rotated bytes over the disk copy, renaming it when the
    /// stored format changed extension.
    fn replace_disk_copy(
        &self,
        conn: &Connection,
        asset_id: AssetId,
        current: &Path,
        rotated: &RotatedAsset,
    ) -> MediaResult<PathBuf> {
        let target = match extension_for_mime(&rotated.mime_type) {
            Some(extension) if !has_extension(current, extension) => {
                current.with_extension(extension)
            }
            _ => current.to_path_buf(),
        };
        ensure_parent(&target)?;
        std::fs::write(&target, &rotated.bytes)?;

        if target.as_path() != current {
            SqliteMediaRepository::new(conn)
                .set_file_path(asset_id, &target.to_string_lossy())?;
            if let Err(err) = std::fs::remove_file(current) {
                warn!(
                    "event=media_rotate module=service status=error asset_id={} step=remove_stale_copy error={}",
                    asset_id, err
                );
            }
        }
        Ok(target)
    }

    fn write_thumbnail(
        &self,
        conn: &Connection,
        asset_id: AssetId,
        source: &[u8],
        existing: Option<PathBuf>,
    ) -> Option<PathBuf> {
        let thumbnail = self.thumbnails.derive(
            source,
            self.thumbnail_max_width,
            self.thumbnail_max_height,
        )?;
        let extension = if thumbnail.mime_type == "image/jpeg" {
            "jpg"
        } else {
            "png"
        };
        let path = existing.unwrap_or_else(|| {
            self.media_root
                .join(THUMBNAILS_DIR)
                .join(format!("thumb_{}.{extension}", Uuid::new_v4()))
        });

        let written = ensure_parent(&path)
            .and_then(|()| std::fs::write(&path, &thumbnail.bytes).map_err(MediaError::from))
            .and_then(|()| {
                SqliteMediaRepository::new(conn)
                    .set_thumbnail_path(asset_id, &path.to_string_lossy())
                    .map_err(MediaError::from)
            });
        match written {
            Ok(()) => Some(path),
            Err(err) => {
                warn!(
                    "event=thumbnail_write module=service status=error asset_id={} error={}",
                    asset_id, err
                );
                None
            }
        }
    }
}

fn is_image_mime(mime_type: &str) -> bool {
    mime_type.trim().to_ascii_lowercase().starts_with("image/")
}

fn extension_for_mime(mime_type: &str) -> Option<&'static str> {
    match mime_type {
        "image/png" => Some("png"),
        "image/jpeg" => Some("jpg"),
        _ => None,
    }
}

fn has_extension(path: &Path, extension: &str) -> bool {
    let Some(actual) = path.extension().and_then(|value| value.to_str()) else {
        return false;
    };
    actual.eq_ignore_ascii_case(extension)
        || (extension == "jpg" && actual.eq_ignore_ascii_case("jpeg"))
}

fn ensure_parent(path: &Path) -> MediaResult<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    Ok(())
}

/// Keeps the last path component and replaces anything outside
/// `[A-Za-z0-9._-]` with `_`.
fn sanitize_file_name(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or_default();
    let cleaned: String = base
        .chars()
        .map(|ch| {
            if ch.is_ascii_alphanumeric() || matches!(ch, '.' | '_' | '-') {
                ch
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_start_matches('.');
    if cleaned.is_empty() {
        "upload".to_string()
    } else {
        cleaned.to_string()
    }
}
