//! Media metadata repository.
//!
//! # Responsibility
//! - Create and read `media_assets` metadata rows.
//! - Record thumbnail paths derived after uploads.
//! - Repoint the on-disk copy when a rewrite changes its format.
//!
//! # Invariants
//! - Binary columns are never touched here; content belongs to `AssetStore`.
//! - New rows start as `filesystem_only` until a store write succeeds.

use crate::model::media::{MediaAsset, NewMediaAsset, StorageOutcome};
use crate::model::{AssetId, LocationId};
use crate::repo::{RepoError, RepoResult};
use rusqlite::{params, Connection, OptionalExtension, Row};

const MEDIA_SELECT_SQL: &str = "SELECT
    id,
    location_id,
    mime_type,
    file_path,
    description,
    uploaded_at,
    is_active,
    thumbnail_path,
    storage_outcome
FROM media_assets";

/// Repository interface for media metadata.
pub trait MediaRepository {
    fn create_media(&self, media: &NewMediaAsset) -> RepoResult<AssetId>;
    fn get_media(&self, id: AssetId) -> RepoResult<Option<MediaAsset>>;
    fn list_for_location(&self, location_id: LocationId) -> RepoResult<Vec<MediaAsset>>;
    fn set_thumbnail_path(&self, id: AssetId, thumbnail_path: &str) -> RepoResult<()>;
    fn set_file_path(&self, id: AssetId, file_path: &str) -> RepoResult<()>;
}

/// SQLite-backed media metadata repository.
pub struct SqliteMediaRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteMediaRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl MediaRepository for SqliteMediaRepository<'_> {
    fn create_media(&self, media: &NewMediaAsset) -> RepoResult<AssetId> {
        if media.mime_type.trim().is_empty() {
            return Err(RepoError::InvalidData(
                "media mime type must not be empty".to_string(),
            ));
        }

        self.conn.execute(
            "INSERT INTO media_assets (
                location_id,
                mime_type,
                file_path,
                description,
                storage_outcome
            ) VALUES (?1, ?2, ?3, ?4, ?5);",
            params![
                media.location_id,
                media.mime_type.trim(),
                media.file_path.as_str(),
                media.description.as_deref(),
                StorageOutcome::FilesystemOnly.as_str(),
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn get_media(&self, id: AssetId) -> RepoResult<Option<MediaAsset>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{MEDIA_SELECT_SQL} WHERE id = ?1;"))?;
        let row = stmt.query_row([id], |row| Ok(parse_media_row(row))).optional()?;
        row.transpose()
    }

    fn list_for_location(&self, location_id: LocationId) -> RepoResult<Vec<MediaAsset>> {
        let mut stmt = self.conn.prepare(&format!(
            "{MEDIA_SELECT_SQL} WHERE location_id = ?1 ORDER BY uploaded_at DESC, id DESC;"
        ))?;
        let mut rows = stmt.query([location_id])?;
        let mut assets = Vec::new();
        while let Some(row) = rows.next()? {
            assets.push(parse_media_row(row)?);
        }
        Ok(assets)
    }

    fn set_thumbnail_path(&self, id: AssetId, thumbnail_path: &str) -> RepoResult<()> {
        self.update_path(id, "thumbnail_path", thumbnail_path)
    }

    fn set_file_path(&self, id: AssetId, file_path: &str) -> RepoResult<()> {
        if file_path.trim().is_empty() {
            return Err(RepoError::InvalidData(
                "media file path must not be empty".to_string(),
            ));
        }
        self.update_path(id, "file_path", file_path)
    }
}

impl SqliteMediaRepository<'_> {
    // `column` is always one of the two path columns named above.
    fn update_path(&self, id: AssetId, column: &'static str, value: &str) -> RepoResult<()> {
        let changed = self.conn.execute(
            &format!("UPDATE media_assets SET {column} = ?2 WHERE id = ?1;"),
            params![id, value],
        )?;
        if changed == 0 {
            return Err(RepoError::NotFound {
                entity: "media asset",
                id,
            });
        }
        Ok(())
    }
}

fn parse_media_row(row: &Row<'_>) -> RepoResult<MediaAsset> {
    let outcome_text: String = row.get("storage_outcome")?;
    let storage_outcome = StorageOutcome::parse(&outcome_text).ok_or_else(|| {
        RepoError::InvalidData(format!(
            "invalid storage outcome `{outcome_text}` in media_assets.storage_outcome"
        ))
    })?;

    let is_active = match row.get::<_, i64>("is_active")? {
        0 => false,
        1 => true,
        other => {
            return Err(RepoError::InvalidData(format!(
                "invalid is_active value `{other}` in media_assets.is_active"
            )));
        }
    };

    Ok(MediaAsset {
        id: row.get("id")?,
        location_id: row.get("location_id")?,
        mime_type: row.get("mime_type")?,
        file_path: row.get("file_path")?,
        description: row.get("description")?,
        uploaded_at: row.get("uploaded_at")?,
        is_active,
        thumbnail_path: row.get("thumbnail_path")?,
        storage_outcome,
    })
}
