//! Relational binary column storage path.
//!
//! Content lives in `media_assets.blob_content`. A write allocates a
//! zero-filled blob of the final size and streams the bytes into it.

use crate::model::media::StorageOutcome;
use crate::model::AssetId;
use crate::storage::{AdapterError, AdapterResult, AssetAdapter, ObjectProperties};
use rusqlite::{params, Connection, DatabaseName, OptionalExtension};
use std::io::Write;

#[derive(Debug, Clone, Copy, Default)]
pub struct BlobAdapter;

impl AssetAdapter for BlobAdapter {
    fn outcome(&self) -> StorageOutcome {
        StorageOutcome::Blob
    }

    fn write(
        &self,
        conn: &Connection,
        asset_id: AssetId,
        bytes: &[u8],
        _mime_type: &str,
    ) -> AdapterResult<ObjectProperties> {
        let changed = conn.execute(
            "UPDATE media_assets SET blob_content = zeroblob(?2) WHERE id = ?1;",
            params![asset_id, bytes.len() as i64],
        )?;
        if changed == 0 {
            return Err(AdapterError::LocatorMissing(asset_id));
        }

        let mut blob = conn.blob_open(
            DatabaseName::Main,
            "media_assets",
            "blob_content",
            asset_id,
            false,
        )?;
        blob.write_all(bytes)?;
        blob.close()?;
        Ok(ObjectProperties::opaque(bytes.len()))
    }

    fn read(&self, conn: &Connection, asset_id: AssetId) -> AdapterResult<Option<Vec<u8>>> {
        let content: Option<Option<Vec<u8>>> = conn
            .query_row(
                "SELECT blob_content FROM media_assets WHERE id = ?1;",
                [asset_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(content.flatten())
    }

    fn clear(&self, conn: &Connection, asset_id: AssetId) -> AdapterResult<()> {
        conn.execute(
            "UPDATE media_assets SET blob_content = NULL WHERE id = ?1;",
            [asset_id],
        )?;
        Ok(())
    }
}
