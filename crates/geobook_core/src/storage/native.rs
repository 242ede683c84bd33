//! Native object storage path.
//!
//! # Responsibility
//! - Define the driver seam for the optional native object extension.
//! - Provide the SQLite driver backed by the `media_native_objects` table.
//! - Adapt driver calls to the shared `AssetAdapter` contract.
//!
//! # Invariants
//! - The extension is optional: a database without the table is valid.
//! - A write always runs `init_locator`, `load_data` and `set_properties`
//!   in that order; a failure in any step fails the whole write.
//!
//! # See also
//! - `storage::capability` for the probe that guards every driver call.

use crate::model::media::StorageOutcome;
use crate::model::{now_epoch_ms, AssetId};
use crate::storage::{AdapterError, AdapterResult, AssetAdapter, ObjectProperties};
use log::info;
use rusqlite::{params, Connection, OptionalExtension};
use std::io::Cursor;

const NATIVE_OBJECTS_SQL: &str = include_str!("native_objects.sql");
const NATIVE_OBJECTS_TABLE: &str = "media_native_objects";

/// Installs the native object extension on `conn`'s database.
pub fn install_native_objects(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(NATIVE_OBJECTS_SQL)?;
    info!("event=native_objects_install module=storage status=ok");
    Ok(())
}

/// Removes the native object extension together with its stored content.
pub fn uninstall_native_objects(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(&format!("DROP TABLE IF EXISTS {NATIVE_OBJECTS_TABLE};"))?;
    info!("event=native_objects_uninstall module=storage status=ok");
    Ok(())
}

/// Descriptor slots on a native object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DescriptorColumn {
    AverageColor,
    ColorHistogram,
    PositionalColor,
    Texture,
}

impl DescriptorColumn {
    pub const ALL: [Self; 4] = [
        Self::AverageColor,
        Self::ColorHistogram,
        Self::PositionalColor,
        Self::Texture,
    ];

    pub fn column_name(self) -> &'static str {
        match self {
            Self::AverageColor => "average_color",
            Self::ColorHistogram => "color_histogram",
            Self::PositionalColor => "positional_color",
            Self::Texture => "texture",
        }
    }
}

/// Low-level calls into the native object extension.
///
/// Implementations must not cache availability across calls.
pub trait NativeObjectDriver: Send + Sync {
    /// Fails when the extension cannot be reached on `conn`.
    fn resolve(&self, conn: &Connection) -> AdapterResult<()>;
    /// Creates (or resets) an empty object for the asset.
    fn init_locator(&self, conn: &Connection, asset_id: AssetId) -> AdapterResult<()>;
    fn load_data(&self, conn: &Connection, asset_id: AssetId, bytes: &[u8]) -> AdapterResult<()>;
    /// Computes and stores format and dimensions from the loaded data.
    fn set_properties(
        &self,
        conn: &Connection,
        asset_id: AssetId,
        mime_type: &str,
    ) -> AdapterResult<ObjectProperties>;
    fn read_content(&self, conn: &Connection, asset_id: AssetId) -> AdapterResult<Option<Vec<u8>>>;
    fn clear(&self, conn: &Connection, asset_id: AssetId) -> AdapterResult<()>;
    fn write_descriptor(
        &self,
        conn: &Connection,
        asset_id: AssetId,
        column: DescriptorColumn,
        value: &str,
    ) -> AdapterResult<()>;
}

/// Driver for the `media_native_objects` extension table.
#[derive(Debug, Clone, Copy, Default)]
pub struct SqliteObjectDriver;

impl NativeObjectDriver for SqliteObjectDriver {
    fn resolve(&self, conn: &Connection) -> AdapterResult<()> {
        let installed: bool = conn.query_row(
            "SELECT EXISTS(
                SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1
            );",
            [NATIVE_OBJECTS_TABLE],
            |row| row.get(0),
        )?;
        if !installed {
            return Err(AdapterError::Unavailable(
                "native object extension is not installed".to_string(),
            ));
        }
        Ok(())
    }

    fn init_locator(&self, conn: &Connection, asset_id: AssetId) -> AdapterResult<()> {
        conn.execute(
            "INSERT INTO media_native_objects (asset_id, updated_at)
             VALUES (?1, ?2)
             ON CONFLICT(asset_id) DO UPDATE SET
                content = NULL,
                content_length = 0,
                mime_type = NULL,
                format = NULL,
                width = NULL,
                height = NULL,
                average_color = NULL,
                color_histogram = NULL,
                positional_color = NULL,
                texture = NULL,
                updated_at = excluded.updated_at;",
            params![asset_id, now_epoch_ms()],
        )?;
        Ok(())
    }

    fn load_data(&self, conn: &Connection, asset_id: AssetId, bytes: &[u8]) -> AdapterResult<()> {
        let changed = conn.execute(
            "UPDATE media_native_objects
             SET content = ?2, content_length = ?3
             WHERE asset_id = ?1;",
            params![asset_id, bytes, bytes.len() as i64],
        )?;
        if changed == 0 {
            return Err(AdapterError::LocatorMissing(asset_id));
        }
        Ok(())
    }

    fn set_properties(
        &self,
        conn: &Connection,
        asset_id: AssetId,
        mime_type: &str,
    ) -> AdapterResult<ObjectProperties> {
        let content = self
            .read_content(conn, asset_id)?
            .ok_or(AdapterError::LocatorMissing(asset_id))?;
        let properties = inspect_content(&content, mime_type)?;

        conn.execute(
            "UPDATE media_native_objects
             SET mime_type = ?2, format = ?3, width = ?4, height = ?5, content_length = ?6
             WHERE asset_id = ?1;",
            params![
                asset_id,
                mime_type,
                properties.format.as_deref(),
                properties.width,
                properties.height,
                properties.content_length as i64,
            ],
        )?;
        Ok(properties)
    }

    fn read_content(&self, conn: &Connection, asset_id: AssetId) -> AdapterResult<Option<Vec<u8>>> {
        let content: Option<Option<Vec<u8>>> = conn
            .query_row(
                "SELECT content FROM media_native_objects WHERE asset_id = ?1;",
                [asset_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(content.flatten())
    }

    fn clear(&self, conn: &Connection, asset_id: AssetId) -> AdapterResult<()> {
        conn.execute(
            "DELETE FROM media_native_objects WHERE asset_id = ?1;",
            [asset_id],
        )?;
        Ok(())
    }

    fn write_descriptor(
        &self,
        conn: &Connection,
        asset_id: AssetId,
        column: DescriptorColumn,
        value: &str,
    ) -> AdapterResult<()> {
        let changed = conn.execute(
            &format!(
                "UPDATE media_native_objects SET {} = ?2 WHERE asset_id = ?1;",
                column.column_name()
            ),
            params![asset_id, value],
        )?;
        if changed == 0 {
            return Err(AdapterError::LocatorMissing(asset_id));
        }
        Ok(())
    }
}

/// Computes object properties. Images must decode far enough to report
/// their dimensions; other content is stored opaquely.
fn inspect_content(bytes: &[u8], mime_type: &str) -> AdapterResult<ObjectProperties> {
    if !mime_type.starts_with("image/") {
        return Ok(ObjectProperties::opaque(bytes.len()));
    }

    let reader = image::ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|err| AdapterError::Properties(err.to_string()))?;
    let format = reader
        .format()
        .and_then(|format| format.extensions_str().first().copied())
        .map(str::to_string);
    let (width, height) = reader
        .into_dimensions()
        .map_err(|err| AdapterError::Properties(err.to_string()))?;

    Ok(ObjectProperties {
        content_length: bytes.len() as u64,
        format,
        width: Some(width),
        height: Some(height),
    })
}

/// `AssetAdapter` view over a resolved native object driver.
pub struct NativeObjectAdapter<'d> {
    driver: &'d dyn NativeObjectDriver,
}

impl<'d> NativeObjectAdapter<'d> {
    pub(crate) fn new(driver: &'d dyn NativeObjectDriver) -> Self {
        Self { driver }
    }

    pub fn write_descriptor(
        &self,
        conn: &Connection,
        asset_id: AssetId,
        column: DescriptorColumn,
        value: &str,
    ) -> AdapterResult<()> {
        self.driver.write_descriptor(conn, asset_id, column, value)
    }
}

impl AssetAdapter for NativeObjectAdapter<'_> {
    fn outcome(&self) -> StorageOutcome {
        StorageOutcome::NativeObject
    }

    fn write(
        &self,
        conn: &Connection,
        asset_id: AssetId,
        bytes: &[u8],
        mime_type: &str,
    ) -> AdapterResult<ObjectProperties> {
        self.driver.init_locator(conn, asset_id)?;
        self.driver.load_data(conn, asset_id, bytes)?;
        self.driver.set_properties(conn, asset_id, mime_type)
    }

    fn read(&self, conn: &Connection, asset_id: AssetId) -> AdapterResult<Option<Vec<u8>>> {
        self.driver.read_content(conn, asset_id)
    }

    fn clear(&self, conn: &Connection, asset_id: AssetId) -> AdapterResult<()> {
        self.driver.clear(conn, asset_id)
    }
}
