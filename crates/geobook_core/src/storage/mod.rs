//! Binary asset persistence.
//!
//! # Responsibility
//! - Persist and export media content through the best available path.
//! - Keep the two storage paths behind one adapter contract.
//!
//! # Invariants
//! - Exactly one storage path is authoritative per asset at any time.
//! - A write either fully replaces the authoritative content or fails
//!   leaving the prior content intact.
//! - Adapter-specific details never leak past this module.

use crate::db::DbError;
use crate::model::media::StorageOutcome;
use crate::model::AssetId;
use rusqlite::Connection;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod asset_store;
pub mod blob;
pub mod capability;
pub mod native;

pub use capability::CapabilityUnavailable;

pub type AdapterResult<T> = Result<T, AdapterError>;
pub type AssetResult<T> = Result<T, AssetError>;

/// Properties computed while storing content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectProperties {
    pub content_length: u64,
    /// Detected image format (e.g. `png`), when the content is an image.
    pub format: Option<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

impl ObjectProperties {
    pub(crate) fn opaque(content_length: usize) -> Self {
        Self {
            content_length: content_length as u64,
            format: None,
            width: None,
            height: None,
        }
    }
}

/// One storage path for asset content.
pub trait AssetAdapter {
    /// Outcome tag recorded when this adapter holds the content.
    fn outcome(&self) -> StorageOutcome;
    /// Replaces stored content for `asset_id`.
    fn write(
        &self,
        conn: &Connection,
        asset_id: AssetId,
        bytes: &[u8],
        mime_type: &str,
    ) -> AdapterResult<ObjectProperties>;
    /// Reads stored content, `None` when this path holds nothing.
    fn read(&self, conn: &Connection, asset_id: AssetId) -> AdapterResult<Option<Vec<u8>>>;
    /// Drops stored content for `asset_id`.
    fn clear(&self, conn: &Connection, asset_id: AssetId) -> AdapterResult<()>;
}

/// Failure inside one adapter.
#[derive(Debug)]
pub enum AdapterError {
    /// The backing capability is not present right now.
    Unavailable(String),
    /// No locator/row exists to write into.
    LocatorMissing(AssetId),
    /// Content properties could not be computed.
    Properties(String),
    /// Driver-reported failure.
    Driver(String),
    Io(std::io::Error),
    Db(rusqlite::Error),
}

impl Display for AdapterError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unavailable(message) => write!(f, "capability unavailable: {message}"),
            Self::LocatorMissing(id) => write!(f, "no storage locator for asset {id}"),
            Self::Properties(message) => write!(f, "cannot compute content properties: {message}"),
            Self::Driver(message) => write!(f, "driver failure: {message}"),
            Self::Io(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
        }
    }
}

impl Error for AdapterError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<rusqlite::Error> for AdapterError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(value)
    }
}

impl From<std::io::Error> for AdapterError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

/// Asset store error surfaced to callers.
#[derive(Debug)]
pub enum AssetError {
    /// Malformed input, rejected before any storage attempt.
    Validation(String),
    NotFound(AssetId),
    /// Native capability required but unusable (fatal only for `migrate`).
    CapabilityUnavailable(CapabilityUnavailable),
    /// Every persistence tier failed.
    Storage {
        asset_id: AssetId,
        native: Option<String>,
        blob: String,
    },
    Adapter(AdapterError),
    Db(DbError),
}

impl Display for AssetError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(message) => write!(f, "invalid asset input: {message}"),
            Self::NotFound(id) => write!(f, "asset not found: {id}"),
            Self::CapabilityUnavailable(err) => write!(f, "{err}"),
            Self::Storage {
                asset_id,
                native,
                blob,
            } => write!(
                f,
                "all storage paths failed for asset {asset_id}: native=({}) blob=({blob})",
                native.as_deref().unwrap_or("not attempted")
            ),
            Self::Adapter(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
        }
    }
}

impl Error for AssetError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::CapabilityUnavailable(err) => Some(err),
            Self::Adapter(err) => Some(err),
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<CapabilityUnavailable> for AssetError {
    fn from(value: CapabilityUnavailable) -> Self {
        Self::CapabilityUnavailable(value)
    }
}

impl From<AdapterError> for AssetError {
    fn from(value: AdapterError) -> Self {
        Self::Adapter(value)
    }
}

impl From<DbError> for AssetError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for AssetError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}
