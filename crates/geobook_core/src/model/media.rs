//! Media asset domain model.

use crate::model::{AssetId, LocationId};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// Which storage path currently holds the authoritative content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageOutcome {
    /// Rich native object (extension-managed, with computed properties).
    NativeObject,
    /// Plain binary large object column.
    Blob,
    /// Only the on-disk upload copy exists; nothing persisted in the store.
    FilesystemOnly,
}

impl StorageOutcome {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NativeObject => "native_object",
            Self::Blob => "blob",
            Self::FilesystemOnly => "filesystem_only",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "native_object" => Some(Self::NativeObject),
            "blob" => Some(Self::Blob),
            "filesystem_only" => Some(Self::FilesystemOnly),
            _ => None,
        }
    }
}

impl Display for StorageOutcome {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Media metadata row. Binary content is reached only through the asset store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaAsset {
    pub id: AssetId,
    pub location_id: LocationId,
    pub mime_type: String,
    /// Path of the original upload on disk.
    pub file_path: String,
    pub description: Option<String>,
    /// Unix epoch milliseconds.
    pub uploaded_at: i64,
    pub is_active: bool,
    pub thumbnail_path: Option<String>,
    pub storage_outcome: StorageOutcome,
}

/// Insert model for a new media row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMediaAsset {
    pub location_id: LocationId,
    pub mime_type: String,
    pub file_path: String,
    pub description: Option<String>,
}
