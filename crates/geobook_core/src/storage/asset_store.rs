//! Tiered asset persistence.
//!
//! # Responsibility
//! - Persist content natively when possible, otherwise as a relational blob.
//! - Export content from whichever path holds it.
//! - Migrate blob content to the native path on demand.
//! - Rewrite content derived from the current content under one lock.
//!
//! # Invariants
//! - Each write holds the database write lock for its whole duration
//!   (`BEGIN IMMEDIATE`); concurrent writes to one asset serialize.
//! - `rewrite` reads and writes under the same lock, so a concurrent
//!   persist is never overwritten by a transform of older content.
//! - Every tier attempt runs in its own savepoint, so a failed attempt
//!   leaves neither partial content nor a changed outcome tag.
//! - After a successful write exactly one path holds content and
//!   `storage_outcome` names it.
//! - Feature extraction runs only after the content write committed and
//!   never fails the write.

use crate::media::features::FeatureExtractor;
use crate::model::media::StorageOutcome;
use crate::model::AssetId;
use crate::storage::blob::BlobAdapter;
use crate::storage::capability::{CapabilityProbe, CapabilityUnavailable, NativeOperation};
use crate::storage::{AdapterResult, AssetAdapter, AssetError, AssetResult};
use log::{debug, error, info, warn};
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use std::time::Instant;

/// Exported content plus the path it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetContent {
    pub bytes: Vec<u8>,
    pub mime_type: String,
    pub source: StorageOutcome,
}

/// New content produced by a [`AssetStore::rewrite`] transform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Replacement {
    pub bytes: Vec<u8>,
    pub mime_type: String,
}

struct AssetRow {
    outcome: StorageOutcome,
    mime_type: String,
}

/// Persists, exports and migrates binary media content.
pub struct AssetStore {
    probe: CapabilityProbe,
    features: FeatureExtractor,
}

impl AssetStore {
    pub fn new(probe: CapabilityProbe) -> Self {
        Self {
            probe,
            features: FeatureExtractor::default(),
        }
    }

    pub fn probe(&self) -> &CapabilityProbe {
        &self.probe
    }

    /// Stores `bytes` as the content of an existing asset row.
    ///
    /// Tries the native path first and falls back to the blob column.
    ///
    /// # Errors
    /// - `Validation` for an empty MIME type.
    /// - `NotFound` when the asset row does not exist.
    /// - `Storage` when both paths failed; prior content is untouched.
    pub fn persist(
        &self,
        conn: &mut Connection,
        asset_id: AssetId,
        bytes: &[u8],
        mime_type: &str,
    ) -> AssetResult<StorageOutcome> {
        let mime_type = normalize_mime(mime_type)?;
        let started_at = Instant::now();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        lock_asset_row(&tx, asset_id)?;

        let outcome = self.write_locked(tx, asset_id, bytes, &mime_type, started_at)?;
        if outcome == StorageOutcome::NativeObject {
            self.features.extract(conn, &self.probe, asset_id, &mime_type);
        }
        Ok(outcome)
    }

    /// Replaces asset content with `transform` applied to the current content.
    ///
    /// The read, the transform and the write share one write lock. Nothing
    /// is written when `transform` fails.
    ///
    /// # Errors
    /// - `NotFound` when the row or its content is missing.
    /// - The transform's own error.
    /// - `Validation` / `Storage` as for [`AssetStore::persist`].
    pub fn rewrite<E, F>(
        &self,
        conn: &mut Connection,
        asset_id: AssetId,
        transform: F,
    ) -> Result<AssetContent, E>
    where
        F: FnOnce(&AssetContent) -> Result<Replacement, E>,
        E: From<AssetError>,
    {
        let started_at = Instant::now();
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(AssetError::from)?;
        let row = lock_asset_row(&tx, asset_id)?;
        let current = self.read_content(&tx, asset_id, row)?;

        let replacement = transform(&current)?;
        let mime_type = normalize_mime(&replacement.mime_type)?;
        let outcome = self.write_locked(tx, asset_id, &replacement.bytes, &mime_type, started_at)?;
        debug!(
            "event=asset_rewrite module=storage status=ok asset_id={} from={} to={}",
            asset_id, current.source, outcome
        );
        if outcome == StorageOutcome::NativeObject {
            self.features.extract(conn, &self.probe, asset_id, &mime_type);
        }
        Ok(AssetContent {
            bytes: replacement.bytes,
            mime_type,
            source: outcome,
        })
    }

    /// Reads asset content, blob column first, native path second.
    ///
    /// # Errors
    /// - `NotFound` when the row is missing or neither path holds content.
    pub fn export(&self, conn: &Connection, asset_id: AssetId) -> AssetResult<AssetContent> {
        let row = read_asset_row(conn, asset_id)?;
        self.read_content(conn, asset_id, row)
    }

    /// Moves blob content into the native path.
    ///
    /// `mime_override` replaces the recorded MIME type when given.
    /// An asset that is already native is left unchanged.
    ///
    /// # Errors
    /// - `NotFound` when the row or its content is missing.
    /// - `CapabilityUnavailable` when the native path cannot take the
    ///   content; the blob stays authoritative.
    pub fn migrate(
        &self,
        conn: &mut Connection,
        asset_id: AssetId,
        mime_override: Option<&str>,
    ) -> AssetResult<StorageOutcome> {
        let mime_override = mime_override.map(normalize_mime).transpose()?;
        let started_at = Instant::now();
        let mut tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let row = lock_asset_row(&tx, asset_id)?;

        let Some(bytes) = BlobAdapter.read(&tx, asset_id)? else {
            if row.outcome == StorageOutcome::NativeObject {
                tx.commit()?;
                info!("event=asset_migrate module=storage status=noop asset_id={asset_id}");
                return Ok(StorageOutcome::NativeObject);
            }
            return Err(AssetError::NotFound(asset_id));
        };
        let mime_type = mime_override.unwrap_or(row.mime_type);

        if let Err(unavailable) =
            self.write_native(&mut tx, asset_id, &bytes, &mime_type, NativeOperation::Migrate)
        {
            error!(
                "event=asset_migrate module=storage status=error asset_id={} error_code=capability_unavailable error={}",
                asset_id, unavailable
            );
            return Err(unavailable.into());
        }
        tx.commit()?;

        info!(
            "event=asset_migrate module=storage status=ok asset_id={} bytes={} duration_ms={}",
            asset_id,
            bytes.len(),
            started_at.elapsed().as_millis()
        );
        self.features.extract(conn, &self.probe, asset_id, &mime_type);
        Ok(StorageOutcome::NativeObject)
    }

    fn read_content(
        &self,
        conn: &Connection,
        asset_id: AssetId,
        row: AssetRow,
    ) -> AssetResult<AssetContent> {
        if let Some(bytes) = BlobAdapter.read(conn, asset_id)? {
            debug!("event=asset_export module=storage status=ok asset_id={asset_id} source=blob");
            return Ok(AssetContent {
                bytes,
                mime_type: row.mime_type,
                source: StorageOutcome::Blob,
            });
        }

        match self
            .probe
            .try_native(conn, NativeOperation::Export, |native| native.read(conn, asset_id))
        {
            Ok(Some(bytes)) => {
                debug!(
                    "event=asset_export module=storage status=ok asset_id={asset_id} source=native_object"
                );
                return Ok(AssetContent {
                    bytes,
                    mime_type: row.mime_type,
                    source: StorageOutcome::NativeObject,
                });
            }
            Ok(None) => {}
            Err(unavailable) => debug!(
                "event=asset_export module=storage status=skip asset_id={} source=native_object reason={}",
                asset_id, unavailable.reason
            ),
        }

        info!(
            "event=asset_export module=storage status=empty asset_id={} outcome={}",
            asset_id, row.outcome
        );
        Err(AssetError::NotFound(asset_id))
    }

    /// Runs the tier sequence inside `tx` and commits it.
    fn write_locked(
        &self,
        mut tx: rusqlite::Transaction<'_>,
        asset_id: AssetId,
        bytes: &[u8],
        mime_type: &str,
        started_at: Instant,
    ) -> AssetResult<StorageOutcome> {
        let native_attempt =
            self.write_native(&mut tx, asset_id, bytes, mime_type, NativeOperation::Persist);
        let outcome = match native_attempt {
            Ok(()) => StorageOutcome::NativeObject,
            Err(unavailable) => {
                warn!(
                    "event=asset_persist module=storage status=fallback asset_id={} from=native_object to=blob reason={}",
                    asset_id, unavailable.reason
                );
                if let Err(err) = self.write_blob(&mut tx, asset_id, bytes, mime_type) {
                    error!(
                        "event=asset_persist module=storage status=error asset_id={} duration_ms={} error_code=all_tiers_failed error={}",
                        asset_id,
                        started_at.elapsed().as_millis(),
                        err
                    );
                    return Err(AssetError::Storage {
                        asset_id,
                        native: Some(unavailable.reason),
                        blob: err.to_string(),
                    });
                }
                StorageOutcome::Blob
            }
        };

        if let Err(err) = tx.commit() {
            error!(
                "event=asset_persist module=storage status=error asset_id={} error_code=commit_failed error={}",
                asset_id, err
            );
            return Err(AssetError::Storage {
                asset_id,
                native: None,
                blob: err.to_string(),
            });
        }

        info!(
            "event=asset_persist module=storage status=ok asset_id={} outcome={} bytes={} duration_ms={}",
            asset_id,
            outcome,
            bytes.len(),
            started_at.elapsed().as_millis()
        );
        Ok(outcome)
    }

    fn write_native(
        &self,
        tx: &mut rusqlite::Transaction<'_>,
        asset_id: AssetId,
        bytes: &[u8],
        mime_type: &str,
        operation: NativeOperation,
    ) -> Result<(), CapabilityUnavailable> {
        let unavailable = |reason: String| CapabilityUnavailable { operation, reason };
        let savepoint = tx.savepoint().map_err(|err| unavailable(err.to_string()))?;

        self.probe.try_native(&savepoint, operation, |native| {
            native.write(&savepoint, asset_id, bytes, mime_type)?;
            BlobAdapter.clear(&savepoint, asset_id)?;
            set_outcome(&savepoint, asset_id, native.outcome(), mime_type)?;
            Ok(())
        })?;

        savepoint.commit().map_err(|err| unavailable(err.to_string()))
    }

    fn write_blob(
        &self,
        tx: &mut rusqlite::Transaction<'_>,
        asset_id: AssetId,
        bytes: &[u8],
        mime_type: &str,
    ) -> AdapterResult<()> {
        let savepoint = tx.savepoint()?;
        BlobAdapter.write(&savepoint, asset_id, bytes, mime_type)?;

        // A stale native copy must not outlive a blob write.
        if let Err(unavailable) = self
            .probe
            .try_native(&savepoint, NativeOperation::Clear, |native| {
                native.clear(&savepoint, asset_id)
            })
        {
            debug!(
                "event=asset_persist module=storage status=skip asset_id={} step=native_clear reason={}",
                asset_id, unavailable.reason
            );
        }

        set_outcome(&savepoint, asset_id, BlobAdapter.outcome(), mime_type)?;
        savepoint.commit()?;
        Ok(())
    }
}

impl Default for AssetStore {
    fn default() -> Self {
        Self::new(CapabilityProbe::sqlite())
    }
}

fn normalize_mime(mime_type: &str) -> AssetResult<String> {
    let normalized = mime_type.trim().to_ascii_lowercase();
    if normalized.is_empty() {
        return Err(AssetError::Validation(
            "mime type must not be empty".to_string(),
        ));
    }
    Ok(normalized)
}

/// Reads the row under the caller's write transaction.
fn lock_asset_row(tx: &rusqlite::Transaction<'_>, asset_id: AssetId) -> AssetResult<AssetRow> {
    read_asset_row(tx, asset_id)
}

fn read_asset_row(conn: &Connection, asset_id: AssetId) -> AssetResult<AssetRow> {
    let row: Option<(String, String)> = conn
        .query_row(
            "SELECT storage_outcome, mime_type FROM media_assets WHERE id = ?1;",
            [asset_id],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()?;
    let (outcome_text, mime_type) = row.ok_or(AssetError::NotFound(asset_id))?;
    let outcome = StorageOutcome::parse(&outcome_text).ok_or_else(|| {
        AssetError::Validation(format!(
            "invalid storage outcome `{outcome_text}` for asset {asset_id}"
        ))
    })?;
    Ok(AssetRow { outcome, mime_type })
}

fn set_outcome(
    conn: &Connection,
    asset_id: AssetId,
    outcome: StorageOutcome,
    mime_type: &str,
) -> rusqlite::Result<()> {
    conn.execute(
        "UPDATE media_assets SET storage_outcome = ?2, mime_type = ?3 WHERE id = ?1;",
        params![asset_id, outcome.as_str(), mime_type],
    )?;
    Ok(())
}
