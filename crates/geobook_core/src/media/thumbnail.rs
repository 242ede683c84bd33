//! Thumbnail derivation and image rotation.
//!
//! # Invariants
//! - Thumbnails keep the source aspect ratio and never upscale.
//! - JPEG sources stay JPEG; every other format is re-encoded as PNG.
//! - Thumbnail failures are reported as `None`, never as errors.
//! - Rotation re-persists through `AssetStore::rewrite`, so it inherits the
//!   store's tier fallback and holds the write lock from read to write.
//! - Rotated GIF and other non-JPEG content is stored as PNG.

use crate::media::{MediaError, MediaResult};
use crate::model::media::StorageOutcome;
use crate::model::AssetId;
use crate::storage::asset_store::{AssetStore, Replacement};
use image::{DynamicImage, GenericImageView, ImageFormat, ImageReader};
use log::{info, warn};
use rusqlite::Connection;
use std::io::Cursor;

/// Encoded derived image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Thumbnail {
    pub bytes: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub mime_type: &'static str,
}

/// Content written back by a rotation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RotatedAsset {
    pub bytes: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub mime_type: String,
    pub outcome: StorageOutcome,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ThumbnailPipeline;

impl ThumbnailPipeline {
    /// Scales `source` to fit `max_width x max_height`.
    ///
    /// Returns `None` when the source cannot be decoded or encoded.
    pub fn derive(&self, source: &[u8], max_width: u32, max_height: u32) -> Option<Thumbnail> {
        match self.try_derive(source, max_width, max_height) {
            Ok(thumbnail) => Some(thumbnail),
            Err(err) => {
                warn!("event=thumbnail_derive module=media status=error error={err}");
                None
            }
        }
    }

    pub fn try_derive(
        &self,
        source: &[u8],
        max_width: u32,
        max_height: u32,
    ) -> MediaResult<Thumbnail> {
        if max_width == 0 || max_height == 0 {
            return Err(MediaError::InvalidBounds {
                max_width,
                max_height,
            });
        }

        let (image, format) = decode(source)?;
        let (width, height) = image.dimensions();
        let scaled = if width <= max_width && height <= max_height {
            image
        } else {
            image.thumbnail(max_width, max_height)
        };

        let (bytes, mime_type) = encode(&scaled, format)?;
        Ok(Thumbnail {
            bytes,
            width: scaled.width(),
            height: scaled.height(),
            mime_type,
        })
    }

    /// Rotates a stored image clockwise and persists the result in place.
    ///
    /// # Errors
    /// - `InvalidRotation` unless `degrees_clockwise` is a multiple of 90.
    /// - `Asset` when the content cannot be exported or re-persisted.
    /// - `Image` when the stored content is not a decodable image.
    pub fn rotate(
        &self,
        conn: &mut Connection,
        store: &AssetStore,
        asset_id: AssetId,
        degrees_clockwise: u32,
    ) -> MediaResult<RotatedAsset> {
        if degrees_clockwise % 90 != 0 {
            return Err(MediaError::InvalidRotation(degrees_clockwise));
        }

        let quarter_turns = (degrees_clockwise / 90) % 4;
        if quarter_turns == 0 {
            let content = store.export(conn, asset_id)?;
            let (image, _) = decode(&content.bytes)?;
            return Ok(RotatedAsset {
                width: image.width(),
                height: image.height(),
                bytes: content.bytes,
                mime_type: content.mime_type,
                outcome: content.source,
            });
        }

        let mut dimensions = (0, 0);
        let content = store.rewrite(conn, asset_id, |current| -> MediaResult<Replacement> {
            let (image, format) = decode(&current.bytes)?;
            let rotated = match quarter_turns {
                1 => image.rotate90(),
                2 => image.rotate180(),
                _ => image.rotate270(),
            };
            dimensions = (rotated.width(), rotated.height());
            let (bytes, mime_type) = encode(&rotated, format)?;
            Ok(Replacement {
                bytes,
                mime_type: mime_type.to_string(),
            })
        })?;
        info!(
            "event=media_rotate module=media status=ok asset_id={} degrees={} outcome={}",
            asset_id, degrees_clockwise, content.source
        );

        Ok(RotatedAsset {
            width: dimensions.0,
            height: dimensions.1,
            bytes: content.bytes,
            mime_type: content.mime_type,
            outcome: content.source,
        })
    }
}

fn decode(source: &[u8]) -> MediaResult<(DynamicImage, ImageFormat)> {
    let reader = ImageReader::new(Cursor::new(source)).with_guessed_format()?;
    let format = reader.format().unwrap_or(ImageFormat::Png);
    Ok((reader.decode()?, format))
}

fn encode(
    image: &DynamicImage,
    source_format: ImageFormat,
) -> MediaResult<(Vec<u8>, &'static str)> {
    let mut bytes = Cursor::new(Vec::new());
    let mime_type = if source_format == ImageFormat::Jpeg {
        DynamicImage::ImageRgb8(image.to_rgb8()).write_to(&mut bytes, ImageFormat::Jpeg)?;
        "image/jpeg"
    } else {
        image.write_to(&mut bytes, ImageFormat::Png)?;
        "image/png"
    };
    Ok((bytes.into_inner(), mime_type))
}
