//! Visual descriptors for natively stored images.
//!
//! # Responsibility
//! - Compute average color, color histogram, positional color and
//!   texture descriptors from image content.
//! - Store them on the native object after its content write committed.
//!
//! # Invariants
//! - Extraction is best-effort: failures are logged and swallowed.
//! - Descriptor writes run in their own transaction, never in the content
//!   write's transaction.

use crate::model::AssetId;
use crate::storage::capability::{CapabilityProbe, NativeOperation};
use crate::storage::native::DescriptorColumn;
use crate::storage::{AdapterError, AssetAdapter, AssetError, AssetResult};
use image::error::{LimitError, LimitErrorKind};
use image::{ImageError, ImageResult, RgbImage};
use log::{debug, info, warn};
use rusqlite::{Connection, TransactionBehavior};
use serde::{Deserialize, Serialize};

pub const HISTOGRAM_BINS: usize = 8;
pub const POSITIONAL_GRID: u32 = 4;

/// Mean color over a pixel set, per channel in `0.0..=255.0`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MeanColor {
    pub r: f64,
    pub g: f64,
    pub b: f64,
}

/// Per-channel histograms; each bin holds the fraction of pixels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColorHistogram {
    pub r: [f64; HISTOGRAM_BINS],
    pub g: [f64; HISTOGRAM_BINS],
    pub b: [f64; HISTOGRAM_BINS],
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Texture {
    /// Standard deviation of luminance.
    pub contrast: f64,
    /// Mean absolute luminance step between neighboring pixels.
    pub edge_density: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageDescriptors {
    pub average_color: MeanColor,
    pub color_histogram: ColorHistogram,
    /// Row-major `POSITIONAL_GRID x POSITIONAL_GRID` cell means.
    pub positional_color: Vec<MeanColor>,
    pub texture: Texture,
}

impl ImageDescriptors {
    fn columns(&self) -> serde_json::Result<Vec<(DescriptorColumn, String)>> {
        Ok(vec![
            (
                DescriptorColumn::AverageColor,
                serde_json::to_string(&self.average_color)?,
            ),
            (
                DescriptorColumn::ColorHistogram,
                serde_json::to_string(&self.color_histogram)?,
            ),
            (
                DescriptorColumn::PositionalColor,
                serde_json::to_string(&self.positional_color)?,
            ),
            (DescriptorColumn::Texture, serde_json::to_string(&self.texture)?),
        ])
    }
}

/// Computes descriptors from encoded image bytes.
pub fn compute_descriptors(bytes: &[u8]) -> ImageResult<ImageDescriptors> {
    let rgb = image::load_from_memory(bytes)?.to_rgb8();
    if rgb.width() == 0 || rgb.height() == 0 {
        return Err(ImageError::Limits(LimitError::from_kind(
            LimitErrorKind::DimensionError,
        )));
    }

    Ok(ImageDescriptors {
        average_color: average_color(&rgb),
        color_histogram: color_histogram(&rgb),
        positional_color: positional_color(&rgb),
        texture: texture(&rgb),
    })
}

#[derive(Default, Clone, Copy)]
struct ChannelSums {
    r: u64,
    g: u64,
    b: u64,
    count: u64,
}

impl ChannelSums {
    fn add(&mut self, pixel: &image::Rgb<u8>) {
        self.r += u64::from(pixel[0]);
        self.g += u64::from(pixel[1]);
        self.b += u64::from(pixel[2]);
        self.count += 1;
    }

    fn mean(&self) -> Option<MeanColor> {
        if self.count == 0 {
            return None;
        }
        let count = self.count as f64;
        Some(MeanColor {
            r: self.r as f64 / count,
            g: self.g as f64 / count,
            b: self.b as f64 / count,
        })
    }
}

fn average_color(rgb: &RgbImage) -> MeanColor {
    let mut sums = ChannelSums::default();
    for pixel in rgb.pixels() {
        sums.add(pixel);
    }
    sums.mean().unwrap_or(MeanColor {
        r: 0.0,
        g: 0.0,
        b: 0.0,
    })
}

fn color_histogram(rgb: &RgbImage) -> ColorHistogram {
    let mut counts = [[0u64; HISTOGRAM_BINS]; 3];
    let shift = 8 - HISTOGRAM_BINS.trailing_zeros();
    for pixel in rgb.pixels() {
        for (channel, value) in pixel.0.iter().enumerate() {
            counts[channel][usize::from(*value >> shift)] += 1;
        }
    }

    let total = f64::from(rgb.width()) * f64::from(rgb.height());
    let normalize = |bins: [u64; HISTOGRAM_BINS]| bins.map(|count| count as f64 / total);
    ColorHistogram {
        r: normalize(counts[0]),
        g: normalize(counts[1]),
        b: normalize(counts[2]),
    }
}

fn positional_color(rgb: &RgbImage) -> Vec<MeanColor> {
    let (width, height) = rgb.dimensions();
    let cells = (POSITIONAL_GRID * POSITIONAL_GRID) as usize;
    let mut sums = vec![ChannelSums::default(); cells];

    for (x, y, pixel) in rgb.enumerate_pixels() {
        let column = (x * POSITIONAL_GRID / width).min(POSITIONAL_GRID - 1);
        let row = (y * POSITIONAL_GRID / height).min(POSITIONAL_GRID - 1);
        sums[(row * POSITIONAL_GRID + column) as usize].add(pixel);
    }

    // Images smaller than the grid leave cells empty; they take the global mean.
    let fallback = average_color(rgb);
    sums.iter()
        .map(|cell| cell.mean().unwrap_or(fallback))
        .collect()
}

// Luma in thousandths, from integer Rec. 601 weights. Integer sums keep
// flat regions at exactly zero contrast and zero edge density.
const LUMA_SCALE: f64 = 1000.0;

fn luminance(pixel: &image::Rgb<u8>) -> u64 {
    299 * u64::from(pixel[0]) + 587 * u64::from(pixel[1]) + 114 * u64::from(pixel[2])
}

fn texture(rgb: &RgbImage) -> Texture {
    let (width, height) = rgb.dimensions();
    let luma: Vec<u64> = rgb.pixels().map(luminance).collect();
    let count = luma.len() as u128;
    let sum: u128 = luma.iter().map(|value| u128::from(*value)).sum();
    let sum_squares: u128 = luma
        .iter()
        .map(|value| u128::from(*value) * u128::from(*value))
        .sum();
    // n * sum(x^2) - sum(x)^2 is never negative and exact in integers.
    let spread = count * sum_squares - sum * sum;
    let variance = spread as f64 / (count * count) as f64;

    let at = |x: u32, y: u32| luma[(y * width + x) as usize];
    let mut steps = 0u64;
    let mut step_count = 0u64;
    for y in 0..height {
        for x in 0..width {
            if x + 1 < width {
                steps += at(x + 1, y).abs_diff(at(x, y));
                step_count += 1;
            }
            if y + 1 < height {
                steps += at(x, y + 1).abs_diff(at(x, y));
                step_count += 1;
            }
        }
    }

    Texture {
        contrast: variance.sqrt() / LUMA_SCALE,
        edge_density: if step_count == 0 {
            0.0
        } else {
            steps as f64 / step_count as f64 / LUMA_SCALE
        },
    }
}

/// Writes descriptors onto native objects after a committed content write.
#[derive(Debug, Clone, Copy, Default)]
pub struct FeatureExtractor;

impl FeatureExtractor {
    /// Computes and stores descriptors for one native asset.
    ///
    /// Returns `None` for non-image content and on any failure.
    pub fn extract(
        &self,
        conn: &mut Connection,
        probe: &CapabilityProbe,
        asset_id: AssetId,
        mime_type: &str,
    ) -> Option<ImageDescriptors> {
        if !mime_type.starts_with("image/") {
            debug!(
                "event=feature_extract module=media status=skip asset_id={asset_id} mime_type={mime_type}"
            );
            return None;
        }

        match self.try_extract(conn, probe, asset_id) {
            Ok(descriptors) => {
                info!("event=feature_extract module=media status=ok asset_id={asset_id}");
                Some(descriptors)
            }
            Err(err) => {
                warn!(
                    "event=feature_extract module=media status=error asset_id={} error={}",
                    asset_id, err
                );
                None
            }
        }
    }

    fn try_extract(
        &self,
        conn: &mut Connection,
        probe: &CapabilityProbe,
        asset_id: AssetId,
    ) -> AssetResult<ImageDescriptors> {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let descriptors = probe.try_native(&tx, NativeOperation::ExtractFeatures, |native| {
            let bytes = native
                .read(&tx, asset_id)?
                .ok_or(AdapterError::LocatorMissing(asset_id))?;
            let descriptors = compute_descriptors(&bytes)
                .map_err(|err| AdapterError::Properties(err.to_string()))?;
            let columns = descriptors
                .columns()
                .map_err(|err| AdapterError::Driver(err.to_string()))?;
            for (column, value) in columns {
                native.write_descriptor(&tx, asset_id, column, &value)?;
            }
            Ok(descriptors)
        })?;
        tx.commit().map_err(AssetError::from)?;
        Ok(descriptors)
    }
}
