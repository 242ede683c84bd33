//! Image processing for uploaded media.
//!
//! # Responsibility
//! - Derive bounded thumbnails and rotate stored images.
//! - Extract visual descriptors for natively stored images.

use crate::repo::RepoError;
use crate::storage::AssetError;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod features;
pub mod thumbnail;

pub type MediaResult<T> = Result<T, MediaError>;

#[derive(Debug)]
pub enum MediaError {
    /// Rotation not a multiple of 90 degrees.
    InvalidRotation(u32),
    /// Thumbnail bounds must be positive.
    InvalidBounds { max_width: u32, max_height: u32 },
    Image(image::ImageError),
    Asset(AssetError),
    Repo(RepoError),
    Io(std::io::Error),
}

impl Display for MediaError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidRotation(degrees) => write!(
                f,
                "rotation must be a multiple of 90 degrees, got {degrees}"
            ),
            Self::InvalidBounds {
                max_width,
                max_height,
            } => write!(
                f,
                "thumbnail bounds must be positive, got {max_width}x{max_height}"
            ),
            Self::Image(err) => write!(f, "{err}"),
            Self::Asset(err) => write!(f, "{err}"),
            Self::Repo(err) => write!(f, "{err}"),
            Self::Io(err) => write!(f, "{err}"),
        }
    }
}

impl Error for MediaError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Image(err) => Some(err),
            Self::Asset(err) => Some(err),
            Self::Repo(err) => Some(err),
            Self::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<image::ImageError> for MediaError {
    fn from(value: image::ImageError) -> Self {
        Self::Image(value)
    }
}

impl From<AssetError> for MediaError {
    fn from(value: AssetError) -> Self {
        Self::Asset(value)
    }
}

impl From<RepoError> for MediaError {
    fn from(value: RepoError) -> Self {
        Self::Repo(value)
    }
}

impl From<std::io::Error> for MediaError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}
