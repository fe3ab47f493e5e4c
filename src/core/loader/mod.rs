//! # Loader Module
//!
//! Reads and decodes the source image.
//!
//! The pipeline only depends on the [`ImageLoader`] trait; [`FileLoader`] is
//! the default implementation and is what the CLI uses.
//!
//! ## Performance
//! - Files of 1MB or more are memory-mapped rather than read
//! - JPEG is decoded with `zune-jpeg`, other formats with the `image` crate

pub mod fast_decode;
pub mod mmap_decode;

use crate::error::LoadError;
use fast_decode::FastDecoder;
use image::DynamicImage;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

/// Input format hint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum InputFormat {
    /// Sniff the format from the file header
    #[default]
    Auto,
    Png,
    Jpeg,
    Bmp,
    Gif,
    Tiff,
    WebP,
}

impl InputFormat {
    /// Guess the format from magic bytes, `Auto` if unknown
    pub fn sniff(bytes: &[u8]) -> Self {
        match image::guess_format(bytes) {
            Ok(image::ImageFormat::Png) => InputFormat::Png,
            Ok(image::ImageFormat::Jpeg) => InputFormat::Jpeg,
            Ok(image::ImageFormat::Bmp) => InputFormat::Bmp,
            Ok(image::ImageFormat::Gif) => InputFormat::Gif,
            Ok(image::ImageFormat::Tiff) => InputFormat::Tiff,
            Ok(image::ImageFormat::WebP) => InputFormat::WebP,
            _ => InputFormat::Auto,
        }
    }

    /// The matching `image` crate format, if this is not `Auto`
    pub fn image_format(&self) -> Option<image::ImageFormat> {
        match self {
            InputFormat::Auto => None,
            InputFormat::Png => Some(image::ImageFormat::Png),
            InputFormat::Jpeg => Some(image::ImageFormat::Jpeg),
            InputFormat::Bmp => Some(image::ImageFormat::Bmp),
            InputFormat::Gif => Some(image::ImageFormat::Gif),
            InputFormat::Tiff => Some(image::ImageFormat::Tiff),
            InputFormat::WebP => Some(image::ImageFormat::WebP),
        }
    }
}

impl std::fmt::Display for InputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InputFormat::Auto => write!(f, "auto"),
            InputFormat::Png => write!(f, "png"),
            InputFormat::Jpeg => write!(f, "jpeg"),
            InputFormat::Bmp => write!(f, "bmp"),
            InputFormat::Gif => write!(f, "gif"),
            InputFormat::Tiff => write!(f, "tiff"),
            InputFormat::WebP => write!(f, "webp"),
        }
    }
}

/// Produces a decoded image for the pipeline
pub trait ImageLoader: Send + Sync {
    /// Load and decode the image at `path`
    fn load(&self, path: &Path) -> Result<DynamicImage, LoadError>;
}

/// Loads images from the filesystem
#[derive(Debug, Clone, Default)]
pub struct FileLoader {
    format: InputFormat,
}

impl FileLoader {
    /// Create a loader with the given format hint
    pub fn new(format: InputFormat) -> Self {
        Self { format }
    }
}

impl ImageLoader for FileLoader {
    fn load(&self, path: &Path) -> Result<DynamicImage, LoadError> {
        let bytes = mmap_decode::read_file_bytes(path)?;
        debug!(
            path = %path.display(),
            size = bytes.len(),
            mapped = bytes.is_mapped(),
            hint = %self.format,
            "read source image"
        );

        let image = FastDecoder::decode(&bytes, path, self.format)?;

        if image.width() == 0 || image.height() == 0 {
            return Err(LoadError::EmptyImage {
                path: path.to_path_buf(),
            });
        }

        Ok(image)
    }
}
