//! Image decoding with a format-specific fast path.
//!
//! JPEG goes through zune-jpeg (noticeably faster on large scans) and falls
//! back to the image crate if zune rejects the stream; everything else is
//! decoded by the image crate directly.

use super::mmap_decode::validate_image_header;
use super::InputFormat;
use crate::error::LoadError;
use image::{DynamicImage, ImageBuffer, Luma, Rgb, Rgba};
use std::path::Path;
use zune_core::colorspace::ColorSpace;
use zune_core::options::DecoderOptions;
use zune_jpeg::JpegDecoder;

/// Decoder that dispatches on the (hinted or sniffed) input format
pub struct FastDecoder;

impl FastDecoder {
    /// Decode an in-memory image.
    ///
    /// With `InputFormat::Auto` the header must look like a known raster
    /// format; an explicit hint skips sniffing and forces that decoder.
    pub fn decode(bytes: &[u8], path: &Path, hint: InputFormat) -> Result<DynamicImage, LoadError> {
        let format = match hint {
            InputFormat::Auto => {
                if !validate_image_header(bytes) {
                    return Err(LoadError::UnrecognisedFormat {
                        path: path.to_path_buf(),
                    });
                }
                InputFormat::sniff(bytes)
            }
            explicit => explicit,
        };

        match format {
            InputFormat::Jpeg => {
                Self::decode_jpeg(bytes, path).or_else(|_| Self::decode_fallback(bytes, path, format))
            }
            _ => Self::decode_fallback(bytes, path, format),
        }
    }

    /// JPEG decoding using zune-jpeg
    fn decode_jpeg(bytes: &[u8], path: &Path) -> Result<DynamicImage, LoadError> {
        let options = DecoderOptions::new_fast().jpeg_set_out_colorspace(ColorSpace::RGB);
        let mut decoder = JpegDecoder::new_with_options(bytes, options);

        let pixels = decoder.decode().map_err(|e| LoadError::Decode {
            path: path.to_path_buf(),
            reason: format!("zune-jpeg decode failed: {:?}", e),
        })?;

        let info = decoder.info().ok_or_else(|| LoadError::Decode {
            path: path.to_path_buf(),
            reason: "missing JPEG frame info".to_string(),
        })?;

        let width = info.width as u32;
        let height = info.height as u32;
        let buffer_error = || LoadError::Decode {
            path: path.to_path_buf(),
            reason: "decoded buffer does not match frame size".to_string(),
        };

        let out_colorspace = decoder.get_output_colorspace().unwrap_or(ColorSpace::RGB);

        let image = match out_colorspace {
            ColorSpace::RGB => {
                let buffer: ImageBuffer<Rgb<u8>, Vec<u8>> =
                    ImageBuffer::from_raw(width, height, pixels).ok_or_else(buffer_error)?;
                DynamicImage::ImageRgb8(buffer)
            }
            ColorSpace::RGBA => {
                let buffer: ImageBuffer<Rgba<u8>, Vec<u8>> =
                    ImageBuffer::from_raw(width, height, pixels).ok_or_else(buffer_error)?;
                DynamicImage::ImageRgba8(buffer)
            }
            ColorSpace::Luma => {
                let buffer: ImageBuffer<Luma<u8>, Vec<u8>> =
                    ImageBuffer::from_raw(width, height, pixels).ok_or_else(buffer_error)?;
                DynamicImage::ImageLuma8(buffer)
            }
            _ => return Self::decode_fallback(bytes, path, InputFormat::Jpeg),
        };

        Ok(image)
    }

    /// Decode with the image crate, forcing the format when one is known
    fn decode_fallback(
        bytes: &[u8],
        path: &Path,
        format: InputFormat,
    ) -> Result<DynamicImage, LoadError> {
        let decoded = match format.image_format() {
            Some(format) => image::load_from_memory_with_format(bytes, format),
            None => image::load_from_memory(bytes),
        };

        decoded.map_err(|e| LoadError::Decode {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }
}
