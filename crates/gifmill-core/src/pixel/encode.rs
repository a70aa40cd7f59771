//! Still-image encoding at the system boundary.
//!
//! Frames are normally written through the GIF encoder; these helpers exist
//! for previews and for producing source images in tests and tooling.

use std::io::Cursor;

use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::{ExtendedColorType, ImageEncoder};

use super::{PixelBuffer, PixelError};

/// Encode a buffer as PNG bytes.
pub fn encode_png(image: &PixelBuffer) -> Result<Vec<u8>, PixelError> {
    let mut buffer = Cursor::new(Vec::new());

    PngEncoder::new(&mut buffer)
        .write_image(
            image.pixels(),
            image.width(),
            image.height(),
            ExtendedColorType::Rgb8,
        )
        .map_err(|e| PixelError::Encode(e.to_string()))?;

    Ok(buffer.into_inner())
}

/// Encode a buffer as JPEG bytes.
///
/// `quality` is clamped to 1-100, where 100 is highest quality.
pub fn encode_jpeg(image: &PixelBuffer, quality: u8) -> Result<Vec<u8>, PixelError> {
    let quality = quality.clamp(1, 100);
    let mut buffer = Cursor::new(Vec::new());

    JpegEncoder::new_with_quality(&mut buffer, quality)
        .write_image(
            image.pixels(),
            image.width(),
            image.height(),
            ExtendedColorType::Rgb8,
        )
        .map_err(|e| PixelError::Encode(e.to_string()))?;

    Ok(buffer.into_inner())
}

impl PixelBuffer {
    /// Decode a buffer from any supported container. See [`super::decode`].
    pub fn decode(bytes: &[u8]) -> Result<PixelBuffer, PixelError> {
        super::decode(bytes)
    }

    /// Encode this buffer as PNG.
    pub fn encode(&self) -> Result<Vec<u8>, PixelError> {
        encode_png(self)
    }
}
