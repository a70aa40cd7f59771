//! `PixelBuffer` and the small enums that travel with it.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PixelError {
    #[error("image size {width}x{height} has a zero edge")]
    InvalidDimensions { width: u32, height: u32 },

    /// The byte vector is not `width * height * 3` long.
    #[error("RGB buffer holds {actual} bytes where {expected} were expected")]
    InvalidPixelData { expected: usize, actual: usize },

    #[error("could not decode image: {0}")]
    Decode(String),

    #[error("could not encode image: {0}")]
    Encode(String),
}

/// Resampling kernel used when scaling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterType {
    Nearest,
    /// Triangle kernel. Good enough for frames of a few hundred pixels.
    #[default]
    Bilinear,
    Lanczos3,
}

impl FilterType {
    pub fn to_image_filter(self) -> image::imageops::FilterType {
        use image::imageops::FilterType as Kernel;
        match self {
            Self::Nearest => Kernel::Nearest,
            Self::Bilinear => Kernel::Triangle,
            Self::Lanczos3 => Kernel::Lanczos3,
        }
    }
}

/// How a buffer is fitted into a target box.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FitMode {
    /// Scale to cover the whole box, cropping the overflow symmetrically.
    #[default]
    Cover,
    /// Scale to fit inside the box, preserving aspect ratio (no crop).
    Contain,
    /// Stretch to the exact box, ignoring aspect ratio.
    Fill,
}

/// The eight values of the EXIF `Orientation` tag, named by the operation
/// that brings the stored pixels upright.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Orientation {
    #[default]
    Upright,
    Mirrored,
    UpsideDown,
    MirroredUpsideDown,
    /// Mirrored along the main diagonal.
    Transposed,
    RotatedLeft,
    /// Mirrored along the anti-diagonal.
    Transversed,
    RotatedRight,
}

impl Orientation {
    const BY_TAG: [Orientation; 8] = [
        Self::Upright,
        Self::Mirrored,
        Self::UpsideDown,
        Self::MirroredUpsideDown,
        Self::Transposed,
        Self::RotatedLeft,
        Self::Transversed,
        Self::RotatedRight,
    ];

    /// Look up a raw tag value; anything outside 1..=8 counts as upright.
    pub fn from_tag(tag: u32) -> Self {
        tag.checked_sub(1)
            .and_then(|i| Self::BY_TAG.get(i as usize))
            .copied()
            .unwrap_or_default()
    }
}

/// An immutable RGB8 image.
///
/// Pixels are packed row-major, 3 bytes per pixel, without row padding.
/// The length invariant `width * height * 3` is checked on construction and
/// there is no way to mutate a buffer afterwards: every effect, resize or
/// crop produces a new `PixelBuffer`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelBuffer {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl PixelBuffer {
    /// Wrap packed RGB bytes, rejecting zero edges and a wrong length.
    pub fn new(width: u32, height: u32, pixels: Vec<u8>) -> Result<Self, PixelError> {
        if width == 0 || height == 0 {
            return Err(PixelError::InvalidDimensions { width, height });
        }
        let expected = width as usize * height as usize * 3;
        if pixels.len() != expected {
            return Err(PixelError::InvalidPixelData {
                expected,
                actual: pixels.len(),
            });
        }
        Ok(Self {
            width,
            height,
            pixels,
        })
    }

    /// Create a buffer of a single solid color.
    pub fn filled(width: u32, height: u32, rgb: [u8; 3]) -> Result<Self, PixelError> {
        let count = width as usize * height as usize;
        let pixels = rgb.iter().copied().cycle().take(count * 3).collect();
        Self::new(width, height, pixels)
    }

    /// Take ownership of an `image::RgbImage`'s storage.
    pub fn from_rgb_image(img: image::RgbImage) -> Result<Self, PixelError> {
        let (width, height) = img.dimensions();
        Self::new(width, height, img.into_raw())
    }

    /// Copy into an `image::RgbImage`.
    pub fn to_rgb_image(&self) -> Option<image::RgbImage> {
        image::RgbImage::from_raw(self.width, self.height, self.pixels.clone())
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// `(width, height)`
    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Raw RGB bytes, row-major.
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// The RGB triple at `(x, y)`, or `None` when out of bounds.
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 3]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let idx = (y as usize * self.width as usize + x as usize) * 3;
        Some([self.pixels[idx], self.pixels[idx + 1], self.pixels[idx + 2]])
    }

    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// Length of the packed RGB data.
    pub fn byte_size(&self) -> usize {
        self.pixels.len()
    }

    /// Consume the buffer, returning the backing bytes.
    pub fn into_raw(self) -> Vec<u8> {
        self.pixels
    }

    /// Produce a new buffer by mapping every pixel through `f`.
    pub fn map_pixels<F>(&self, mut f: F) -> Self
    where
        F: FnMut([u8; 3]) -> [u8; 3],
    {
        let mut out = Vec::with_capacity(self.pixels.len());
        for chunk in self.pixels.chunks_exact(3) {
            out.extend_from_slice(&f([chunk[0], chunk[1], chunk[2]]));
        }
        Self {
            width: self.width,
            height: self.height,
            pixels: out,
        }
    }
}
