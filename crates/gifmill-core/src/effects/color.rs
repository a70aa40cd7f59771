//! Per-pixel color effects.
//!
//! Each function maps every pixel independently and returns a new buffer.

use crate::luminance::luma_u8;
use crate::pixel::PixelBuffer;

/// Standard sepia color matrix (rows produce R, G, B).
pub const SEPIA_MATRIX: [[f32; 3]; 3] = [
    [0.393, 0.769, 0.189],
    [0.349, 0.686, 0.168],
    [0.272, 0.534, 0.131],
];

/// Contrast multiplier around mid-gray.
pub const CONTRAST_FACTOR: f32 = 1.5;

/// Replace every channel with the pixel's BT.601 luma.
pub fn grayscale(image: &PixelBuffer) -> PixelBuffer {
    image.map_pixels(|[r, g, b]| {
        let y = luma_u8(r, g, b);
        [y, y, y]
    })
}

/// `255 - channel` for every channel.
pub fn invert(image: &PixelBuffer) -> PixelBuffer {
    image.map_pixels(|[r, g, b]| [255 - r, 255 - g, 255 - b])
}

/// Apply the sepia matrix, clamping to the valid range.
pub fn sepia(image: &PixelBuffer) -> PixelBuffer {
    image.map_pixels(|rgb| recombine(rgb, &SEPIA_MATRIX))
}

/// Apply a 3x3 recombination matrix to one pixel.
#[inline]
pub fn recombine(rgb: [u8; 3], matrix: &[[f32; 3]; 3]) -> [u8; 3] {
    let [r, g, b] = rgb.map(|c| c as f32);
    matrix.map(|row| to_channel(row[0] * r + row[1] * g + row[2] * b))
}

/// Linear contrast stretch around mid-gray.
///
/// Formula: `output = (input - 0.5) * factor + 0.5` on normalized channels.
pub fn contrast(image: &PixelBuffer, factor: f32) -> PixelBuffer {
    image.map_pixels(|rgb| {
        rgb.map(|c| {
            let v = c as f32 / 255.0;
            to_channel(((v - 0.5) * factor + 0.5) * 255.0)
        })
    })
}

#[inline]
fn to_channel(v: f32) -> u8 {
    v.clamp(0.0, 255.0).round() as u8
}
