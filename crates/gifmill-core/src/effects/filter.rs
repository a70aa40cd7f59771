//! Neighbourhood filters: Gaussian blur via `image::imageops` and a 3x3
//! convolution for sharpening.

use crate::pixel::PixelBuffer;

use super::TransformError;

/// Gaussian sigma used by the blur effect.
pub const BLUR_SIGMA: f32 = 5.0;

/// 3x3 sharpening kernel (row-major).
pub const SHARPEN_KERNEL: [f32; 9] = [0.0, -1.0, 0.0, -1.0, 5.0, -1.0, 0.0, -1.0, 0.0];

/// Gaussian blur with the given sigma.
pub fn blur(image: &PixelBuffer, sigma: f32) -> Result<PixelBuffer, TransformError> {
    if !sigma.is_finite() || sigma <= 0.0 {
        return Err(TransformError::InvalidParameter(format!(
            "blur sigma must be positive, got {}",
            sigma
        )));
    }
    let rgb = image.to_rgb_image().ok_or(TransformError::InvalidInput)?;
    let blurred = image::imageops::blur(&rgb, sigma);
    Ok(PixelBuffer::from_rgb_image(blurred)?)
}

/// Convolve with a 3x3 kernel. Edge pixels use clamped neighbours, so the
/// border is filtered like the interior.
pub fn convolve3x3(image: &PixelBuffer, kernel: &[f32; 9]) -> Result<PixelBuffer, TransformError> {
    let (width, height) = (image.width() as i64, image.height() as i64);
    let src = image.pixels();
    let mut out = Vec::with_capacity(src.len());

    for y in 0..height {
        for x in 0..width {
            let mut acc = [0.0f32; 3];
            for (tap, weight) in kernel.iter().enumerate() {
                let sx = (x + tap as i64 % 3 - 1).clamp(0, width - 1);
                let sy = (y + tap as i64 / 3 - 1).clamp(0, height - 1);
                let idx = ((sy * width + sx) * 3) as usize;
                for (c, value) in acc.iter_mut().enumerate() {
                    *value += src[idx + c] as f32 * weight;
                }
            }
            out.extend(acc.iter().map(|v| v.clamp(0.0, 255.0).round() as u8));
        }
    }

    Ok(PixelBuffer::new(image.width(), image.height(), out)?)
}

/// Sharpen with [`SHARPEN_KERNEL`].
pub fn sharpen(image: &PixelBuffer) -> Result<PixelBuffer, TransformError> {
    convolve3x3(image, &SHARPEN_KERNEL)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn checkerboard(size: u32) -> PixelBuffer {
        let mut pixels = Vec::with_capacity((size * size * 3) as usize);
        for y in 0..size {
            for x in 0..size {
                let v = if (x + y) % 2 == 0 { 255 } else { 0 };
                pixels.extend_from_slice(&[v, v, v]);
            }
        }
        PixelBuffer::new(size, size, pixels).unwrap()
    }

    fn spread(image: &PixelBuffer) -> u8 {
        let min = image.pixels().iter().min().copied().unwrap_or(0);
        let max = image.pixels().iter().max().copied().unwrap_or(0);
        max - min
    }

    #[test]
    fn test_blur_smooths_checkerboard() {
        let img = checkerboard(16);
        let out = blur(&img, BLUR_SIGMA).unwrap();

        assert_eq!(out.dimensions(), (16, 16));
        assert!(spread(&out) < spread(&img));
    }

    #[test]
    fn test_blur_rejects_bad_sigma() {
        let img = checkerboard(4);
        assert!(matches!(
            blur(&img, 0.0),
            Err(TransformError::InvalidParameter(_))
        ));
        assert!(blur(&img, f32::NAN).is_err());
    }

    #[test]
    fn test_blur_is_deterministic() {
        let img = checkerboard(8);
        assert_eq!(blur(&img, 2.0).unwrap(), blur(&img, 2.0).unwrap());
    }

    #[test]
    fn test_sharpen_flat_image_unchanged() {
        // Kernel sums to 1, so a flat field is a fixed point
        let img = PixelBuffer::filled(6, 6, [100, 150, 200]).unwrap();
        assert_eq!(sharpen(&img).unwrap(), img);
    }

    #[test]
    fn test_sharpen_keeps_dimensions() {
        let img = checkerboard(9);
        assert_eq!(sharpen(&img).unwrap().dimensions(), (9, 9));
    }
}
