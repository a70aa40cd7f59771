//! Resizing into a target box.
//!
//! Provides cover/contain/fill fitting using the `image` crate's resampling
//! filters plus a centered crop. All functions return new `PixelBuffer`
//! instances without modifying the input.

use super::{FilterType, FitMode, PixelBuffer, PixelError};

impl PixelBuffer {
    /// Resize into a `width` x `height` box using the default bilinear filter.
    ///
    /// See [`resize`] for fitting semantics.
    pub fn resize(&self, width: u32, height: u32, fit: FitMode) -> Result<PixelBuffer, PixelError> {
        resize(self, width, height, fit, FilterType::default())
    }
}

/// Resize an image into a target box.
///
/// * `Cover` - crops the source to the box's aspect ratio around its center,
///   then scales that region to exactly `width` x `height`.
/// * `Contain` - scales so the image fits inside the box, preserving aspect
///   ratio. The result may be smaller than the box on one axis.
/// * `Fill` - stretches to exactly `width` x `height`.
///
/// # Arguments
///
/// * `image` - Source buffer, left untouched
/// * `width`, `height` - Target box in pixels
/// * `fit` - How the source aspect ratio is reconciled with the box
/// * `filter` - Resampling kernel
///
/// # Returns
///
/// A new buffer. No intermediate buffer is larger than the source or the box,
/// whatever the source's aspect ratio.
///
/// # Errors
///
/// Returns `PixelError::InvalidDimensions` if either target dimension is zero.
pub fn resize(
    image: &PixelBuffer,
    width: u32,
    height: u32,
    fit: FitMode,
    filter: FilterType,
) -> Result<PixelBuffer, PixelError> {
    if width == 0 || height == 0 {
        return Err(PixelError::InvalidDimensions { width, height });
    }

    match fit {
        FitMode::Fill => resize_exact(image, width, height, filter),
        FitMode::Contain => {
            let (w, h) = contain_extent(image.width(), image.height(), width, height);
            resize_exact(image, w, h, filter)
        }
        FitMode::Cover => {
            let (w, h) = cover_crop(image.width(), image.height(), width, height);
            let region = crop_centered(image, w, h)?;
            resize_exact(&region, width, height, filter)
        }
    }
}

/// Scale to `width` x `height` with no regard for aspect ratio.
///
/// # Returns
///
/// A clone when the source already has the requested size, otherwise a new
/// resampled buffer.
///
/// # Errors
///
/// Returns `PixelError::InvalidDimensions` if either target dimension is zero.
pub fn resize_exact(
    image: &PixelBuffer,
    width: u32,
    height: u32,
    filter: FilterType,
) -> Result<PixelBuffer, PixelError> {
    if width == 0 || height == 0 {
        return Err(PixelError::InvalidDimensions { width, height });
    }

    if image.dimensions() == (width, height) {
        return Ok(image.clone());
    }

    let source = image.to_rgb_image().ok_or(PixelError::InvalidPixelData {
        expected: image.pixel_count() * 3,
        actual: image.byte_size(),
    })?;
    PixelBuffer::from_rgb_image(image::imageops::resize(
        &source,
        width,
        height,
        filter.to_image_filter(),
    ))
}

/// Crop a `width` x `height` region from the center of `image`.
///
/// The overflow is split evenly between both sides; with an odd overflow the
/// extra pixel is dropped from the right/bottom edge.
///
/// # Arguments
///
/// * `image` - Source buffer
/// * `width`, `height` - Size of the region to keep, at most the source size
///
/// # Errors
///
/// Returns `PixelError::InvalidDimensions` if the region is empty or larger
/// than `image` on either axis.
pub fn crop_centered(image: &PixelBuffer, width: u32, height: u32) -> Result<PixelBuffer, PixelError> {
    if width == 0 || height == 0 || width > image.width() || height > image.height() {
        return Err(PixelError::InvalidDimensions { width, height });
    }
    if image.dimensions() == (width, height) {
        return Ok(image.clone());
    }

    let left = (image.width() - width) / 2;
    let top = (image.height() - height) / 2;
    let src_stride = image.width() as usize * 3;
    let row_len = width as usize * 3;
    let src = image.pixels();

    let mut output = Vec::with_capacity(row_len * height as usize);
    for y in 0..height as usize {
        let start = (top as usize + y) * src_stride + left as usize * 3;
        output.extend_from_slice(&src[start..start + row_len]);
    }

    PixelBuffer::new(width, height, output)
}

/// Largest centered source region with the target box's aspect ratio.
fn cover_crop(width: u32, height: u32, target_w: u32, target_h: u32) -> (u32, u32) {
    let (w, h) = (width as u64, height as u64);
    let (tw, th) = (target_w as u64, target_h as u64);
    if w * th > h * tw {
        let crop_w = ((h * tw + th / 2) / th).clamp(1, w);
        (crop_w as u32, height)
    } else {
        let crop_h = ((w * th + tw / 2) / tw).clamp(1, h);
        (width, crop_h as u32)
    }
}

/// Dimensions that fit inside the target box while preserving aspect ratio.
fn contain_extent(width: u32, height: u32, target_w: u32, target_h: u32) -> (u32, u32) {
    let scale = (target_w as f64 / width as f64).min(target_h as f64 / height as f64);
    let w = ((width as f64 * scale).round() as u32).clamp(1, target_w);
    let h = ((height as f64 * scale).round() as u32).clamp(1, target_h);
    (w, h)
}
