//! Source image decoding.

use std::io::Cursor;

use exif::{In, Reader, Tag};
use image::{DynamicImage, ImageReader};

use super::{Orientation, PixelBuffer, PixelError};

/// Decode any container the `image` crate recognizes (PNG, JPEG, GIF) into an
/// upright RGB8 buffer.
///
/// The format is sniffed from the leading bytes. Animated inputs contribute
/// their first frame, and an EXIF `Orientation` tag, when present, is undone
/// so the result looks the way a viewer would show it.
///
/// # Errors
///
/// `PixelError::Decode` for unrecognized, empty or truncated input.
pub fn decode(bytes: &[u8]) -> Result<PixelBuffer, PixelError> {
    let orientation = read_exif_orientation(bytes);
    let upright = orient(sniff_and_decode(bytes)?, orientation);
    PixelBuffer::from_rgb_image(upright.into_rgb8())
}

/// Like [`decode`], but keeps pixels in stored order.
pub fn decode_no_orientation(bytes: &[u8]) -> Result<PixelBuffer, PixelError> {
    PixelBuffer::from_rgb_image(sniff_and_decode(bytes)?.into_rgb8())
}

/// The EXIF orientation of `bytes`; upright when there is no EXIF block.
pub fn get_orientation(bytes: &[u8]) -> Orientation {
    read_exif_orientation(bytes)
}

fn sniff_and_decode(bytes: &[u8]) -> Result<DynamicImage, PixelError> {
    let decode_err = |e: image::ImageError| PixelError::Decode(e.to_string());
    ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| PixelError::Decode(e.to_string()))?
        .decode()
        .map_err(decode_err)
}

fn read_exif_orientation(bytes: &[u8]) -> Orientation {
    let Ok(exif) = Reader::new().read_from_container(&mut Cursor::new(bytes)) else {
        return Orientation::Upright;
    };
    exif.get_field(Tag::Orientation, In::PRIMARY)
        .and_then(|field| field.value.get_uint(0))
        .map(Orientation::from_tag)
        .unwrap_or_default()
}

fn orient(img: DynamicImage, orientation: Orientation) -> DynamicImage {
    use Orientation::*;
    match orientation {
        Upright => img,
        Mirrored => img.fliph(),
        UpsideDown => img.rotate180(),
        MirroredUpsideDown => img.flipv(),
        Transposed => img.rotate90().fliph(),
        RotatedLeft => img.rotate90(),
        Transversed => img.rotate270().fliph(),
        RotatedRight => img.rotate270(),
    }
}
