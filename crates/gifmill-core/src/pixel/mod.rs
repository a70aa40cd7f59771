//! Canonical in-memory image representation.
//!
//! This module provides:
//! - `PixelBuffer`, an immutable packed RGB8 image
//! - Decoding from common containers (PNG, JPEG, GIF) with EXIF orientation
//! - Cover/contain/fill resizing with a centered crop
//! - PNG/JPEG encoding at the system boundary
//!
//! # Examples
//!
//! ```ignore
//! use gifmill_core::pixel::{FitMode, PixelBuffer};
//!
//! let bytes = std::fs::read("photo.jpg").unwrap();
//! let image = PixelBuffer::decode(&bytes).unwrap();
//! let square = image.resize(256, 256, FitMode::Cover).unwrap();
//! ```

mod decode;
mod encode;
mod resize;
mod types;

pub use decode::{decode, decode_no_orientation, get_orientation};
pub use encode::{encode_jpeg, encode_png};
pub use resize::{crop_centered, resize, resize_exact};
pub use types::{FilterType, FitMode, Orientation, PixelBuffer, PixelError};
