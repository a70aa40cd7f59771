//! Animated GIF89a output.
//!
//! [`StreamingGifEncoder`] writes a document block by block into any
//! `std::io::Write` sink, so memory stays bounded by one frame's indices.
//! [`GifDocument`] collects frames first and drives the encoder in one call.
//!
//! The container layout and LZW compression come from the `gif` crate; this
//! module owns the lifecycle rules, the fixed palette and the color mapping.

mod document;
mod encoder;

use std::io;

use thiserror::Error;

use crate::palette::DEFAULT_QUALITY;
use crate::pipeline::DEFAULT_DELAY_MS;

pub use document::GifDocument;
pub use encoder::StreamingGifEncoder;

/// Lifecycle of a [`StreamingGifEncoder`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncoderState {
    /// Sink attached, nothing written.
    Created,
    /// Header, screen descriptor and palette written.
    Started,
    /// Loop settings written; frames accepted.
    Configured,
    /// Trailer written; the sink is complete.
    Finished,
    /// A write failed; the output is unusable.
    Failed,
}

/// Errors from GIF encoding.
#[derive(Debug, Error)]
pub enum GifError {
    /// The operation is not allowed in the current state.
    #[error("cannot {operation} in state {state:?}")]
    InvalidState {
        operation: &'static str,
        state: EncoderState,
    },

    /// Frames were added after `finish`.
    #[error("encoder already finished")]
    EncoderClosed,

    /// Canvas dimensions must be 1..=65535.
    #[error("invalid canvas size {width}x{height}")]
    InvalidDimensions { width: u32, height: u32 },

    /// A frame does not match the canvas.
    #[error("frame is {actual:?}, canvas is {expected:?}")]
    FrameSizeMismatch {
        expected: (u32, u32),
        actual: (u32, u32),
    },

    /// A document without frames cannot be encoded.
    #[error("document has no frames")]
    EmptyDocument,

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The `gif` crate rejected the data.
    #[error("encoding error: {0}")]
    Encoding(String),
}

impl From<::gif::EncodingError> for GifError {
    fn from(err: ::gif::EncodingError) -> Self {
        match err {
            ::gif::EncodingError::Io(e) => GifError::Io(e),
            other => GifError::Encoding(other.to_string()),
        }
    }
}

/// Document-level settings written by `configure`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GifSettings {
    /// `Some(0)` loops forever, `Some(n)` repeats `n` times, `None` plays
    /// once (no looping extension).
    pub loop_count: Option<u16>,
    /// Delay used for frames whose own delay is zero.
    pub frame_delay_ms: u32,
    /// Palette matching quality, 1 (best) to 30 (fastest).
    pub quality: u8,
}

impl Default for GifSettings {
    fn default() -> Self {
        Self {
            loop_count: Some(0),
            frame_delay_ms: DEFAULT_DELAY_MS,
            quality: DEFAULT_QUALITY,
        }
    }
}

/// Convert milliseconds to GIF centiseconds, rounded, at least 1.
pub fn delay_to_centis(delay_ms: u32) -> u16 {
    (delay_ms.saturating_add(5) / 10).clamp(1, u16::MAX as u32) as u16
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delay_to_centis() {
        assert_eq!(delay_to_centis(500), 50);
        assert_eq!(delay_to_centis(104), 10);
        assert_eq!(delay_to_centis(105), 11);
        assert_eq!(delay_to_centis(1), 1);
        assert_eq!(delay_to_centis(0), 1);
        assert_eq!(delay_to_centis(u32::MAX), u16::MAX);
    }

    #[test]
    fn test_default_settings() {
        let settings = GifSettings::default();
        assert_eq!(settings.loop_count, Some(0));
        assert_eq!(settings.frame_delay_ms, 500);
        assert_eq!(settings.quality, 10);
    }
}
