//! Whole-document GIF encoding.

use std::io::Write;

use crate::palette::{Palette, PaletteBuilder};
use crate::pipeline::{Frame, DEFAULT_DELAY_MS};

use super::{GifError, GifSettings, StreamingGifEncoder};

/// An animation held in memory: canvas size, loop count, palette and frames.
///
/// Every frame has the canvas dimensions; [`GifDocument::push_frame`]
/// rejects anything else.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GifDocument {
    width: u32,
    height: u32,
    loop_count: Option<u16>,
    palette: Palette,
    frames: Vec<Frame>,
}

impl GifDocument {
    /// Empty document that loops forever.
    pub fn new(width: u32, height: u32) -> Result<Self, GifError> {
        if width == 0 || height == 0 || width > u16::MAX as u32 || height > u16::MAX as u32 {
            return Err(GifError::InvalidDimensions { width, height });
        }
        Ok(Self {
            width,
            height,
            loop_count: Some(0),
            palette: PaletteBuilder::build(),
            frames: Vec::new(),
        })
    }

    /// Build from frames, taking the canvas size from the first one.
    pub fn from_frames(frames: Vec<Frame>) -> Result<Self, GifError> {
        let first = frames.first().ok_or(GifError::EmptyDocument)?;
        let mut doc = Self::new(first.width(), first.height())?;
        for frame in frames {
            doc.push_frame(frame)?;
        }
        Ok(doc)
    }

    pub fn with_loop_count(mut self, loop_count: Option<u16>) -> Self {
        self.loop_count = loop_count;
        self
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn loop_count(&self) -> Option<u16> {
        self.loop_count
    }

    pub fn palette(&self) -> &Palette {
        &self.palette
    }

    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Append a frame that matches the canvas.
    pub fn push_frame(&mut self, frame: Frame) -> Result<(), GifError> {
        if (frame.width(), frame.height()) != (self.width, self.height) {
            return Err(GifError::FrameSizeMismatch {
                expected: (self.width, self.height),
                actual: (frame.width(), frame.height()),
            });
        }
        self.frames.push(frame);
        Ok(())
    }

    /// Stream the document into `sink` and return it.
    pub fn encode_to<W: Write>(&self, sink: W, quality: u8) -> Result<W, GifError> {
        if self.frames.is_empty() {
            return Err(GifError::EmptyDocument);
        }

        let mut encoder = StreamingGifEncoder::with_palette(sink, self.palette.clone());
        encoder.start(self.width, self.height)?;
        encoder.configure(GifSettings {
            loop_count: self.loop_count,
            frame_delay_ms: DEFAULT_DELAY_MS,
            quality,
        })?;
        for frame in &self.frames {
            encoder.add_frame(frame)?;
        }
        encoder.into_inner()
    }

    /// Encode into a new byte vector.
    pub fn encode(&self, quality: u8) -> Result<Vec<u8>, GifError> {
        self.encode_to(Vec::new(), quality)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effects::Effect;
    use crate::pixel::PixelBuffer;

    fn frame(w: u32, h: u32, rgb: [u8; 3], index: usize) -> Frame {
        Frame::new(PixelBuffer::filled(w, h, rgb).unwrap(), 200, index, Effect::Original)
    }

    #[test]
    fn test_push_frame_checks_size() {
        let mut doc = GifDocument::new(8, 8).unwrap();
        doc.push_frame(frame(8, 8, [0, 0, 0], 0)).unwrap();
        assert!(matches!(
            doc.push_frame(frame(8, 9, [0, 0, 0], 1)),
            Err(GifError::FrameSizeMismatch { .. })
        ));
        assert_eq!(doc.len(), 1);
    }

    #[test]
    fn test_invalid_canvas() {
        assert!(GifDocument::new(0, 4).is_err());
        assert!(GifDocument::new(4, 65_536).is_err());
    }

    #[test]
    fn test_from_frames_requires_one() {
        assert!(matches!(
            GifDocument::from_frames(Vec::new()),
            Err(GifError::EmptyDocument)
        ));
    }

    #[test]
    fn test_encode_empty_rejected() {
        let doc = GifDocument::new(4, 4).unwrap();
        assert!(matches!(doc.encode(10), Err(GifError::EmptyDocument)));
    }

    #[test]
    fn test_encode_matches_streaming() {
        let frames = vec![frame(6, 6, [255, 0, 0], 0), frame(6, 6, [0, 255, 0], 1)];
        let doc = GifDocument::from_frames(frames.clone()).unwrap();

        let mut encoder = StreamingGifEncoder::new(Vec::new());
        encoder.start(6, 6).unwrap();
        encoder.configure(GifSettings::default()).unwrap();
        for f in &frames {
            encoder.add_frame(f).unwrap();
        }
        let streamed = encoder.into_inner().unwrap();

        assert_eq!(doc.encode(10).unwrap(), streamed);
    }

    #[test]
    fn test_encode_is_deterministic() {
        let doc = GifDocument::from_frames(vec![frame(5, 3, [10, 20, 30], 0)])
            .unwrap()
            .with_loop_count(Some(2));
        assert_eq!(doc.encode(1).unwrap(), doc.encode(1).unwrap());
    }
}
