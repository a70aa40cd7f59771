//! Streaming GIF encoder with an explicit lifecycle.
//!
//! ```text
//! Created --start--> Started --configure--> Configured --add_frame*--+
//!                       |                        |                    |
//!                       +-------finish-----------+-----finish---------+--> Finished
//! ```
//!
//! Any write failure moves the encoder to `Failed`.

use std::borrow::Cow;
use std::io::Write;
use std::mem;

use ::gif::{DisposalMethod, Encoder, Repeat};

use crate::palette::{Palette, PaletteBuilder, PaletteMatcher};
use crate::pipeline::Frame;
use crate::pixel::PixelBuffer;

use super::{delay_to_centis, EncoderState, GifError, GifSettings};

enum Sink<W: Write> {
    Idle(W),
    Open(Encoder<W>),
    Done(W),
    Lost,
}

/// Writes an animated GIF into `W` one block at a time.
pub struct StreamingGifEncoder<W: Write> {
    sink: Sink<W>,
    state: EncoderState,
    palette: Palette,
    matcher: Option<PaletteMatcher>,
    settings: GifSettings,
    width: u16,
    height: u16,
    frames_written: usize,
}

impl<W: Write> StreamingGifEncoder<W> {
    /// Attach to `sink` using the fixed global palette.
    pub fn new(sink: W) -> Self {
        Self::with_palette(sink, PaletteBuilder::build())
    }

    /// Attach to `sink` with an explicit global palette.
    pub fn with_palette(sink: W, palette: Palette) -> Self {
        Self {
            sink: Sink::Idle(sink),
            state: EncoderState::Created,
            palette,
            matcher: None,
            settings: GifSettings::default(),
            width: 0,
            height: 0,
            frames_written: 0,
        }
    }

    pub fn state(&self) -> EncoderState {
        self.state
    }

    pub fn frames_written(&self) -> usize {
        self.frames_written
    }

    /// Canvas size; `(0, 0)` before `start`.
    pub fn dimensions(&self) -> (u32, u32) {
        (self.width as u32, self.height as u32)
    }

    /// Write the header, logical screen descriptor and global color table.
    ///
    /// # Errors
    ///
    /// * `InvalidState` - not in `Created`.
    /// * `InvalidDimensions` - a dimension is 0 or above 65535.
    pub fn start(&mut self, width: u32, height: u32) -> Result<(), GifError> {
        self.expect_state("start", EncoderState::Created)?;

        let (w, h) = match (u16::try_from(width), u16::try_from(height)) {
            (Ok(w), Ok(h)) if w > 0 && h > 0 => (w, h),
            _ => return Err(GifError::InvalidDimensions { width, height }),
        };

        let Sink::Idle(sink) = mem::replace(&mut self.sink, Sink::Lost) else {
            return Err(self.invalid("start"));
        };

        match Encoder::new(sink, w, h, &self.palette.as_bytes()) {
            Ok(encoder) => {
                self.sink = Sink::Open(encoder);
                self.width = w;
                self.height = h;
                self.state = EncoderState::Started;
                log::trace!("GIF started at {}x{}", w, h);
                Ok(())
            }
            Err(err) => {
                self.state = EncoderState::Failed;
                Err(err.into())
            }
        }
    }

    /// Apply document settings. Must come after `start` and before the first
    /// frame.
    pub fn configure(&mut self, settings: GifSettings) -> Result<(), GifError> {
        self.expect_state("configure", EncoderState::Started)?;

        let repeat = match settings.loop_count {
            Some(0) => Some(Repeat::Infinite),
            Some(n) => Some(Repeat::Finite(n)),
            None => None,
        };

        if let Some(repeat) = repeat {
            let Sink::Open(encoder) = &mut self.sink else {
                return Err(self.invalid("configure"));
            };
            if let Err(err) = encoder.set_repeat(repeat) {
                self.state = EncoderState::Failed;
                return Err(err.into());
            }
        }

        self.matcher = Some(PaletteMatcher::new(self.palette.clone(), settings.quality));
        self.settings = settings;
        self.state = EncoderState::Configured;
        Ok(())
    }

    /// Append a frame, using its own delay (or the configured fallback when
    /// the frame's delay is 0).
    pub fn add_frame(&mut self, frame: &Frame) -> Result<(), GifError> {
        self.add_image(&frame.image, frame.delay_ms)
    }

    /// Append a raw image shown for `delay_ms`.
    ///
    /// # Errors
    ///
    /// * `EncoderClosed` - after `finish`.
    /// * `InvalidState` - before `configure`, or after a failed write.
    /// * `FrameSizeMismatch` - `image` differs from the canvas.
    pub fn add_image(&mut self, image: &PixelBuffer, delay_ms: u32) -> Result<(), GifError> {
        if self.state == EncoderState::Finished {
            return Err(GifError::EncoderClosed);
        }
        self.expect_state("add a frame", EncoderState::Configured)?;

        if image.dimensions() != self.dimensions() {
            return Err(GifError::FrameSizeMismatch {
                expected: self.dimensions(),
                actual: image.dimensions(),
            });
        }

        let delay_ms = if delay_ms == 0 {
            self.settings.frame_delay_ms
        } else {
            delay_ms
        };

        let (Some(matcher), Sink::Open(encoder)) = (self.matcher.as_mut(), &mut self.sink) else {
            return Err(self.invalid("add a frame"));
        };

        let frame = ::gif::Frame {
            delay: delay_to_centis(delay_ms),
            dispose: DisposalMethod::Keep,
            transparent: None,
            width: self.width,
            height: self.height,
            buffer: Cow::Owned(matcher.map_pixels(image.pixels())),
            ..::gif::Frame::default()
        };

        if let Err(err) = encoder.write_frame(&frame) {
            self.state = EncoderState::Failed;
            return Err(err.into());
        }

        self.frames_written += 1;
        Ok(())
    }

    /// Write the trailer and return the completed sink.
    ///
    /// Repeated calls are no-ops returning the same sink.
    ///
    /// # Errors
    ///
    /// `InvalidState` before `start` or after a failed write.
    pub fn finish(&mut self) -> Result<&W, GifError> {
        match self.state {
            EncoderState::Finished => {}
            EncoderState::Started | EncoderState::Configured => {
                let Sink::Open(encoder) = mem::replace(&mut self.sink, Sink::Lost) else {
                    return Err(self.invalid("finish"));
                };
                match encoder.into_inner() {
                    Ok(sink) => {
                        self.sink = Sink::Done(sink);
                        self.state = EncoderState::Finished;
                        log::trace!("GIF finished after {} frame(s)", self.frames_written);
                    }
                    Err(err) => {
                        self.state = EncoderState::Failed;
                        return Err(err.into());
                    }
                }
            }
            _ => return Err(self.invalid("finish")),
        }

        match &self.sink {
            Sink::Done(sink) => Ok(sink),
            _ => Err(self.invalid("finish")),
        }
    }

    /// Finish if needed and hand back the sink.
    ///
    /// A never-started encoder returns its untouched sink.
    pub fn into_inner(mut self) -> Result<W, GifError> {
        if matches!(self.state, EncoderState::Started | EncoderState::Configured) {
            self.finish()?;
        }
        match mem::replace(&mut self.sink, Sink::Lost) {
            Sink::Idle(sink) | Sink::Done(sink) => Ok(sink),
            _ => Err(self.invalid("take the sink")),
        }
    }

    fn expect_state(&self, operation: &'static str, expected: EncoderState) -> Result<(), GifError> {
        if self.state == expected {
            Ok(())
        } else {
            Err(self.invalid(operation))
        }
    }

    fn invalid(&self, operation: &'static str) -> GifError {
        GifError::InvalidState {
            operation,
            state: self.state,
        }
    }
}
