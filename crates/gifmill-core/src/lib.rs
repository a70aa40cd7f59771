//! Gifmill Core - still image to animated GIF
//!
//! This crate turns one still image into an animated GIF: the image is
//! resized once, a list of independent effects produces one frame each, and
//! the frames are streamed into a GIF89a document over a fixed 256-color
//! palette. It performs no I/O beyond in-memory codecs and `std::io::Write`
//! sinks.

pub mod animation;
pub mod effects;
pub mod luminance;
pub mod palette;
pub mod pipeline;
pub mod pixel;

pub use animation::{EncoderState, GifDocument, GifError, GifSettings, StreamingGifEncoder};
pub use effects::{Effect, EffectEngine, StandardEffects, StyleModel, StyleTransfer, TransformError};
pub use palette::{Palette, PaletteBuilder, PaletteMatcher};
pub use pipeline::{EffectPipeline, Frame, PipelineConfig, PipelineError, PipelineOutput, SkippedEffect};
pub use pixel::{FilterType, FitMode, PixelBuffer, PixelError};
