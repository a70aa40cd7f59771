//! Effect pipeline: one base image in, one frame per surviving effect out.
//!
//! ## Algorithm
//! 1. Resize the base image once (cover fit) to the target size.
//! 2. Run every effect on that resized buffer. Effects are independent, never
//!    chained, so they may run in parallel.
//! 3. Wrap each result as a [`Frame`] carrying the configured delay and the
//!    effect's position in the request.
//!
//! ## Fault isolation
//! A failing effect (error, panic, or wrong output size) is logged and its
//! frame omitted; the remaining frames keep their relative order. The call
//! only fails when no frame survives.

use std::panic::{self, AssertUnwindSafe};

use rayon::prelude::*;
use thiserror::Error;

use crate::effects::{Effect, EffectEngine, TransformError};
use crate::pixel::{resize, FilterType, FitMode, PixelBuffer, PixelError};

/// Default frame edge length in pixels.
pub const DEFAULT_FRAME_SIZE: u32 = 256;

/// Default per-frame delay in milliseconds.
pub const DEFAULT_DELAY_MS: u32 = 500;

/// Errors that abort the whole pipeline.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Every requested effect failed (or none were requested).
    #[error("no frames produced: all {attempted} effect(s) failed")]
    NoFramesProduced { attempted: usize },

    /// Frame delays must be positive.
    #[error("frame delay must be positive")]
    InvalidDelay,

    /// The base image could not be resized to the target size.
    #[error("failed to resize base image: {0}")]
    Resize(#[from] PixelError),
}

/// One still image of the animation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub image: PixelBuffer,
    /// Display time in milliseconds.
    pub delay_ms: u32,
    /// Position of the producing effect in the requested list.
    pub index: usize,
    pub effect: Effect,
}

impl Frame {
    pub fn new(image: PixelBuffer, delay_ms: u32, index: usize, effect: Effect) -> Self {
        Self {
            image,
            delay_ms,
            index,
            effect,
        }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }
}

/// An effect that was dropped from the output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedEffect {
    pub index: usize,
    pub effect: Effect,
    pub reason: String,
}

/// Pipeline settings for one job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineConfig {
    pub width: u32,
    pub height: u32,
    pub delay_ms: u32,
    pub filter: FilterType,
    /// Evaluate effects on the rayon pool instead of sequentially.
    pub parallel: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            width: DEFAULT_FRAME_SIZE,
            height: DEFAULT_FRAME_SIZE,
            delay_ms: DEFAULT_DELAY_MS,
            filter: FilterType::Bilinear,
            parallel: false,
        }
    }
}

impl PipelineConfig {
    /// Square frames of `size` pixels with the given delay.
    pub fn square(size: u32, delay_ms: u32) -> Self {
        Self {
            width: size,
            height: size,
            delay_ms,
            ..Self::default()
        }
    }
}

/// Frames in output order plus the effects that were dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineOutput {
    pub frames: Vec<Frame>,
    pub skipped: Vec<SkippedEffect>,
}

impl PipelineOutput {
    /// True when at least one effect was dropped.
    pub fn is_degraded(&self) -> bool {
        !self.skipped.is_empty()
    }
}

/// Applies an ordered effect list to a base image.
pub struct EffectPipeline<'a> {
    engine: &'a dyn EffectEngine,
    config: PipelineConfig,
}

impl<'a> EffectPipeline<'a> {
    pub fn new(engine: &'a dyn EffectEngine, config: PipelineConfig) -> Self {
        Self { engine, config }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Produce one frame per non-failing effect, in request order.
    ///
    /// # Errors
    ///
    /// * `NoFramesProduced` - every effect failed; no partial output.
    /// * `InvalidDelay` - the configured delay is zero.
    /// * `Resize` - the target size is invalid.
    pub fn apply(&self, base: &PixelBuffer, effects: &[Effect]) -> Result<PipelineOutput, PipelineError> {
        if self.config.delay_ms == 0 {
            return Err(PipelineError::InvalidDelay);
        }

        let resized = resize(
            base,
            self.config.width,
            self.config.height,
            FitMode::Cover,
            self.config.filter,
        )?;

        let results: Vec<Result<Frame, SkippedEffect>> = if self.config.parallel {
            effects
                .par_iter()
                .enumerate()
                .map(|(index, effect)| self.run_one(index, *effect, &resized))
                .collect()
        } else {
            effects
                .iter()
                .enumerate()
                .map(|(index, effect)| self.run_one(index, *effect, &resized))
                .collect()
        };

        let mut frames = Vec::with_capacity(results.len());
        let mut skipped = Vec::new();
        for result in results {
            match result {
                Ok(frame) => frames.push(frame),
                Err(skip) => {
                    log::warn!(
                        "Effect #{} '{}' failed, omitting frame: {}",
                        skip.index,
                        skip.effect,
                        skip.reason
                    );
                    skipped.push(skip);
                }
            }
        }

        if frames.is_empty() {
            return Err(PipelineError::NoFramesProduced {
                attempted: effects.len(),
            });
        }

        log::debug!(
            "Pipeline produced {} frame(s), skipped {}",
            frames.len(),
            skipped.len()
        );
        Ok(PipelineOutput { frames, skipped })
    }

    fn run_one(&self, index: usize, effect: Effect, input: &PixelBuffer) -> Result<Frame, SkippedEffect> {
        let skip = |err: TransformError| SkippedEffect {
            index,
            effect,
            reason: err.to_string(),
        };

        let output = panic::catch_unwind(AssertUnwindSafe(|| self.engine.transform(effect, input)))
            .unwrap_or_else(|payload| Err(TransformError::Panicked(panic_message(&*payload))))
            .map_err(skip)?;

        if output.dimensions() != input.dimensions() {
            return Err(skip(TransformError::SizeMismatch {
                expected: input.dimensions(),
                actual: output.dimensions(),
            }));
        }

        Ok(Frame::new(output, self.config.delay_ms, index, effect))
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effects::StandardEffects;
    use proptest::prelude::*;

    const KINDS: [Effect; 7] = [
        Effect::Original,
        Effect::Grayscale,
        Effect::Invert,
        Effect::Sepia,
        Effect::Contrast,
        Effect::Blur,
        Effect::Sharpen,
    ];

    /// Delegates to the standard engine but fails every effect in `failing`.
    struct FailingEngine {
        inner: StandardEffects,
        failing: Vec<Effect>,
    }

    impl FailingEngine {
        fn new(failing: Vec<Effect>) -> Self {
            Self {
                inner: StandardEffects::new(),
                failing,
            }
        }
    }

    impl EffectEngine for FailingEngine {
        fn transform(&self, effect: Effect, input: &PixelBuffer) -> Result<PixelBuffer, TransformError> {
            if self.failing.contains(&effect) {
                return Err(TransformError::Inference(format!("{} forced to fail", effect)));
            }
            self.inner.transform(effect, input)
        }
    }

    struct PanickingEngine;

    impl EffectEngine for PanickingEngine {
        fn transform(&self, effect: Effect, input: &PixelBuffer) -> Result<PixelBuffer, TransformError> {
            if effect == Effect::Sepia {
                panic!("numerical blow-up");
            }
            Ok(input.clone())
        }
    }

    struct ShrinkingEngine;

    impl EffectEngine for ShrinkingEngine {
        fn transform(&self, effect: Effect, input: &PixelBuffer) -> Result<PixelBuffer, TransformError> {
            if effect == Effect::Blur {
                return Ok(PixelBuffer::filled(1, 1, [0, 0, 0])?);
            }
            Ok(input.clone())
        }
    }

    fn base_image() -> PixelBuffer {
        let mut pixels = Vec::with_capacity(40 * 30 * 3);
        for y in 0..30u32 {
            for x in 0..40u32 {
                pixels.extend_from_slice(&[(x * 6) as u8, (y * 8) as u8, 90]);
            }
        }
        PixelBuffer::new(40, 30, pixels).unwrap()
    }

    fn config(parallel: bool) -> PipelineConfig {
        PipelineConfig {
            parallel,
            ..PipelineConfig::square(16, 500)
        }
    }

    #[test]
    fn test_one_frame_per_effect() {
        let engine = StandardEffects::new();
        let pipeline = EffectPipeline::new(&engine, config(false));

        let output = pipeline.apply(&base_image(), &Effect::DEFAULTS).unwrap();

        assert_eq!(output.frames.len(), 3);
        assert!(!output.is_degraded());
        for (i, frame) in output.frames.iter().enumerate() {
            assert_eq!(frame.index, i);
            assert_eq!(frame.delay_ms, 500);
            assert_eq!((frame.width(), frame.height()), (16, 16));
        }
    }

    #[test]
    fn test_effects_are_not_chained() {
        let engine = StandardEffects::new();
        let pipeline = EffectPipeline::new(&engine, config(false));

        let output = pipeline
            .apply(&base_image(), &[Effect::Invert, Effect::Original])
            .unwrap();
        let original = &output.frames[1].image;
        let resized = resize(&base_image(), 16, 16, FitMode::Cover, FilterType::Bilinear).unwrap();

        // Original after invert is still the untouched resized base
        assert_eq!(original, &resized);
    }

    #[test]
    fn test_failure_is_isolated() {
        let engine = FailingEngine::new(vec![Effect::Invert]);
        let pipeline = EffectPipeline::new(&engine, config(false));

        let output = pipeline
            .apply(&base_image(), &[Effect::Original, Effect::Invert, Effect::Sepia])
            .unwrap();

        let produced: Vec<_> = output.frames.iter().map(|f| (f.index, f.effect)).collect();
        assert_eq!(produced, vec![(0, Effect::Original), (2, Effect::Sepia)]);
        assert_eq!(output.skipped.len(), 1);
        assert_eq!(output.skipped[0].effect, Effect::Invert);
        assert!(output.skipped[0].reason.contains("forced to fail"));
    }

    #[test]
    fn test_all_fail_is_no_frames() {
        let engine = FailingEngine::new(vec![Effect::Original, Effect::Invert]);
        let pipeline = EffectPipeline::new(&engine, config(false));

        let result = pipeline.apply(&base_image(), &[Effect::Original, Effect::Invert]);
        assert!(matches!(
            result,
            Err(PipelineError::NoFramesProduced { attempted: 2 })
        ));
    }

    #[test]
    fn test_empty_effect_list_is_no_frames() {
        let engine = StandardEffects::new();
        let pipeline = EffectPipeline::new(&engine, config(false));
        assert!(matches!(
            pipeline.apply(&base_image(), &[]),
            Err(PipelineError::NoFramesProduced { attempted: 0 })
        ));
    }

    #[test]
    fn test_missing_style_model_is_isolated() {
        let engine = StandardEffects::new();
        let pipeline = EffectPipeline::new(&engine, config(false));

        let output = pipeline
            .apply(&base_image(), &[Effect::StyleTransfer(0), Effect::Grayscale])
            .unwrap();
        assert_eq!(output.frames.len(), 1);
        assert_eq!(output.frames[0].effect, Effect::Grayscale);
        assert!(output.is_degraded());
    }

    #[test]
    fn test_panic_is_isolated() {
        let pipeline = EffectPipeline::new(&PanickingEngine, config(false));

        let output = pipeline
            .apply(&base_image(), &[Effect::Sepia, Effect::Original])
            .unwrap();
        assert_eq!(output.frames.len(), 1);
        assert!(output.skipped[0].reason.contains("numerical blow-up"));
    }

    #[test]
    fn test_size_mismatch_is_isolated() {
        let pipeline = EffectPipeline::new(&ShrinkingEngine, config(false));

        let output = pipeline
            .apply(&base_image(), &[Effect::Blur, Effect::Original])
            .unwrap();
        assert_eq!(output.frames.len(), 1);
        assert_eq!(output.frames[0].effect, Effect::Original);
    }

    #[test]
    fn test_zero_delay_rejected() {
        let engine = StandardEffects::new();
        let pipeline = EffectPipeline::new(&engine, PipelineConfig::square(16, 0));
        assert!(matches!(
            pipeline.apply(&base_image(), &[Effect::Original]),
            Err(PipelineError::InvalidDelay)
        ));
    }

    #[test]
    fn test_zero_size_rejected() {
        let engine = StandardEffects::new();
        let pipeline = EffectPipeline::new(&engine, PipelineConfig::square(0, 100));
        assert!(matches!(
            pipeline.apply(&base_image(), &[Effect::Original]),
            Err(PipelineError::Resize(PixelError::InvalidDimensions { .. }))
        ));
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let engine = StandardEffects::new();
        let effects = [
            Effect::Blur,
            Effect::Original,
            Effect::Sharpen,
            Effect::Sepia,
            Effect::Contrast,
            Effect::Invert,
        ];

        let sequential = EffectPipeline::new(&engine, config(false))
            .apply(&base_image(), &effects)
            .unwrap();
        let parallel = EffectPipeline::new(&engine, config(true))
            .apply(&base_image(), &effects)
            .unwrap();

        assert_eq!(sequential, parallel);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(48))]

        #[test]
        fn prop_frames_are_n_minus_k(
            picks in prop::collection::vec(0usize..KINDS.len(), 1..8),
            failing_mask in 0u8..128,
            parallel in any::<bool>(),
        ) {
            let effects: Vec<Effect> = picks.iter().map(|&i| KINDS[i]).collect();
            let failing: Vec<Effect> = KINDS
                .iter()
                .enumerate()
                .filter(|(i, _)| failing_mask & (1 << i) != 0)
                .map(|(_, e)| *e)
                .collect();
            let engine = FailingEngine::new(failing.clone());
            let pipeline = EffectPipeline::new(&engine, PipelineConfig {
                parallel,
                ..PipelineConfig::square(8, 120)
            });

            let expected: Vec<(usize, Effect)> = effects
                .iter()
                .enumerate()
                .filter(|(_, e)| !failing.contains(e))
                .map(|(i, e)| (i, *e))
                .collect();

            match pipeline.apply(&base_image(), &effects) {
                Ok(output) => {
                    let produced: Vec<(usize, Effect)> =
                        output.frames.iter().map(|f| (f.index, f.effect)).collect();
                    prop_assert_eq!(&produced, &expected);
                    prop_assert_eq!(output.skipped.len(), effects.len() - expected.len());
                    prop_assert!(output.frames.iter().all(|f| f.delay_ms == 120));
                }
                Err(PipelineError::NoFramesProduced { attempted }) => {
                    prop_assert!(expected.is_empty());
                    prop_assert_eq!(attempted, effects.len());
                }
                Err(other) => prop_assert!(false, "unexpected error: {}", other),
            }
        }
    }
}
