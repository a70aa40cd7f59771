//! Frame effects.
//!
//! Effects form a closed set ([`Effect`]); each one is a pure
//! `PixelBuffer -> PixelBuffer` transform that may fail. Transforms are run
//! through an [`EffectEngine`], which lets the pipeline stay agnostic of
//! where a transform comes from (built-in pixel math or an external
//! style-transfer model).
//!
//! ## Identifiers
//!
//! | Effect | Identifier |
//! |--------|------------|
//! | `Original` | `original` |
//! | `Grayscale` | `grayscale` |
//! | `Invert` | `invert` |
//! | `Sepia` | `sepia` |
//! | `Contrast` | `contrast` |
//! | `Blur` | `blur` |
//! | `Sharpen` | `sharpen` |
//! | `StyleTransfer(n)` | `style-transfer-n` (bare `style-transfer` is variant 0) |

pub mod color;
pub mod filter;
pub mod style;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::pixel::{PixelBuffer, PixelError};

pub use style::{CapabilityError, CapabilityState, StyleModel, StyleTransfer};

const STYLE_TRANSFER_PREFIX: &str = "style-transfer";

/// Failure of a single effect. Recovered by the pipeline through frame
/// omission.
#[derive(Debug, Error)]
pub enum TransformError {
    /// The style-transfer capability is not loaded (or was disposed).
    #[error("style-transfer model unavailable for variant {variant}")]
    ModelUnavailable { variant: u8 },

    /// The loaded model has fewer variants than requested.
    #[error("style variant {variant} out of range (model has {available})")]
    UnknownVariant { variant: u8, available: u8 },

    /// The external model reported an error.
    #[error("inference failed: {0}")]
    Inference(String),

    /// An effect parameter is out of range.
    #[error("invalid effect parameter: {0}")]
    InvalidParameter(String),

    /// The input buffer could not be converted for processing.
    #[error("invalid input buffer")]
    InvalidInput,

    /// The transform returned a buffer of different dimensions.
    #[error("transform changed dimensions from {expected:?} to {actual:?}")]
    SizeMismatch {
        expected: (u32, u32),
        actual: (u32, u32),
    },

    /// The transform panicked.
    #[error("transform panicked: {0}")]
    Panicked(String),

    /// Producing the output buffer failed.
    #[error(transparent)]
    Pixel(#[from] PixelError),
}

/// Error returned when parsing an unknown effect identifier.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown effect '{0}'")]
pub struct ParseEffectError(pub String);

/// A named frame transform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Effect {
    Original,
    Grayscale,
    Invert,
    Sepia,
    Contrast,
    Blur,
    Sharpen,
    /// External style transfer, by model variant.
    StyleTransfer(u8),
}

impl Effect {
    /// The effects used when a request does not name any.
    pub const DEFAULTS: [Effect; 3] = [Effect::Original, Effect::Grayscale, Effect::Invert];

    /// Whether this effect depends on an external inference capability.
    pub fn requires_model(self) -> bool {
        matches!(self, Effect::StyleTransfer(_))
    }
}

impl fmt::Display for Effect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Effect::Original => f.write_str("original"),
            Effect::Grayscale => f.write_str("grayscale"),
            Effect::Invert => f.write_str("invert"),
            Effect::Sepia => f.write_str("sepia"),
            Effect::Contrast => f.write_str("contrast"),
            Effect::Blur => f.write_str("blur"),
            Effect::Sharpen => f.write_str("sharpen"),
            Effect::StyleTransfer(n) => write!(f, "{}-{}", STYLE_TRANSFER_PREFIX, n),
        }
    }
}

impl FromStr for Effect {
    type Err = ParseEffectError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim().to_ascii_lowercase();
        let effect = match name.as_str() {
            "original" => Effect::Original,
            "grayscale" => Effect::Grayscale,
            "invert" => Effect::Invert,
            "sepia" => Effect::Sepia,
            "contrast" => Effect::Contrast,
            "blur" => Effect::Blur,
            "sharpen" => Effect::Sharpen,
            STYLE_TRANSFER_PREFIX => Effect::StyleTransfer(0),
            other => other
                .strip_prefix(STYLE_TRANSFER_PREFIX)
                .and_then(|rest| rest.strip_prefix('-'))
                .filter(|n| is_canonical_index(n))
                .and_then(|n| n.parse::<u8>().ok())
                .map(Effect::StyleTransfer)
                .ok_or_else(|| ParseEffectError(s.to_string()))?,
        };
        Ok(effect)
    }
}

/// Plain decimal digits with no sign and no leading zero, so the name
/// displays back unchanged.
fn is_canonical_index(n: &str) -> bool {
    !n.is_empty() && n.bytes().all(|b| b.is_ascii_digit()) && (n == "0" || !n.starts_with('0'))
}

impl TryFrom<String> for Effect {
    type Error = ParseEffectError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Effect> for String {
    fn from(effect: Effect) -> Self {
        effect.to_string()
    }
}

/// The uniform transform capability used by the pipeline.
///
/// Engines are shared read-only across concurrent jobs.
pub trait EffectEngine: Send + Sync {
    /// Apply `effect` to `input`, producing a new buffer.
    fn transform(&self, effect: Effect, input: &PixelBuffer) -> Result<PixelBuffer, TransformError>;
}

/// Built-in effects plus an optional style-transfer model.
#[derive(Debug, Clone, Default)]
pub struct StandardEffects {
    styles: StyleTransfer,
}

impl StandardEffects {
    /// Engine without a style model; style-transfer effects fail.
    pub fn new() -> Self {
        Self::default()
    }

    /// Engine sharing `styles` with its owner.
    pub fn with_style_transfer(styles: StyleTransfer) -> Self {
        Self { styles }
    }

    pub fn style_transfer(&self) -> &StyleTransfer {
        &self.styles
    }
}

impl EffectEngine for StandardEffects {
    fn transform(&self, effect: Effect, input: &PixelBuffer) -> Result<PixelBuffer, TransformError> {
        match effect {
            Effect::Original => Ok(input.clone()),
            Effect::Grayscale => Ok(color::grayscale(input)),
            Effect::Invert => Ok(color::invert(input)),
            Effect::Sepia => Ok(color::sepia(input)),
            Effect::Contrast => Ok(color::contrast(input, color::CONTRAST_FACTOR)),
            Effect::Blur => filter::blur(input, filter::BLUR_SIGMA),
            Effect::Sharpen => filter::sharpen(input),
            Effect::StyleTransfer(variant) => self.styles.stylize(variant, input),
        }
    }
}
