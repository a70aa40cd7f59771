//! Style-transfer inference capability.
//!
//! The inference backend itself is external: callers implement [`StyleModel`]
//! and hand it to a [`StyleTransfer`] slot. The slot has an explicit
//! lifecycle (`Unloaded -> Loaded -> Disposed`). A model is loaded at most
//! once and is never reloaded behind the caller's back; once disposed, every
//! style-transfer effect fails with `ModelUnavailable`.
//!
//! Cloning a `StyleTransfer` shares the slot, so the owner that loads the
//! model can dispose it on shutdown while engines hold their own clone.

use std::sync::{Arc, PoisonError, RwLock};

use thiserror::Error;

use crate::pixel::PixelBuffer;

use super::TransformError;

/// An external style-transfer model.
///
/// Implementations must tolerate concurrent read-only calls from several jobs.
pub trait StyleModel: Send + Sync {
    /// Human-readable model name, used in logs.
    fn name(&self) -> &str;

    /// Number of style variants this model provides.
    fn variants(&self) -> u8;

    /// Stylize `input` with `variant`. The output must have the input's
    /// dimensions.
    fn stylize(&self, variant: u8, input: &PixelBuffer) -> Result<PixelBuffer, TransformError>;
}

/// Lifecycle errors of the capability slot.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CapabilityError {
    #[error("style model already loaded: {0}")]
    AlreadyLoaded(String),

    #[error("style-transfer capability was disposed")]
    Disposed,
}

enum Slot {
    Unloaded,
    Loaded(Arc<dyn StyleModel>),
    Disposed,
}

/// Lifecycle state reported by [`StyleTransfer::state`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CapabilityState {
    Unloaded,
    Loaded,
    Disposed,
}

/// Shared, explicitly managed handle to an optional style model.
#[derive(Clone)]
pub struct StyleTransfer {
    slot: Arc<RwLock<Slot>>,
}

impl Default for StyleTransfer {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for StyleTransfer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StyleTransfer")
            .field("state", &self.state())
            .finish()
    }
}

impl StyleTransfer {
    /// An empty (unloaded) capability.
    pub fn new() -> Self {
        Self {
            slot: Arc::new(RwLock::new(Slot::Unloaded)),
        }
    }

    /// Load `model`. Fails if a model is already loaded or the slot was
    /// disposed.
    pub fn load(&self, model: Arc<dyn StyleModel>) -> Result<(), CapabilityError> {
        let mut slot = self.slot.write().unwrap_or_else(PoisonError::into_inner);
        match &*slot {
            Slot::Loaded(existing) => {
                return Err(CapabilityError::AlreadyLoaded(existing.name().to_string()))
            }
            Slot::Disposed => return Err(CapabilityError::Disposed),
            Slot::Unloaded => {}
        }

        log::info!(
            "Loaded style model '{}' ({} variants)",
            model.name(),
            model.variants()
        );
        *slot = Slot::Loaded(model);
        Ok(())
    }

    /// Release the model. Idempotent; the slot cannot be loaded again.
    pub fn dispose(&self) {
        let mut slot = self.slot.write().unwrap_or_else(PoisonError::into_inner);
        if let Slot::Loaded(model) = &*slot {
            log::info!("Disposing style model '{}'", model.name());
        }
        *slot = Slot::Disposed;
    }

    pub fn state(&self) -> CapabilityState {
        match &*self.slot.read().unwrap_or_else(PoisonError::into_inner) {
            Slot::Unloaded => CapabilityState::Unloaded,
            Slot::Loaded(_) => CapabilityState::Loaded,
            Slot::Disposed => CapabilityState::Disposed,
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.state() == CapabilityState::Loaded
    }

    /// Snapshot of the loaded model, if any.
    pub fn model(&self) -> Option<Arc<dyn StyleModel>> {
        match &*self.slot.read().unwrap_or_else(PoisonError::into_inner) {
            Slot::Loaded(model) => Some(Arc::clone(model)),
            _ => None,
        }
    }

    /// Run `variant` on `input`.
    ///
    /// The model `Arc` is cloned before inference so a concurrent `dispose`
    /// only affects later calls.
    pub fn stylize(&self, variant: u8, input: &PixelBuffer) -> Result<PixelBuffer, TransformError> {
        let model = self
            .model()
            .ok_or(TransformError::ModelUnavailable { variant })?;

        if variant >= model.variants() {
            return Err(TransformError::UnknownVariant {
                variant,
                available: model.variants(),
            });
        }

        model.stylize(variant, input)
    }
}
