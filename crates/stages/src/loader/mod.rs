//! # Loaders
//!
//! A loader maps raw source columns (`samples` wide) to the model's encoded
//! representation (`outputs` wide) and back. `unload` yields `decoded`
//! columns: one per standardized value, category or ordinal.
//!
//! Deterministic encodings (standardize, one-hot, positional) are
//! approximate inverses. Learned random-effect encodings are a best-effort
//! projection.

mod combine;
mod effect;
mod encode;

pub use combine::{JointLoader, PooledLoader};
pub use effect::{EffectLoader, GroupedEffectLoader, NestedEffectLoader, SimpleEffectLoader};
pub use encode::{DirectLoader, OneHotLoader, PositionalLoader, StandardizeLoader};

use tabgan_core::{Device, Dim, Gradients, Matrix};

use crate::error::StageError;

/// Bidirectional mapping between raw columns and encoded data.
pub trait Loader {
    /// Width of the raw rows read by `load`.
    fn samples(&self) -> Dim;

    /// Width of the encoded data.
    fn outputs(&self) -> Dim;

    /// Width of the rows produced by `unload`.
    fn decoded(&self) -> Dim;

    fn load(&self, raw: &Matrix) -> Result<Matrix, StageError>;

    fn unload(&self, data: &Matrix) -> Result<Matrix, StageError>;

    /// Copy this loader's share of a backward pass into its buffers.
    fn accumulate(&mut self, _grads: &Gradients) -> Result<(), StageError> {
        Ok(())
    }

    /// Apply and clear accumulated gradients.
    fn update(&mut self) -> Result<(), StageError> {
        Ok(())
    }

    fn move_to(&mut self, _device: &Device) -> Result<(), StageError> {
        Ok(())
    }
}
