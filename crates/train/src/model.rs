//! # Model Contracts
//!
//! The trainer is generic over any generator and discriminator meeting
//! these contracts. Bodies live elsewhere; [`crate::models`] has reference
//! implementations on candle.
//!
//! | Contract | Input | Output |
//! |----------|-------|--------|
//! | [`Generator`] | condition `N × C` | intermediate `N × G` |
//! | [`Discriminator`] | condition `N × C`, data `N × D` | logits `N × 1` |

use tabgan_core::{Device, Dim, Gradients, Matrix};

use crate::error::TrainError;

/// One differentiable transformation of a batch.
pub trait Layer {
    fn inputs(&self) -> Dim;
    fn outputs(&self) -> Dim;

    fn forward(&self, data: &Matrix) -> Result<Matrix, TrainError>;

    /// Switch between training and evaluation behaviour.
    fn train(&mut self, _mode: bool) {}
}

/// Produces intermediates from conditions and its own latent noise.
pub trait Generator {
    fn conditions(&self) -> Dim;
    fn latents(&self) -> Dim;
    fn intermediates(&self) -> Dim;

    /// Generate one intermediate row per condition row, tracked for gradients.
    fn sample(&self, condition: &Matrix) -> Result<Matrix, TrainError>;

    /// Backpropagate `loss`, step the optimizer, and hand back the gradients
    /// so other learnable stages can take their share.
    fn update(&mut self, loss: &Matrix) -> Result<Gradients, TrainError>;

    /// Re-initialize weights.
    fn reset(&mut self) -> Result<(), TrainError>;

    /// Rebuild the optimizer and its schedule.
    fn restart(&mut self) -> Result<(), TrainError>;

    fn move_to(&mut self, device: &Device) -> Result<(), TrainError>;

    fn train(&mut self, mode: bool);

    /// Current learning rate.
    fn rate(&self) -> f64;
}

/// Scores `(condition, data)` rows as real (`1`) or generated (`0`).
pub trait Discriminator {
    fn conditions(&self) -> Dim;
    fn outputs(&self) -> Dim;

    /// Raw logits, `N × 1`.
    fn predict(&self, condition: &Matrix, data: &Matrix) -> Result<Matrix, TrainError>;

    /// `1 × 1` loss of the predictions against `N × 1` targets.
    fn loss(&self, condition: &Matrix, data: &Matrix, target: &Matrix)
        -> Result<Matrix, TrainError>;

    /// One optimizer step on the loss. Returns the loss and its gradients.
    fn step(
        &mut self,
        condition: &Matrix,
        data: &Matrix,
        target: &Matrix,
    ) -> Result<(Matrix, Gradients), TrainError>;

    fn reset(&mut self) -> Result<(), TrainError>;
    fn restart(&mut self) -> Result<(), TrainError>;
    fn move_to(&mut self, device: &Device) -> Result<(), TrainError>;
    fn train(&mut self, mode: bool);
    fn rate(&self) -> f64;
}
