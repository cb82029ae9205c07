//! # Reference Models
//!
//! Candle-backed bodies for the [`Generator`](crate::Generator) and
//! [`Discriminator`](crate::Discriminator) contracts, enough to run a full
//! training loop.
//!
//! | Model | Hidden | Output | Optimizer |
//! |-------|--------|--------|-----------|
//! | [`SequentialGenerator`] | linear + ReLU | linear + sigmoid | AdamW, step schedule |
//! | [`StandardDiscriminator`] | linear + ReLU (+ dropout) | linear logit | AdamW |

mod discriminator;
mod generator;
mod layer;

pub use discriminator::{binary_cross_entropy, DiscriminatorConfig, StandardDiscriminator};
pub use generator::{GeneratorConfig, SequentialGenerator};
pub use layer::{Activation, DropoutLayer, LinearLayer};
