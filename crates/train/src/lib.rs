//! # Train - Adversarial Training Over Stages
//!
//! Pairs a [`Generator`] and a [`Discriminator`] with a
//! [`Connector`](tabgan_stages::Connector) and alternates their updates
//! until a [`Regimen`] is satisfied.
//!
//! ```text
//!            ┌──────────── Connector ────────────┐
//! raw rows ─▶│ sample ─▶ load ─▶ condition       │
//!            │                     │             │
//!            │        Generator ◀──┘             │
//!            │            │                      │
//!            │   prepare (interceptor) ─▶ data ──┼─▶ Discriminator
//!            │   loss (penalizer) ───────────────┼─▶ generator loss
//!            └───────────────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```rust,no_run
//! use tabgan_core::{Device, Matrix};
//! use tabgan_stages::{Connector, Pipeline, RandomSampler, SamplerConfig};
//! use tabgan_train::{
//!     BasicRegimen, DiscriminatorConfig, GeneratorConfig, RegimenConfig, SequentialGenerator,
//!     StandardDiscriminator, Trainer,
//! };
//!
//! let rows: Vec<Vec<f32>> = (0..200).map(|i| vec![i as f32, (i % 3) as f32]).collect();
//! let data = Matrix::from_rows(&rows, 2, &Device::Cpu).unwrap();
//! let parts = vec![
//!     Pipeline::standardize(2, &[0], &data).unwrap(),
//!     Pipeline::category(2, (1, 3)).unwrap(),
//! ];
//! let sampler = RandomSampler::new(&data, &SamplerConfig::default()).unwrap();
//! let connector = Connector::joint(Box::new(sampler), 3, 4, 4, parts).unwrap();
//!
//! let generator = SequentialGenerator::new(
//!     GeneratorConfig { conditions: 3, latents: 8, intermediates: 4, steps: vec![16], ..Default::default() },
//!     &Device::Cpu,
//! ).unwrap();
//! let discriminator = StandardDiscriminator::new(
//!     DiscriminatorConfig { conditions: 3, outputs: 4, steps: vec![16], ..Default::default() },
//!     &Device::Cpu,
//! ).unwrap();
//!
//! let mut trainer = Trainer::new(generator, discriminator, connector, Device::Cpu).unwrap();
//! let outcome = trainer.train(&mut BasicRegimen::new(RegimenConfig::default()));
//! let rows = trainer.generate(10).unwrap();
//! ```

pub mod error;
pub mod model;
pub mod models;
pub mod regimen;
pub mod trainer;

// Re-export key types at crate root for convenience
pub use error::TrainError;
pub use model::{Discriminator, Generator, Layer};
pub use models::{
    binary_cross_entropy, Activation, DiscriminatorConfig, DropoutLayer, GeneratorConfig,
    LinearLayer, SequentialGenerator, StandardDiscriminator,
};
pub use regimen::{Action, BasicRegimen, Regimen, RegimenConfig, Schedule};
pub use trainer::{Steps, TrainOutcome, Trainer};
