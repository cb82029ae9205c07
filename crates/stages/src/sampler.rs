//! # Samplers
//!
//! A sampler owns a raw dataset split once into a training part and a
//! held-out part. Batches are drawn from the training part only.
//!
//! | Sampler | Batch rows |
//! |---------|------------|
//! | [`RandomSampler`] | uniform, with replacement |
//! | [`IteratingSampler`] | consecutive, wrapping around the training rows |

use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use tabgan_core::{Device, Dim, Index, Matrix};
use tracing::debug;

use crate::error::StageError;

/// Source of raw training batches with a fixed holdout.
pub trait Sampler {
    /// Width of the raw rows.
    fn outputs(&self) -> Dim;

    /// Draw `batch` raw training rows.
    fn sample(&mut self, batch: usize) -> Result<Matrix, StageError>;

    /// Return to the initial batch position.
    fn restart(&mut self);

    /// The held-out raw rows, fixed at construction.
    fn holdout(&self) -> &Matrix;

    fn move_to(&mut self, device: &Device) -> Result<(), StageError>;
}

/// Split and seeding for samplers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SamplerConfig {
    /// Fraction of rows kept for training.
    pub split: f64,
    /// Seed for the split and for batch draws; entropy when absent.
    pub seed: Option<u64>,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            split: 0.8,
            seed: None,
        }
    }
}

impl SamplerConfig {
    fn rng(&self) -> StdRng {
        match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        }
    }
}

/// Shuffle `data` and cut it into `(train, holdout)` at `floor(n * split)`.
fn split(data: &Matrix, config: &SamplerConfig, rng: &mut StdRng) -> Result<(Matrix, Matrix), StageError> {
    if !(0.0..=1.0).contains(&config.split) {
        return Err(StageError::config(format!(
            "split must lie in [0, 1], got {}",
            config.split
        )));
    }
    let n = data.rows().get();
    let cutoff = (n as f64 * config.split) as usize;
    if cutoff == 0 {
        return Err(StageError::config(format!(
            "split {} of {n} rows leaves no training data",
            config.split
        )));
    }
    let order = Index::randperm(n, rng);
    let train = data.rows_at(&order.take(cutoff))?;
    let holdout = data.rows_at(&order.skip(cutoff))?;
    debug!(
        train = train.rows().get(),
        holdout = holdout.rows().get(),
        "split sampler data"
    );
    Ok((train, holdout))
}

// ============================================================================
// Random
// ============================================================================

/// Draws batch rows uniformly with replacement.
#[derive(Debug)]
pub struct RandomSampler {
    train: Matrix,
    holdout: Matrix,
    rng: StdRng,
}

impl RandomSampler {
    pub fn new(data: &Matrix, config: &SamplerConfig) -> Result<Self, StageError> {
        let mut rng = config.rng();
        let (train, holdout) = split(data, config, &mut rng)?;
        Ok(Self {
            train,
            holdout,
            rng,
        })
    }

    pub fn train(&self) -> &Matrix {
        &self.train
    }
}

impl Sampler for RandomSampler {
    fn outputs(&self) -> Dim {
        self.train.cols()
    }

    fn sample(&mut self, batch: usize) -> Result<Matrix, StageError> {
        let index = Index::sample(batch, self.train.rows().get(), true, &mut self.rng)?;
        Ok(self.train.rows_at(&index)?)
    }

    fn restart(&mut self) {}

    fn holdout(&self) -> &Matrix {
        &self.holdout
    }

    fn move_to(&mut self, device: &Device) -> Result<(), StageError> {
        self.train = self.train.move_to(device)?;
        self.holdout = self.holdout.move_to(device)?;
        Ok(())
    }
}

// ============================================================================
// Iterating
// ============================================================================

/// Walks the training rows in order, wrapping at the end.
#[derive(Debug)]
pub struct IteratingSampler {
    train: Matrix,
    holdout: Matrix,
    cursor: usize,
}

impl IteratingSampler {
    pub fn new(data: &Matrix, config: &SamplerConfig) -> Result<Self, StageError> {
        let (train, holdout) = split(data, config, &mut config.rng())?;
        Ok(Self {
            train,
            holdout,
            cursor: 0,
        })
    }

    pub fn train(&self) -> &Matrix {
        &self.train
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }
}

impl Sampler for IteratingSampler {
    fn outputs(&self) -> Dim {
        self.train.cols()
    }

    fn sample(&mut self, batch: usize) -> Result<Matrix, StageError> {
        let rows = self.train.rows().get();
        let index = Index::slice(self.cursor, batch, self.cursor + batch)?.wrap(rows)?;
        self.cursor = (self.cursor + batch) % rows;
        Ok(self.train.rows_at(&index)?)
    }

    fn restart(&mut self) {
        self.cursor = 0;
    }

    fn holdout(&self) -> &Matrix {
        &self.holdout
    }

    fn move_to(&mut self, device: &Device) -> Result<(), StageError> {
        self.train = self.train.move_to(device)?;
        self.holdout = self.holdout.move_to(device)?;
        Ok(())
    }
}
