//! Deterministic encodings.

use std::f64::consts::PI;

use tabgan_core::{Axis, Device, Dim, Index, Matrix};
use tracing::{debug, warn};

use super::Loader;
use crate::error::{check_dim, StageError};

// ============================================================================
// Standardize
// ============================================================================

/// Z-scores selected columns with statistics fitted once on reference data.
#[derive(Debug, Clone)]
pub struct StandardizeLoader {
    index: Index,
    mean: Matrix,
    std: Matrix,
}

impl StandardizeLoader {
    /// Fit column means and unbiased standard deviations of `reference`
    /// over `index`. Columns with zero spread keep a divisor of one.
    pub fn new(index: Index, reference: &Matrix) -> Result<Self, StageError> {
        reference.expect_cols(index.cap())?;
        if reference.rows().get() < 2 {
            return Err(StageError::config(
                "standardizing needs at least two reference rows",
            ));
        }
        let subset = reference.columns(&index)?;
        let mean = subset.mean(Axis::Rows)?;
        let mut std = subset.std(Axis::Rows)?.to_rows()?.remove(0);
        for (col, s) in std.iter_mut().enumerate() {
            if *s == 0.0 || !s.is_finite() {
                warn!(column = ?index.get(col), "zero spread in reference data, not scaling");
                *s = 1.0;
            }
        }
        let std = Matrix::load(std, (1, index.len()), reference.device())?;
        debug!(columns = index.len(), rows = reference.rows().get(), "fitted standardizer");
        Ok(Self { index, mean, std })
    }

    pub fn mean(&self) -> &Matrix {
        &self.mean
    }

    pub fn std(&self) -> &Matrix {
        &self.std
    }
}

impl Loader for StandardizeLoader {
    fn samples(&self) -> Dim {
        self.index.cap()
    }

    fn outputs(&self) -> Dim {
        self.index.dim()
    }

    fn decoded(&self) -> Dim {
        self.index.dim()
    }

    fn load(&self, raw: &Matrix) -> Result<Matrix, StageError> {
        Ok(raw.columns(&self.index)?.sub(&self.mean)?.div(&self.std)?)
    }

    fn unload(&self, data: &Matrix) -> Result<Matrix, StageError> {
        data.expect_cols(self.outputs())?;
        Ok(data.mul(&self.std)?.add(&self.mean)?)
    }

    fn move_to(&mut self, device: &Device) -> Result<(), StageError> {
        self.mean = self.mean.move_to(device)?;
        self.std = self.std.move_to(device)?;
        Ok(())
    }
}

// ============================================================================
// One-Hot
// ============================================================================

/// Expands integer category columns into one-hot blocks.
#[derive(Debug, Clone)]
pub struct OneHotLoader {
    samples: Dim,
    outputs: Dim,
    /// Raw column, bin count and encoded block for each category.
    categories: Vec<(Index, usize, Index)>,
}

impl OneHotLoader {
    /// `index` holds `(raw_column, bins)` pairs.
    pub fn new(samples: usize, index: &[(usize, usize)]) -> Result<Self, StageError> {
        let outputs: usize = index.iter().map(|&(_, bins)| bins).sum();
        let mut offset = 0;
        let mut categories = Vec::with_capacity(index.len());
        for &(column, bins) in index {
            if bins == 0 {
                return Err(StageError::config(format!("column {column} has no bins")));
            }
            categories.push((
                Index::at(column, samples)?,
                bins,
                Index::slice(offset, bins, outputs)?,
            ));
            offset += bins;
        }
        Ok(Self {
            samples: Dim::new(samples),
            outputs: Dim::new(outputs),
            categories,
        })
    }
}

impl Loader for OneHotLoader {
    fn samples(&self) -> Dim {
        self.samples
    }

    fn outputs(&self) -> Dim {
        self.outputs
    }

    fn decoded(&self) -> Dim {
        Dim::new(self.categories.len())
    }

    fn load(&self, raw: &Matrix) -> Result<Matrix, StageError> {
        raw.expect_cols(self.samples)?;
        let parts = self
            .categories
            .iter()
            .map(|(column, bins, _)| Matrix::one_hot(&raw.columns(column)?, *bins))
            .collect::<Result<Vec<_>, _>>()?;
        let refs: Vec<&Matrix> = parts.iter().collect();
        Ok(Matrix::cat(&refs, Axis::Cols, (raw.rows().get(), self.outputs.get()))?)
    }

    fn unload(&self, data: &Matrix) -> Result<Matrix, StageError> {
        data.expect_cols(self.outputs)?;
        let parts = self
            .categories
            .iter()
            .map(|(_, _, block)| data.columns(block)?.argmax(Axis::Cols))
            .collect::<Result<Vec<_>, _>>()?;
        let refs: Vec<&Matrix> = parts.iter().collect();
        Ok(Matrix::cat(
            &refs,
            Axis::Cols,
            (data.rows().get(), self.categories.len()),
        )?)
    }
}

// ============================================================================
// Positional
// ============================================================================

/// Sinusoidal encoding of an ordinal column in `[0, max]`.
///
/// Frequencies follow sequence-position embeddings with a base derived from
/// `max`; even output columns take the sine, odd ones the cosine. Decoding
/// matches against a precomputed table of every ordinal value.
#[derive(Debug, Clone)]
pub struct PositionalLoader {
    column: Index,
    dim: Dim,
    /// `1 × dim` angular frequencies.
    frequencies: Matrix,
    /// `1 × dim` with ones on even columns.
    even: Matrix,
    /// `1 × dim` with ones on odd columns.
    odd: Matrix,
    /// `dim × (max + 1)` encodings of every ordinal.
    decoder: Matrix,
}

impl PositionalLoader {
    /// `dim` must be a power of two of at least four; `max` must exceed one.
    pub fn new(samples: usize, column: usize, dim: usize, max: usize) -> Result<Self, StageError> {
        if dim < 4 || !dim.is_power_of_two() {
            return Err(StageError::config(format!(
                "positional width must be a power of two >= 4, got {dim}"
            )));
        }
        if max <= 1 {
            return Err(StageError::config(format!(
                "positional maximum must exceed one, got {max}"
            )));
        }
        let device = Device::Cpu;
        let base = (max as f64 / PI).powf(dim as f64 / (dim as f64 - 2.0));
        let frequencies: Vec<f32> = (0..dim)
            .map(|i| base.powf(-2.0 * (i / 2) as f64 / dim as f64) as f32)
            .collect();
        let even: Vec<f32> = (0..dim).map(|i| ((i + 1) % 2) as f32).collect();
        let odd: Vec<f32> = (0..dim).map(|i| (i % 2) as f32).collect();

        let mut loader = Self {
            column: Index::at(column, samples)?,
            dim: Dim::new(dim),
            frequencies: Matrix::load(frequencies, (1, dim), &device)?,
            even: Matrix::load(even, (1, dim), &device)?,
            odd: Matrix::load(odd, (1, dim), &device)?,
            decoder: Matrix::zeros((dim, max + 1), &device)?,
        };
        loader.decoder = loader.encode(&Matrix::arange(max + 1, &device)?)?.transpose()?;
        Ok(loader)
    }

    fn encode(&self, ordinals: &Matrix) -> Result<Matrix, StageError> {
        let angles = ordinals.matmul(&self.frequencies)?;
        let sin = angles.sin()?.mul(&self.even)?;
        let cos = angles.cos()?.mul(&self.odd)?;
        Ok(sin.add(&cos)?)
    }
}

impl Loader for PositionalLoader {
    fn samples(&self) -> Dim {
        self.column.cap()
    }

    fn outputs(&self) -> Dim {
        self.dim
    }

    fn decoded(&self) -> Dim {
        Dim::ONE
    }

    fn load(&self, raw: &Matrix) -> Result<Matrix, StageError> {
        self.encode(&raw.columns(&self.column)?)
    }

    fn unload(&self, data: &Matrix) -> Result<Matrix, StageError> {
        data.expect_cols(self.dim)?;
        Ok(data.matmul(&self.decoder)?.argmax(Axis::Cols)?)
    }

    fn move_to(&mut self, device: &Device) -> Result<(), StageError> {
        self.frequencies = self.frequencies.move_to(device)?;
        self.even = self.even.move_to(device)?;
        self.odd = self.odd.move_to(device)?;
        self.decoder = self.decoder.move_to(device)?;
        Ok(())
    }
}

// ============================================================================
// Direct
// ============================================================================

/// Copies raw `[start, end)` column ranges unchanged.
#[derive(Debug, Clone)]
pub struct DirectLoader {
    samples: Dim,
    outputs: Dim,
    spans: Vec<Index>,
}

impl DirectLoader {
    pub fn new(samples: usize, index: &[(usize, usize)]) -> Result<Self, StageError> {
        let spans = index
            .iter()
            .map(|&(start, end)| {
                if end < start {
                    return Err(StageError::config(format!("empty range {start}..{end}")));
                }
                Ok(Index::slice(start, end - start, samples)?)
            })
            .collect::<Result<Vec<_>, _>>()?;
        let outputs = spans.iter().map(|s| s.dim()).sum();
        Ok(Self {
            samples: Dim::new(samples),
            outputs,
            spans,
        })
    }

    /// Every raw column, in order.
    pub fn identity(samples: usize) -> Self {
        Self {
            samples: Dim::new(samples),
            outputs: Dim::new(samples),
            spans: vec![Index::range(samples)],
        }
    }
}

impl Loader for DirectLoader {
    fn samples(&self) -> Dim {
        self.samples
    }

    fn outputs(&self) -> Dim {
        self.outputs
    }

    fn decoded(&self) -> Dim {
        self.outputs
    }

    fn load(&self, raw: &Matrix) -> Result<Matrix, StageError> {
        raw.expect_cols(self.samples)?;
        let parts = self
            .spans
            .iter()
            .map(|span| raw.columns(span))
            .collect::<Result<Vec<_>, _>>()?;
        let refs: Vec<&Matrix> = parts.iter().collect();
        Ok(Matrix::cat(&refs, Axis::Cols, (raw.rows().get(), self.outputs.get()))?)
    }

    fn unload(&self, data: &Matrix) -> Result<Matrix, StageError> {
        check_dim("direct loader unload", self.outputs, data.cols())?;
        Ok(data.clone())
    }
}
