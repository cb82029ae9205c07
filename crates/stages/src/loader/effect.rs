//! Random-effect loaders.
//!
//! A categorical column with many levels is embedded through a learnable
//! `levels × outputs` encoder: `load` is `one_hot(column) @ encoder` and
//! `unload` picks the level whose embedding scores highest.
//!
//! `update` takes one step `p <- p - lr * grad` on the owned parameter and
//! rescales every row to unit L2 norm. Gradients arrive through
//! `accumulate`; without any, `update` leaves the parameter alone.

use tabgan_core::{Axis, Device, Dim, Gradients, Index, Matrix, Parameter};
use tracing::trace;

use super::Loader;
use crate::error::{check_dim, StageError};

/// Default step size for effect encoders.
pub const DEFAULT_RATE: f64 = 0.001;

/// Floor on row norms when normalizing; an all-zero row stays zero.
const MIN_NORM: f32 = 1e-12;

/// A loader whose encoding is a learnable matrix over category levels.
pub trait EffectLoader: Loader {
    /// The current `levels × outputs` encoder, tracked for gradients.
    fn encoder(&self) -> Result<Matrix, StageError>;

    /// The raw column read.
    fn column(&self) -> &Index;

    /// Number of category levels.
    fn levels(&self) -> usize;

    fn rate(&self) -> f64;
}

/// The raw column, level count, width and step size shared by all effects.
#[derive(Debug, Clone)]
struct EffectColumn {
    column: Index,
    levels: usize,
    dim: Dim,
    rate: f64,
}

impl EffectColumn {
    fn new(samples: usize, dim: usize, (column, levels): (usize, usize)) -> Result<Self, StageError> {
        if levels == 0 || dim == 0 {
            return Err(StageError::config("effect needs at least one level and one output"));
        }
        Ok(Self {
            column: Index::at(column, samples)?,
            levels,
            dim: Dim::new(dim),
            rate: DEFAULT_RATE,
        })
    }

    fn load(&self, raw: &Matrix, encoder: &Matrix) -> Result<Matrix, StageError> {
        let one_hot = Matrix::one_hot(&raw.columns(&self.column)?, self.levels)?;
        Ok(one_hot.matmul(encoder)?)
    }

    fn unload(&self, data: &Matrix, encoder: &Matrix) -> Result<Matrix, StageError> {
        data.expect_cols(self.dim)?;
        Ok(data.matmul(&encoder.transpose()?)?.argmax(Axis::Cols)?)
    }
}

/// One normalized gradient step on `parameter`, consuming its gradient.
fn descend(parameter: &mut Parameter, rate: f64) -> Result<(), StageError> {
    let Some(grad) = parameter.take_gradient() else {
        return Ok(());
    };
    let stepped = parameter.value()?.detach().sub(&grad.affine(rate, 0.0)?)?;
    let norm = stepped
        .mul(&stepped)?
        .sum(Axis::Cols)?
        .sqrt()?
        .clamp(MIN_NORM, f32::MAX)?;
    parameter.set(&stepped.div(&norm)?)?;
    trace!(rate, "effect encoder updated");
    Ok(())
}

/// `levels × groups` 0/1 matrix sending each level to its group.
///
/// `groups` has one position per level; each position is a group number
/// below `groups.cap()`.
pub fn remap(groups: &Index) -> Result<Matrix, StageError> {
    let (levels, count) = (groups.len(), groups.cap().get());
    let mut data = vec![0f32; levels * count];
    for (level, group) in groups.iter().enumerate() {
        data[level * count + group] = 1.0;
    }
    Ok(Matrix::load(data, (levels, count), &Device::Cpu)?)
}

// ============================================================================
// Simple
// ============================================================================

/// One free embedding row per level.
#[derive(Debug)]
pub struct SimpleEffectLoader {
    effect: EffectColumn,
    parameter: Parameter,
}

impl SimpleEffectLoader {
    /// `index` is `(raw_column, levels)`.
    pub fn new(samples: usize, dim: usize, index: (usize, usize)) -> Result<Self, StageError> {
        let effect = EffectColumn::new(samples, dim, index)?;
        let parameter = Parameter::randn((effect.levels, dim), &Device::Cpu)?;
        Ok(Self { effect, parameter })
    }

    pub fn with_rate(mut self, rate: f64) -> Self {
        self.effect.rate = rate;
        self
    }

    pub fn parameter(&self) -> &Parameter {
        &self.parameter
    }
}

impl Loader for SimpleEffectLoader {
    fn samples(&self) -> Dim {
        self.effect.column.cap()
    }

    fn outputs(&self) -> Dim {
        self.effect.dim
    }

    fn decoded(&self) -> Dim {
        Dim::ONE
    }

    fn load(&self, raw: &Matrix) -> Result<Matrix, StageError> {
        self.effect.load(raw, &self.encoder()?)
    }

    fn unload(&self, data: &Matrix) -> Result<Matrix, StageError> {
        self.effect.unload(data, &self.encoder()?)
    }

    fn accumulate(&mut self, grads: &Gradients) -> Result<(), StageError> {
        self.parameter.accumulate(grads)?;
        Ok(())
    }

    fn update(&mut self) -> Result<(), StageError> {
        descend(&mut self.parameter, self.effect.rate)
    }

    fn move_to(&mut self, device: &Device) -> Result<(), StageError> {
        Ok(self.parameter.move_to(device)?)
    }
}

impl EffectLoader for SimpleEffectLoader {
    fn encoder(&self) -> Result<Matrix, StageError> {
        Ok(self.parameter.value()?)
    }

    fn column(&self) -> &Index {
        &self.effect.column
    }

    fn levels(&self) -> usize {
        self.effect.levels
    }

    fn rate(&self) -> f64 {
        self.effect.rate
    }
}

// ============================================================================
// Grouped
// ============================================================================

/// Levels in the same group share one embedding row.
#[derive(Debug)]
pub struct GroupedEffectLoader {
    effect: EffectColumn,
    grouper: Matrix,
    parameter: Parameter,
}

impl GroupedEffectLoader {
    /// `groups` assigns each of the `levels` a group below `groups.cap()`.
    pub fn new(
        samples: usize,
        dim: usize,
        index: (usize, usize),
        groups: &Index,
    ) -> Result<Self, StageError> {
        let effect = EffectColumn::new(samples, dim, index)?;
        check_dim("grouped effect levels", Dim::new(effect.levels), groups.dim())?;
        let parameter = Parameter::randn((groups.cap().get(), dim), &Device::Cpu)?;
        Ok(Self {
            effect,
            grouper: remap(groups)?,
            parameter,
        })
    }

    pub fn with_rate(mut self, rate: f64) -> Self {
        self.effect.rate = rate;
        self
    }
}

impl Loader for GroupedEffectLoader {
    fn samples(&self) -> Dim {
        self.effect.column.cap()
    }

    fn outputs(&self) -> Dim {
        self.effect.dim
    }

    fn decoded(&self) -> Dim {
        Dim::ONE
    }

    fn load(&self, raw: &Matrix) -> Result<Matrix, StageError> {
        self.effect.load(raw, &self.encoder()?)
    }

    fn unload(&self, data: &Matrix) -> Result<Matrix, StageError> {
        self.effect.unload(data, &self.encoder()?)
    }

    fn accumulate(&mut self, grads: &Gradients) -> Result<(), StageError> {
        self.parameter.accumulate(grads)?;
        Ok(())
    }

    fn update(&mut self) -> Result<(), StageError> {
        descend(&mut self.parameter, self.effect.rate)
    }

    fn move_to(&mut self, device: &Device) -> Result<(), StageError> {
        self.grouper = self.grouper.move_to(device)?;
        Ok(self.parameter.move_to(device)?)
    }
}

impl EffectLoader for GroupedEffectLoader {
    fn encoder(&self) -> Result<Matrix, StageError> {
        Ok(self.grouper.matmul(&self.parameter.value()?)?)
    }

    fn column(&self) -> &Index {
        &self.effect.column
    }

    fn levels(&self) -> usize {
        self.effect.levels
    }

    fn rate(&self) -> f64 {
        self.effect.rate
    }
}

// ============================================================================
// Nested
// ============================================================================

/// A grouped effect added on top of a finer child effect.
///
/// The encoder is `remap(groups) @ parameter + child.encoder()`, so levels in
/// one group share a common offset while keeping their own child embedding.
/// Gradients and updates are forwarded to the child as well.
pub struct NestedEffectLoader {
    effect: EffectColumn,
    grouper: Matrix,
    parameter: Parameter,
    child: Box<dyn EffectLoader>,
}

impl NestedEffectLoader {
    /// Without an explicit rate the child's rate is used.
    pub fn new(
        child: Box<dyn EffectLoader>,
        groups: &Index,
        rate: Option<f64>,
    ) -> Result<Self, StageError> {
        check_dim("nested effect levels", Dim::new(child.levels()), groups.dim())?;
        let dim = child.outputs();
        let effect = EffectColumn {
            column: child.column().clone(),
            levels: child.levels(),
            dim,
            rate: rate.unwrap_or_else(|| child.rate()),
        };
        let parameter = Parameter::randn((groups.cap().get(), dim.get()), &Device::Cpu)?;
        Ok(Self {
            effect,
            grouper: remap(groups)?,
            parameter,
            child,
        })
    }
}

impl Loader for NestedEffectLoader {
    fn samples(&self) -> Dim {
        self.effect.column.cap()
    }

    fn outputs(&self) -> Dim {
        self.effect.dim
    }

    fn decoded(&self) -> Dim {
        Dim::ONE
    }

    fn load(&self, raw: &Matrix) -> Result<Matrix, StageError> {
        self.effect.load(raw, &self.encoder()?)
    }

    fn unload(&self, data: &Matrix) -> Result<Matrix, StageError> {
        self.effect.unload(data, &self.encoder()?)
    }

    fn accumulate(&mut self, grads: &Gradients) -> Result<(), StageError> {
        self.parameter.accumulate(grads)?;
        self.child.accumulate(grads)
    }

    fn update(&mut self) -> Result<(), StageError> {
        descend(&mut self.parameter, self.effect.rate)?;
        self.child.update()
    }

    fn move_to(&mut self, device: &Device) -> Result<(), StageError> {
        self.grouper = self.grouper.move_to(device)?;
        self.parameter.move_to(device)?;
        self.child.move_to(device)
    }
}

impl EffectLoader for NestedEffectLoader {
    fn encoder(&self) -> Result<Matrix, StageError> {
        let own = self.grouper.matmul(&self.parameter.value()?)?;
        Ok(own.add(&self.child.encoder()?)?)
    }

    fn column(&self) -> &Index {
        &self.effect.column
    }

    fn levels(&self) -> usize {
        self.effect.levels
    }

    fn rate(&self) -> f64 {
        self.effect.rate
    }
}
