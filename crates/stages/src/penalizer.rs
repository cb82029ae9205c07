//! # Penalizers
//!
//! A penalizer computes an auxiliary `1 × 1` generator loss from the
//! condition and the raw intermediate, independent of the discriminator.

use tabgan_core::{Axis, Dim, Gradients, Index, Matrix, Shape};

use crate::backmap::BackMap;
use crate::error::{check_dim, StageError};

/// Auxiliary loss on generator output.
pub trait Penalizer {
    fn conditions(&self) -> Dim;
    fn intermediates(&self) -> Dim;

    /// Always a `1 × 1` matrix.
    fn loss(&self, condition: &Matrix, intermediate: &Matrix) -> Result<Matrix, StageError>;

    fn accumulate(&mut self, _grads: &Gradients) -> Result<(), StageError> {
        Ok(())
    }

    fn update(&mut self) -> Result<(), StageError> {
        Ok(())
    }
}

fn check_inputs(
    stage: &dyn Penalizer,
    condition: &Matrix,
    intermediate: &Matrix,
) -> Result<(), StageError> {
    condition.expect_cols(stage.conditions())?;
    intermediate.expect_shape(Shape {
        rows: condition.rows(),
        cols: stage.intermediates(),
    })?;
    Ok(())
}

// ============================================================================
// Entropy / Static
// ============================================================================

/// Cross entropy between conditioned one-hot blocks and generator logits.
///
/// Each block pairs a condition range with an intermediate range of the same
/// size. A row is charged only when its condition block is non-zero, i.e.
/// when that block was revealed to the generator. The sum is averaged over
/// the batch.
#[derive(Debug, Clone)]
pub struct EntropyPenalizer {
    conditions: Dim,
    intermediates: Dim,
    blocks: Vec<(Index, Index)>,
}

impl EntropyPenalizer {
    /// `index` holds `(condition_start, intermediate_start, size)` triples.
    pub fn new(
        conditions: usize,
        intermediates: usize,
        index: &[(usize, usize, usize)],
    ) -> Result<Self, StageError> {
        let total = index.iter().map(|&(_, _, size)| Dim::new(size)).sum();
        check_dim("entropy penalizer sizes", Dim::new(conditions), total)?;
        let blocks = index
            .iter()
            .map(|&(c, d, size)| {
                Ok((
                    Index::slice(c, size, conditions)?,
                    Index::slice(d, size, intermediates)?,
                ))
            })
            .collect::<Result<Vec<_>, StageError>>()?;
        Ok(Self {
            conditions: Dim::new(conditions),
            intermediates: Dim::new(intermediates),
            blocks,
        })
    }
}

impl Penalizer for EntropyPenalizer {
    fn conditions(&self) -> Dim {
        self.conditions
    }

    fn intermediates(&self) -> Dim {
        self.intermediates
    }

    fn loss(&self, condition: &Matrix, intermediate: &Matrix) -> Result<Matrix, StageError> {
        check_inputs(self, condition, intermediate)?;
        let n = condition.rows().get();
        if n == 0 || self.blocks.is_empty() {
            return Ok(Matrix::zeros(Shape::scalar(), condition.device())?);
        }
        let mut terms = Vec::with_capacity(self.blocks.len());
        for (c_idx, d_idx) in &self.blocks {
            let block = condition.columns(c_idx)?;
            let weight = block.sum(Axis::Cols)?;
            let target = block.argmax(Axis::Cols)?;
            let entropy = Matrix::cross_entropy(&intermediate.columns(d_idx)?, &target)?;
            terms.push(weight.mul(&entropy)?);
        }
        Ok(Matrix::sums(&terms)?
            .sum(Axis::Rows)?
            .affine(1.0 / n as f64, 0.0)?)
    }
}

/// Always zero.
#[derive(Debug, Clone)]
pub struct StaticPenalizer {
    conditions: Dim,
    intermediates: Dim,
}

impl StaticPenalizer {
    pub fn new(conditions: usize, intermediates: usize) -> Self {
        Self {
            conditions: Dim::new(conditions),
            intermediates: Dim::new(intermediates),
        }
    }
}

impl Penalizer for StaticPenalizer {
    fn conditions(&self) -> Dim {
        self.conditions
    }

    fn intermediates(&self) -> Dim {
        self.intermediates
    }

    fn loss(&self, condition: &Matrix, intermediate: &Matrix) -> Result<Matrix, StageError> {
        check_inputs(self, condition, intermediate)?;
        Ok(Matrix::zeros(Shape::scalar(), condition.device())?)
    }
}

// ============================================================================
// Combinators
// ============================================================================

fn total(losses: Vec<Matrix>, condition: &Matrix) -> Result<Matrix, StageError> {
    if losses.is_empty() {
        return Ok(Matrix::zeros(Shape::scalar(), condition.device())?);
    }
    Ok(Matrix::sums(&losses)?)
}

/// Children own consecutive ranges of condition and intermediate; losses add.
pub struct JointPenalizer {
    children: Vec<Box<dyn Penalizer>>,
    conditions: BackMap,
    intermediates: BackMap,
}

impl JointPenalizer {
    pub fn new(
        conditions: usize,
        intermediates: usize,
        children: Vec<Box<dyn Penalizer>>,
    ) -> Result<Self, StageError> {
        let conditions = BackMap::new(
            "joint penalizer conditions",
            children.iter().map(|c| c.conditions()),
            Dim::new(conditions),
        )?;
        let intermediates = BackMap::new(
            "joint penalizer intermediates",
            children.iter().map(|c| c.intermediates()),
            Dim::new(intermediates),
        )?;
        Ok(Self {
            children,
            conditions,
            intermediates,
        })
    }
}

impl Penalizer for JointPenalizer {
    fn conditions(&self) -> Dim {
        self.conditions.total()
    }

    fn intermediates(&self) -> Dim {
        self.intermediates.total()
    }

    fn loss(&self, condition: &Matrix, intermediate: &Matrix) -> Result<Matrix, StageError> {
        check_inputs(self, condition, intermediate)?;
        let losses = self
            .children
            .iter()
            .enumerate()
            .map(|(i, child)| {
                child.loss(
                    &self.conditions.route(condition, i)?,
                    &self.intermediates.route(intermediate, i)?,
                )
            })
            .collect::<Result<Vec<_>, _>>()?;
        total(losses, condition)
    }

    fn accumulate(&mut self, grads: &Gradients) -> Result<(), StageError> {
        self.children.iter_mut().try_for_each(|c| c.accumulate(grads))
    }

    fn update(&mut self) -> Result<(), StageError> {
        self.children.iter_mut().try_for_each(|c| c.update())
    }
}

/// Children share the same inputs; losses add.
pub struct PooledPenalizer {
    conditions: Dim,
    intermediates: Dim,
    children: Vec<Box<dyn Penalizer>>,
}

impl PooledPenalizer {
    pub fn new(
        conditions: usize,
        intermediates: usize,
        children: Vec<Box<dyn Penalizer>>,
    ) -> Result<Self, StageError> {
        for child in &children {
            check_dim("pooled penalizer conditions", Dim::new(conditions), child.conditions())?;
            check_dim(
                "pooled penalizer intermediates",
                Dim::new(intermediates),
                child.intermediates(),
            )?;
        }
        Ok(Self {
            conditions: Dim::new(conditions),
            intermediates: Dim::new(intermediates),
            children,
        })
    }
}

impl Penalizer for PooledPenalizer {
    fn conditions(&self) -> Dim {
        self.conditions
    }

    fn intermediates(&self) -> Dim {
        self.intermediates
    }

    fn loss(&self, condition: &Matrix, intermediate: &Matrix) -> Result<Matrix, StageError> {
        check_inputs(self, condition, intermediate)?;
        let losses = self
            .children
            .iter()
            .map(|child| child.loss(condition, intermediate))
            .collect::<Result<Vec<_>, _>>()?;
        total(losses, condition)
    }

    fn accumulate(&mut self, grads: &Gradients) -> Result<(), StageError> {
        self.children.iter_mut().try_for_each(|c| c.accumulate(grads))
    }

    fn update(&mut self) -> Result<(), StageError> {
        self.children.iter_mut().try_for_each(|c| c.update())
    }
}
