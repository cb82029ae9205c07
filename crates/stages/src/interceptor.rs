//! # Interceptors
//!
//! An interceptor turns raw generator output (`intermediates` columns) into
//! data the discriminator can compare with real samples (`outputs`
//! columns). It may look at the condition. Row count is always preserved.

use tabgan_core::{Axis, Dim, Gradients, Index, Matrix};

use crate::backmap::BackMap;
use crate::error::{check_dim, StageError};

/// Maps generator intermediates into discriminable space.
pub trait Interceptor {
    fn conditions(&self) -> Dim;
    fn intermediates(&self) -> Dim;
    fn outputs(&self) -> Dim;

    fn prepare(&self, condition: &Matrix, intermediate: &Matrix) -> Result<Matrix, StageError>;

    fn accumulate(&mut self, _grads: &Gradients) -> Result<(), StageError> {
        Ok(())
    }

    fn update(&mut self) -> Result<(), StageError> {
        Ok(())
    }
}

fn check_inputs(
    stage: &dyn Interceptor,
    condition: &Matrix,
    intermediate: &Matrix,
) -> Result<(), StageError> {
    condition.expect_cols(stage.conditions())?;
    intermediate.expect_shape(tabgan_core::Shape {
        rows: condition.rows(),
        cols: stage.intermediates(),
    })?;
    Ok(())
}

// ============================================================================
// Direct / Subset / Softmax
// ============================================================================

/// Passes the intermediate through untouched.
#[derive(Debug, Clone)]
pub struct DirectInterceptor {
    conditions: Dim,
    outputs: Dim,
}

impl DirectInterceptor {
    pub fn new(conditions: usize, outputs: usize) -> Self {
        Self {
            conditions: Dim::new(conditions),
            outputs: Dim::new(outputs),
        }
    }
}

impl Interceptor for DirectInterceptor {
    fn conditions(&self) -> Dim {
        self.conditions
    }

    fn intermediates(&self) -> Dim {
        self.outputs
    }

    fn outputs(&self) -> Dim {
        self.outputs
    }

    fn prepare(&self, condition: &Matrix, intermediate: &Matrix) -> Result<Matrix, StageError> {
        check_inputs(self, condition, intermediate)?;
        Ok(intermediate.clone())
    }
}

/// Gathers a fixed list of intermediate columns.
#[derive(Debug, Clone)]
pub struct SubsetInterceptor {
    conditions: Dim,
    index: Index,
}

impl SubsetInterceptor {
    /// `index` ranges over the intermediates; its length is the output width.
    pub fn new(conditions: usize, index: Index) -> Self {
        Self {
            conditions: Dim::new(conditions),
            index,
        }
    }
}

impl Interceptor for SubsetInterceptor {
    fn conditions(&self) -> Dim {
        self.conditions
    }

    fn intermediates(&self) -> Dim {
        self.index.cap()
    }

    fn outputs(&self) -> Dim {
        self.index.dim()
    }

    fn prepare(&self, condition: &Matrix, intermediate: &Matrix) -> Result<Matrix, StageError> {
        check_inputs(self, condition, intermediate)?;
        Ok(intermediate.columns(&self.index)?)
    }
}

/// Row-wise softmax over each declared block of the intermediate.
///
/// Used for one-hot categorical blocks, so generator logits become rows on
/// the probability simplex.
#[derive(Debug, Clone)]
pub struct SoftmaxInterceptor {
    conditions: Dim,
    intermediates: Dim,
    outputs: Dim,
    blocks: Vec<Index>,
}

impl SoftmaxInterceptor {
    pub fn new(
        conditions: usize,
        intermediates: usize,
        outputs: usize,
        index: &[(usize, usize)],
    ) -> Result<Self, StageError> {
        let total = index.iter().map(|&(_, size)| Dim::new(size)).sum();
        check_dim("softmax interceptor sizes", Dim::new(outputs), total)?;
        let blocks = index
            .iter()
            .map(|&(start, size)| Index::slice(start, size, intermediates))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            conditions: Dim::new(conditions),
            intermediates: Dim::new(intermediates),
            outputs: Dim::new(outputs),
            blocks,
        })
    }
}

impl Interceptor for SoftmaxInterceptor {
    fn conditions(&self) -> Dim {
        self.conditions
    }

    fn intermediates(&self) -> Dim {
        self.intermediates
    }

    fn outputs(&self) -> Dim {
        self.outputs
    }

    fn prepare(&self, condition: &Matrix, intermediate: &Matrix) -> Result<Matrix, StageError> {
        check_inputs(self, condition, intermediate)?;
        let parts = self
            .blocks
            .iter()
            .map(|block| intermediate.columns(block)?.softmax())
            .collect::<Result<Vec<_>, _>>()?;
        let refs: Vec<&Matrix> = parts.iter().collect();
        Ok(Matrix::cat(
            &refs,
            Axis::Cols,
            (intermediate.rows().get(), self.outputs.get()),
        )?)
    }
}

// ============================================================================
// Combinators
// ============================================================================

/// Children own consecutive ranges of both condition and intermediate.
pub struct JointInterceptor {
    outputs: Dim,
    children: Vec<Box<dyn Interceptor>>,
    conditions: BackMap,
    intermediates: BackMap,
}

impl JointInterceptor {
    pub fn new(
        conditions: usize,
        intermediates: usize,
        outputs: usize,
        children: Vec<Box<dyn Interceptor>>,
    ) -> Result<Self, StageError> {
        check_dim(
            "joint interceptor outputs",
            Dim::new(outputs),
            children.iter().map(|c| c.outputs()).sum(),
        )?;
        let conditions = BackMap::new(
            "joint interceptor conditions",
            children.iter().map(|c| c.conditions()),
            Dim::new(conditions),
        )?;
        let intermediates = BackMap::new(
            "joint interceptor intermediates",
            children.iter().map(|c| c.intermediates()),
            Dim::new(intermediates),
        )?;
        Ok(Self {
            outputs: Dim::new(outputs),
            children,
            conditions,
            intermediates,
        })
    }
}

impl Interceptor for JointInterceptor {
    fn conditions(&self) -> Dim {
        self.conditions.total()
    }

    fn intermediates(&self) -> Dim {
        self.intermediates.total()
    }

    fn outputs(&self) -> Dim {
        self.outputs
    }

    fn prepare(&self, condition: &Matrix, intermediate: &Matrix) -> Result<Matrix, StageError> {
        check_inputs(self, condition, intermediate)?;
        let parts = self
            .children
            .iter()
            .enumerate()
            .map(|(i, child)| {
                child.prepare(
                    &self.conditions.route(condition, i)?,
                    &self.intermediates.route(intermediate, i)?,
                )
            })
            .collect::<Result<Vec<_>, _>>()?;
        let refs: Vec<&Matrix> = parts.iter().collect();
        Ok(Matrix::cat(
            &refs,
            Axis::Cols,
            (intermediate.rows().get(), self.outputs.get()),
        )?)
    }

    fn accumulate(&mut self, grads: &Gradients) -> Result<(), StageError> {
        self.children.iter_mut().try_for_each(|c| c.accumulate(grads))
    }

    fn update(&mut self) -> Result<(), StageError> {
        self.children.iter_mut().try_for_each(|c| c.update())
    }
}

/// Children share the same inputs; their outputs are concatenated.
pub struct PooledInterceptor {
    conditions: Dim,
    intermediates: Dim,
    outputs: Dim,
    children: Vec<Box<dyn Interceptor>>,
}

impl PooledInterceptor {
    pub fn new(
        conditions: usize,
        intermediates: usize,
        outputs: usize,
        children: Vec<Box<dyn Interceptor>>,
    ) -> Result<Self, StageError> {
        for child in &children {
            check_dim("pooled interceptor conditions", Dim::new(conditions), child.conditions())?;
            check_dim(
                "pooled interceptor intermediates",
                Dim::new(intermediates),
                child.intermediates(),
            )?;
        }
        check_dim(
            "pooled interceptor outputs",
            Dim::new(outputs),
            children.iter().map(|c| c.outputs()).sum(),
        )?;
        Ok(Self {
            conditions: Dim::new(conditions),
            intermediates: Dim::new(intermediates),
            outputs: Dim::new(outputs),
            children,
        })
    }
}

impl Interceptor for PooledInterceptor {
    fn conditions(&self) -> Dim {
        self.conditions
    }

    fn intermediates(&self) -> Dim {
        self.intermediates
    }

    fn outputs(&self) -> Dim {
        self.outputs
    }

    fn prepare(&self, condition: &Matrix, intermediate: &Matrix) -> Result<Matrix, StageError> {
        check_inputs(self, condition, intermediate)?;
        let parts = self
            .children
            .iter()
            .map(|child| child.prepare(condition, intermediate))
            .collect::<Result<Vec<_>, _>>()?;
        let refs: Vec<&Matrix> = parts.iter().collect();
        Ok(Matrix::cat(
            &refs,
            Axis::Cols,
            (intermediate.rows().get(), self.outputs.get()),
        )?)
    }

    fn accumulate(&mut self, grads: &Gradients) -> Result<(), StageError> {
        self.children.iter_mut().try_for_each(|c| c.accumulate(grads))
    }

    fn update(&mut self) -> Result<(), StageError> {
        self.children.iter_mut().try_for_each(|c| c.update())
    }
}
