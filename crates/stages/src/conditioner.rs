//! # Conditioners
//!
//! A conditioner derives the generator's conditioning vector from a batch of
//! encoded data. It reads `outputs` columns and produces `conditions`.
//!
//! ## Variants
//!
//! - [`BlockConditioner`]: reveals a random subset of column blocks per row
//! - [`NoneConditioner`]: no conditions at all
//! - [`JointConditioner`]: children own disjoint column ranges of the data
//! - [`PooledConditioner`]: children all read the full data

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tabgan_core::{Axis, Device, Dim, Gradients, Index, Matrix};

use crate::backmap::BackMap;
use crate::error::{check_dim, StageError};

/// Derives conditions from encoded data.
pub trait Conditioner {
    /// Width of the produced conditions.
    fn conditions(&self) -> Dim;

    /// Width of the encoded data consumed.
    fn outputs(&self) -> Dim;

    /// Condition a batch. Draws randomness, hence `&mut self`.
    fn condition(&mut self, data: &Matrix) -> Result<Matrix, StageError>;

    fn accumulate(&mut self, _grads: &Gradients) -> Result<(), StageError> {
        Ok(())
    }

    fn update(&mut self) -> Result<(), StageError> {
        Ok(())
    }

    fn move_to(&mut self, _device: &Device) -> Result<(), StageError> {
        Ok(())
    }
}

// ============================================================================
// Block Conditioner
// ============================================================================

/// Exposes `picks` randomly chosen blocks of each row as its condition.
///
/// Blocks are `(start, size)` column ranges of the data. Per row, `picks`
/// block numbers are drawn with replacement and their union is kept; the
/// condition is the concatenation of all blocks with unselected ones zeroed.
#[derive(Debug)]
pub struct BlockConditioner {
    outputs: Dim,
    conditions: Dim,
    picks: usize,
    blocks: Vec<Index>,
    /// `chunks × conditions`: row `b` marks the condition columns of block `b`.
    expand: Matrix,
    rng: StdRng,
}

impl BlockConditioner {
    pub fn new(
        outputs: usize,
        conditions: usize,
        index: &[(usize, usize)],
        picks: usize,
    ) -> Result<Self, StageError> {
        let total: usize = index.iter().map(|&(_, size)| size).sum();
        check_dim("block conditioner sizes", Dim::new(conditions), Dim::new(total))?;
        if picks == 0 || picks > index.len() {
            return Err(StageError::config(format!(
                "picks must be in 1..={}, got {picks}",
                index.len()
            )));
        }
        let blocks = index
            .iter()
            .map(|&(start, size)| Index::slice(start, size, outputs))
            .collect::<Result<Vec<_>, _>>()?;

        let chunks = index.len();
        let mut expand = vec![0f32; chunks * conditions];
        let mut column = 0;
        for (b, &(_, size)) in index.iter().enumerate() {
            for c in column..column + size {
                expand[b * conditions + c] = 1.0;
            }
            column += size;
        }
        let expand = Matrix::load(expand, (chunks, conditions), &Device::Cpu)?;

        Ok(Self {
            outputs: Dim::new(outputs),
            conditions: Dim::new(conditions),
            picks,
            blocks,
            expand,
            rng: StdRng::from_entropy(),
        })
    }

    /// Replace the entropy-seeded RNG with a deterministic one.
    pub fn seeded(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    /// Per-row union of picked blocks, `n × chunks`, values in {0, 1}.
    fn picked(&mut self, n: usize, device: &Device) -> Result<Matrix, StageError> {
        let chunks = self.blocks.len();
        let mut mask = vec![0f32; n * chunks];
        for row in 0..n {
            for _ in 0..self.picks {
                let block = self.rng.gen_range(0..chunks);
                mask[row * chunks + block] = 1.0;
            }
        }
        Ok(Matrix::load(mask, (n, chunks), device)?)
    }
}

impl Conditioner for BlockConditioner {
    fn conditions(&self) -> Dim {
        self.conditions
    }

    fn outputs(&self) -> Dim {
        self.outputs
    }

    fn condition(&mut self, data: &Matrix) -> Result<Matrix, StageError> {
        data.expect_cols(self.outputs)?;
        let n = data.rows().get();
        let clones = self
            .blocks
            .iter()
            .map(|block| Ok(data.columns(block)?.detach()))
            .collect::<Result<Vec<_>, StageError>>()?;
        let refs: Vec<&Matrix> = clones.iter().collect();
        let cloned = Matrix::cat(&refs, Axis::Cols, (n, self.conditions.get()))?;

        let mask = self
            .picked(n, data.device())?
            .clamp(0.0, 1.0)?
            .matmul(&self.expand)?;
        Ok(cloned.mul(&mask)?)
    }

    fn move_to(&mut self, device: &Device) -> Result<(), StageError> {
        self.expand = self.expand.move_to(device)?;
        Ok(())
    }
}

// ============================================================================
// None Conditioner
// ============================================================================

/// Produces an empty `n × 0` condition.
#[derive(Debug, Clone)]
pub struct NoneConditioner {
    outputs: Dim,
}

impl NoneConditioner {
    pub fn new(outputs: usize) -> Self {
        Self {
            outputs: Dim::new(outputs),
        }
    }
}

impl Conditioner for NoneConditioner {
    fn conditions(&self) -> Dim {
        Dim::ZERO
    }

    fn outputs(&self) -> Dim {
        self.outputs
    }

    fn condition(&mut self, data: &Matrix) -> Result<Matrix, StageError> {
        data.expect_cols(self.outputs)?;
        Ok(Matrix::zeros((data.rows().get(), 0), data.device())?)
    }
}

// ============================================================================
// Combinators
// ============================================================================

/// Children own consecutive column ranges of the data, in order.
pub struct JointConditioner {
    conditions: Dim,
    outputs: Dim,
    children: Vec<Box<dyn Conditioner>>,
    backmap: BackMap,
}

impl JointConditioner {
    pub fn new(
        conditions: usize,
        outputs: usize,
        children: Vec<Box<dyn Conditioner>>,
    ) -> Result<Self, StageError> {
        check_dim(
            "joint conditioner conditions",
            Dim::new(conditions),
            children.iter().map(|c| c.conditions()).sum(),
        )?;
        let backmap = BackMap::new(
            "joint conditioner outputs",
            children.iter().map(|c| c.outputs()),
            Dim::new(outputs),
        )?;
        Ok(Self {
            conditions: Dim::new(conditions),
            outputs: Dim::new(outputs),
            children,
            backmap,
        })
    }
}

impl Conditioner for JointConditioner {
    fn conditions(&self) -> Dim {
        self.conditions
    }

    fn outputs(&self) -> Dim {
        self.outputs
    }

    fn condition(&mut self, data: &Matrix) -> Result<Matrix, StageError> {
        let mut parts = Vec::with_capacity(self.children.len());
        for (i, child) in self.children.iter_mut().enumerate() {
            parts.push(child.condition(&self.backmap.route(data, i)?)?);
        }
        let refs: Vec<&Matrix> = parts.iter().collect();
        Ok(Matrix::cat(&refs, Axis::Cols, (data.rows().get(), self.conditions.get()))?)
    }

    fn accumulate(&mut self, grads: &Gradients) -> Result<(), StageError> {
        self.children.iter_mut().try_for_each(|c| c.accumulate(grads))
    }

    fn update(&mut self) -> Result<(), StageError> {
        self.children.iter_mut().try_for_each(|c| c.update())
    }

    fn move_to(&mut self, device: &Device) -> Result<(), StageError> {
        self.children.iter_mut().try_for_each(|c| c.move_to(device))
    }
}

/// Every child reads the full data; conditions are concatenated.
pub struct PooledConditioner {
    conditions: Dim,
    outputs: Dim,
    children: Vec<Box<dyn Conditioner>>,
}

impl PooledConditioner {
    pub fn new(
        conditions: usize,
        outputs: usize,
        children: Vec<Box<dyn Conditioner>>,
    ) -> Result<Self, StageError> {
        check_dim(
            "pooled conditioner conditions",
            Dim::new(conditions),
            children.iter().map(|c| c.conditions()).sum(),
        )?;
        for child in &children {
            check_dim("pooled conditioner outputs", Dim::new(outputs), child.outputs())?;
        }
        Ok(Self {
            conditions: Dim::new(conditions),
            outputs: Dim::new(outputs),
            children,
        })
    }
}

impl Conditioner for PooledConditioner {
    fn conditions(&self) -> Dim {
        self.conditions
    }

    fn outputs(&self) -> Dim {
        self.outputs
    }

    fn condition(&mut self, data: &Matrix) -> Result<Matrix, StageError> {
        data.expect_cols(self.outputs)?;
        let parts = self
            .children
            .iter_mut()
            .map(|c| c.condition(data))
            .collect::<Result<Vec<_>, _>>()?;
        let refs: Vec<&Matrix> = parts.iter().collect();
        Ok(Matrix::cat(&refs, Axis::Cols, (data.rows().get(), self.conditions.get()))?)
    }

    fn accumulate(&mut self, grads: &Gradients) -> Result<(), StageError> {
        self.children.iter_mut().try_for_each(|c| c.accumulate(grads))
    }

    fn update(&mut self) -> Result<(), StageError> {
        self.children.iter_mut().try_for_each(|c| c.update())
    }

    fn move_to(&mut self, device: &Device) -> Result<(), StageError> {
        self.children.iter_mut().try_for_each(|c| c.move_to(device))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn data(rows: &[Vec<f32>]) -> Matrix {
        Matrix::from_rows(rows, rows[0].len(), &Device::Cpu).unwrap()
    }

    #[test]
    fn test_block_validation() {
        assert!(BlockConditioner::new(6, 4, &[(0, 2), (3, 2)], 1).is_ok());
        assert!(matches!(
            BlockConditioner::new(6, 5, &[(0, 2), (3, 2)], 1),
            Err(StageError::DimensionMismatch { .. })
        ));
        assert!(BlockConditioner::new(6, 4, &[(0, 2), (3, 2)], 3).is_err());
        assert!(BlockConditioner::new(6, 4, &[(0, 2), (3, 2)], 0).is_err());
        assert!(BlockConditioner::new(4, 4, &[(0, 2), (3, 2)], 1).is_err());
    }

    #[test]
    fn test_single_block_all_picked() {
        let mut cond = BlockConditioner::new(3, 2, &[(1, 2)], 1).unwrap().seeded(5);
        let out = cond.condition(&data(&[vec![9.0, 1.0, 2.0], vec![9.0, 3.0, 4.0]])).unwrap();
        assert_eq!(out.to_rows().unwrap(), vec![vec![1.0, 2.0], vec![3.0, 4.0]]);
    }

    #[test]
    fn test_condition_only_copies_data() {
        let mut cond = BlockConditioner::new(4, 4, &[(0, 1), (1, 1), (2, 2)], 3)
            .unwrap()
            .seeded(11);
        let row = vec![1.0, 2.0, 3.0, 4.0];
        let out = cond.condition(&data(&vec![row.clone(); 50])).unwrap();
        for r in out.to_rows().unwrap() {
            for (got, want) in r.iter().zip(&row) {
                assert!(*got == 0.0 || got == want);
            }
        }
    }

    #[test]
    fn test_none_conditioner_is_empty() {
        let mut cond = NoneConditioner::new(2);
        let out = cond.condition(&data(&vec![vec![1.0, 2.0]; 3])).unwrap();
        assert_eq!(out.shape(), tabgan_core::Shape::new(3, 0));
        assert!(cond.condition(&data(&vec![vec![1.0]; 3])).is_err());
    }

    #[test]
    fn test_joint_mismatch_fails() {
        let children: Vec<Box<dyn Conditioner>> = vec![
            Box::new(BlockConditioner::new(3, 3, &[(0, 3)], 1).unwrap()),
            Box::new(BlockConditioner::new(4, 4, &[(0, 4)], 1).unwrap()),
        ];
        assert!(matches!(
            JointConditioner::new(8, 7, children),
            Err(StageError::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn test_joint_routes_columns() {
        let children: Vec<Box<dyn Conditioner>> = vec![
            Box::new(NoneConditioner::new(1)),
            Box::new(BlockConditioner::new(2, 2, &[(0, 2)], 1).unwrap()),
        ];
        let mut joint = JointConditioner::new(2, 3, children).unwrap();
        let out = joint.condition(&data(&[vec![7.0, 1.0, 0.0]])).unwrap();
        assert_eq!(out.to_rows().unwrap(), vec![vec![1.0, 0.0]]);
    }

    #[test]
    fn test_pooled_shares_data() {
        let children: Vec<Box<dyn Conditioner>> = vec![
            Box::new(BlockConditioner::new(2, 1, &[(0, 1)], 1).unwrap()),
            Box::new(BlockConditioner::new(2, 1, &[(1, 1)], 1).unwrap()),
        ];
        let mut pooled = PooledConditioner::new(2, 2, children).unwrap();
        let out = pooled.condition(&data(&[vec![5.0, 6.0]])).unwrap();
        assert_eq!(out.to_rows().unwrap(), vec![vec![5.0, 6.0]]);
    }
}
