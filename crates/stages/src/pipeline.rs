//! # Pipeline
//!
//! A [`Pipeline`] bundles one conditioner, interceptor, penalizer and loader
//! whose widths agree:
//!
//! ```text
//! raw (S) --load--> data (D) --condition--> condition (C)
//!                                  generator (C) --> intermediate (G)
//!                   (C, G) --prepare--> discriminable (D)
//!                   (C, G) --loss-----> 1 × 1
//! ```
//!
//! ## Presets
//!
//! | Preset | Conditioner | Interceptor | Penalizer | Loader |
//! |--------|-------------|-------------|-----------|--------|
//! | [`Pipeline::category`] | block | softmax | entropy | one-hot |
//! | [`Pipeline::categories`] | block | softmax | entropy | one-hot |
//! | [`Pipeline::standardize`] | none | direct | static | standardize |
//! | [`Pipeline::positional`] | none | direct | static | positional |
//! | [`Pipeline::direct`] / [`Pipeline::effect`] | none | direct | static | given |
//! | [`Pipeline::joint`] | joint | joint | joint | pooled |

use tabgan_core::{Device, Dim, Gradients, Index, Matrix};

use crate::conditioner::{BlockConditioner, Conditioner, JointConditioner, NoneConditioner};
use crate::error::{check_dim, StageError};
use crate::interceptor::{DirectInterceptor, Interceptor, JointInterceptor, SoftmaxInterceptor};
use crate::loader::{
    EffectLoader, Loader, OneHotLoader, PooledLoader, PositionalLoader, StandardizeLoader,
};
use crate::penalizer::{EntropyPenalizer, JointPenalizer, Penalizer, StaticPenalizer};

/// The four transforming stages of one column group.
pub struct Pipeline {
    conditioner: Box<dyn Conditioner>,
    interceptor: Box<dyn Interceptor>,
    penalizer: Box<dyn Penalizer>,
    loader: Box<dyn Loader>,
}

/// The stages of a pipeline, taken apart.
pub type Parts = (
    Box<dyn Conditioner>,
    Box<dyn Interceptor>,
    Box<dyn Penalizer>,
    Box<dyn Loader>,
);

impl Pipeline {
    /// Bundle four stages, checking that neighbouring widths agree.
    pub fn new(
        conditioner: Box<dyn Conditioner>,
        interceptor: Box<dyn Interceptor>,
        penalizer: Box<dyn Penalizer>,
        loader: Box<dyn Loader>,
    ) -> Result<Self, StageError> {
        check_dim(
            "interceptor conditions",
            conditioner.conditions(),
            interceptor.conditions(),
        )?;
        check_dim(
            "penalizer conditions",
            conditioner.conditions(),
            penalizer.conditions(),
        )?;
        check_dim(
            "penalizer intermediates",
            interceptor.intermediates(),
            penalizer.intermediates(),
        )?;
        check_dim("interceptor outputs", loader.outputs(), interceptor.outputs())?;
        check_dim("conditioner outputs", loader.outputs(), conditioner.outputs())?;
        Ok(Self {
            conditioner,
            interceptor,
            penalizer,
            loader,
        })
    }

    // ========================================================================
    // Presets
    // ========================================================================

    /// One categorical column `(raw_column, bins)`, always conditioned on.
    pub fn category(samples: usize, (column, bins): (usize, usize)) -> Result<Self, StageError> {
        Self::new(
            Box::new(BlockConditioner::new(bins, bins, &[(0, bins)], 1)?),
            Box::new(SoftmaxInterceptor::new(bins, bins, bins, &[(0, bins)])?),
            Box::new(EntropyPenalizer::new(bins, bins, &[(0, 0, bins)])?),
            Box::new(OneHotLoader::new(samples, &[(column, bins)])?),
        )
    }

    /// Several categorical columns `(raw_column, bins)` totalling `width`
    /// encoded columns, `picks` of which are conditioned on per row.
    pub fn categories(
        samples: usize,
        width: usize,
        index: &[(usize, usize)],
        picks: usize,
    ) -> Result<Self, StageError> {
        let total = index.iter().map(|&(_, bins)| Dim::new(bins)).sum();
        check_dim("categories width", Dim::new(width), total)?;
        let mut offset = 0;
        let blocks: Vec<(usize, usize)> = index
            .iter()
            .map(|&(_, bins)| {
                let block = (offset, bins);
                offset += bins;
                block
            })
            .collect();
        let pairs: Vec<(usize, usize, usize)> =
            blocks.iter().map(|&(start, size)| (start, start, size)).collect();
        Self::new(
            Box::new(BlockConditioner::new(width, width, &blocks, picks)?),
            Box::new(SoftmaxInterceptor::new(width, width, width, &blocks)?),
            Box::new(EntropyPenalizer::new(width, width, &pairs)?),
            Box::new(OneHotLoader::new(samples, index)?),
        )
    }

    /// Z-score the raw `columns` using statistics of `reference`.
    pub fn standardize(
        samples: usize,
        columns: &[usize],
        reference: &Matrix,
    ) -> Result<Self, StageError> {
        let index = Index::new(columns.to_vec(), samples)?;
        Self::direct(Box::new(StandardizeLoader::new(index, reference)?))
    }

    /// Sinusoidal encoding of one ordinal column with values in `0..=max`.
    pub fn positional(
        samples: usize,
        column: usize,
        dim: usize,
        max: usize,
    ) -> Result<Self, StageError> {
        Self::direct(Box::new(PositionalLoader::new(samples, column, dim, max)?))
    }

    /// Unconditioned pass-through around an arbitrary loader.
    pub fn direct(loader: Box<dyn Loader>) -> Result<Self, StageError> {
        let outputs = loader.outputs().get();
        Self::new(
            Box::new(NoneConditioner::new(outputs)),
            Box::new(DirectInterceptor::new(0, outputs)),
            Box::new(StaticPenalizer::new(0, outputs)),
            loader,
        )
    }

    /// Unconditioned pass-through around a learned random effect.
    pub fn effect(loader: impl EffectLoader + 'static) -> Result<Self, StageError> {
        Self::direct(Box::new(loader))
    }

    /// Lay several pipelines side by side.
    ///
    /// Conditions, intermediates and encodings are concatenated in order.
    /// Every part reads the same raw rows.
    pub fn joint(
        conditions: usize,
        intermediates: usize,
        outputs: usize,
        parts: Vec<Pipeline>,
    ) -> Result<Self, StageError> {
        let samples = parts
            .first()
            .map(|p| p.samples().get())
            .ok_or_else(|| StageError::config("joint pipeline needs at least one part"))?;
        let mut conditioners = Vec::with_capacity(parts.len());
        let mut interceptors = Vec::with_capacity(parts.len());
        let mut penalizers = Vec::with_capacity(parts.len());
        let mut loaders = Vec::with_capacity(parts.len());
        for part in parts {
            let (c, i, p, l) = part.into_parts();
            conditioners.push(c);
            interceptors.push(i);
            penalizers.push(p);
            loaders.push(l);
        }
        Self::new(
            Box::new(JointConditioner::new(conditions, outputs, conditioners)?),
            Box::new(JointInterceptor::new(
                conditions,
                intermediates,
                outputs,
                interceptors,
            )?),
            Box::new(JointPenalizer::new(conditions, intermediates, penalizers)?),
            Box::new(PooledLoader::new(samples, outputs, loaders)?),
        )
    }

    pub fn into_parts(self) -> Parts {
        (self.conditioner, self.interceptor, self.penalizer, self.loader)
    }

    // ========================================================================
    // Widths
    // ========================================================================

    pub fn samples(&self) -> Dim {
        self.loader.samples()
    }

    pub fn conditions(&self) -> Dim {
        self.conditioner.conditions()
    }

    pub fn intermediates(&self) -> Dim {
        self.interceptor.intermediates()
    }

    pub fn outputs(&self) -> Dim {
        self.loader.outputs()
    }

    pub fn decoded(&self) -> Dim {
        self.loader.decoded()
    }

    // ========================================================================
    // Delegation
    // ========================================================================

    pub fn condition(&mut self, data: &Matrix) -> Result<Matrix, StageError> {
        self.conditioner.condition(data)
    }

    pub fn prepare(&self, condition: &Matrix, intermediate: &Matrix) -> Result<Matrix, StageError> {
        self.interceptor.prepare(condition, intermediate)
    }

    pub fn loss(&self, condition: &Matrix, intermediate: &Matrix) -> Result<Matrix, StageError> {
        self.penalizer.loss(condition, intermediate)
    }

    pub fn load(&self, raw: &Matrix) -> Result<Matrix, StageError> {
        self.loader.load(raw)
    }

    pub fn unload(&self, data: &Matrix) -> Result<Matrix, StageError> {
        self.loader.unload(data)
    }

    pub fn accumulate(&mut self, grads: &Gradients) -> Result<(), StageError> {
        self.conditioner.accumulate(grads)?;
        self.interceptor.accumulate(grads)?;
        self.penalizer.accumulate(grads)?;
        self.loader.accumulate(grads)
    }

    pub fn update(&mut self) -> Result<(), StageError> {
        self.conditioner.update()?;
        self.interceptor.update()?;
        self.penalizer.update()?;
        self.loader.update()
    }

    pub fn move_to(&mut self, device: &Device) -> Result<(), StageError> {
        self.conditioner.move_to(device)?;
        self.loader.move_to(device)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::{DirectLoader, SimpleEffectLoader};

    #[test]
    fn test_category_widths() {
        let pipeline = Pipeline::category(3, (2, 4)).unwrap();
        assert_eq!(pipeline.samples(), Dim::new(3));
        assert_eq!(pipeline.conditions(), Dim::new(4));
        assert_eq!(pipeline.intermediates(), Dim::new(4));
        assert_eq!(pipeline.outputs(), Dim::new(4));
        assert_eq!(pipeline.decoded(), Dim::ONE);
    }

    #[test]
    fn test_categories_lays_blocks_end_to_end() {
        let pipeline = Pipeline::categories(4, 5, &[(3, 2), (0, 3)], 1).unwrap();
        assert_eq!(pipeline.outputs(), Dim::new(5));
        assert_eq!(pipeline.decoded(), Dim::new(2));
        assert!(Pipeline::categories(4, 6, &[(3, 2), (0, 3)], 1).is_err());
    }

    #[test]
    fn test_new_rejects_disagreeing_stages() {
        let result = Pipeline::new(
            Box::new(NoneConditioner::new(2)),
            Box::new(DirectInterceptor::new(0, 3)),
            Box::new(StaticPenalizer::new(0, 3)),
            Box::new(DirectLoader::identity(2)),
        );
        assert!(matches!(result, Err(StageError::DimensionMismatch { .. })));
    }

    #[test]
    fn test_joint_concatenates_parts() {
        let reference = Matrix::from_rows(
            &[vec![1.0, 0.0, 5.0], vec![3.0, 1.0, 6.0], vec![2.0, 2.0, 7.0]],
            3,
            &Device::Cpu,
        )
        .unwrap();
        let parts = vec![
            Pipeline::standardize(3, &[0, 2], &reference).unwrap(),
            Pipeline::category(3, (1, 3)).unwrap(),
            Pipeline::effect(SimpleEffectLoader::new(3, 2, (1, 3)).unwrap()).unwrap(),
        ];
        let joint = Pipeline::joint(3, 7, 7, parts).unwrap();
        assert_eq!(joint.samples(), Dim::new(3));
        assert_eq!(joint.decoded(), Dim::new(4));

        let data = joint.load(&reference).unwrap();
        assert_eq!(data.shape().dims(), (3, 7));
        assert_eq!(data.to_rows().unwrap()[1][2..5], [0.0, 1.0, 0.0]);
    }

    #[test]
    fn test_joint_rejects_wrong_totals() {
        let parts = vec![
            Pipeline::category(2, (0, 3)).unwrap(),
            Pipeline::category(2, (1, 4)).unwrap(),
        ];
        assert!(matches!(
            Pipeline::joint(8, 7, 7, parts),
            Err(StageError::DimensionMismatch { .. })
        ));
        assert!(Pipeline::joint(0, 0, 0, Vec::new()).is_err());
    }
}
