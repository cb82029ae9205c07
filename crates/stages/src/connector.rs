//! # Connector
//!
//! Binds a [`Sampler`] of raw rows to a [`Pipeline`]. The trainer only ever
//! talks to a connector: it draws encoded batches, conditions them, and
//! routes generator output through the interceptor and penalizer.

use tabgan_core::{Device, Dim, Gradients, Matrix};
use tracing::debug;

use crate::error::{check_dim, StageError};
use crate::loader::Loader;
use crate::pipeline::Pipeline;
use crate::sampler::Sampler;
use crate::{Conditioner, Interceptor, Penalizer};

/// A sampler and the pipeline that encodes its rows.
pub struct Connector {
    sampler: Box<dyn Sampler>,
    pipeline: Pipeline,
}

impl Connector {
    /// Fails unless the sampler's raw width is what the pipeline loads.
    pub fn new(sampler: Box<dyn Sampler>, pipeline: Pipeline) -> Result<Self, StageError> {
        check_dim("connector samples", pipeline.samples(), sampler.outputs())?;
        debug!(
            samples = %pipeline.samples(),
            conditions = %pipeline.conditions(),
            intermediates = %pipeline.intermediates(),
            outputs = %pipeline.outputs(),
            "built connector"
        );
        Ok(Self { sampler, pipeline })
    }

    /// Connect four explicit stages.
    pub fn composed(
        sampler: Box<dyn Sampler>,
        conditioner: Box<dyn Conditioner>,
        interceptor: Box<dyn Interceptor>,
        penalizer: Box<dyn Penalizer>,
        loader: Box<dyn Loader>,
    ) -> Result<Self, StageError> {
        Self::new(
            sampler,
            Pipeline::new(conditioner, interceptor, penalizer, loader)?,
        )
    }

    /// Unconditioned connector around a single loader.
    pub fn direct(sampler: Box<dyn Sampler>, loader: Box<dyn Loader>) -> Result<Self, StageError> {
        Self::new(sampler, Pipeline::direct(loader)?)
    }

    /// Connect several pipelines laid side by side.
    pub fn joint(
        sampler: Box<dyn Sampler>,
        conditions: usize,
        intermediates: usize,
        outputs: usize,
        parts: Vec<Pipeline>,
    ) -> Result<Self, StageError> {
        Self::new(
            sampler,
            Pipeline::joint(conditions, intermediates, outputs, parts)?,
        )
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    pub fn samples(&self) -> Dim {
        self.pipeline.samples()
    }

    pub fn conditions(&self) -> Dim {
        self.pipeline.conditions()
    }

    pub fn intermediates(&self) -> Dim {
        self.pipeline.intermediates()
    }

    pub fn outputs(&self) -> Dim {
        self.pipeline.outputs()
    }

    pub fn decoded(&self) -> Dim {
        self.pipeline.decoded()
    }

    /// Draw `batch` training rows, encoded.
    pub fn sample(&mut self, batch: usize) -> Result<Matrix, StageError> {
        let raw = self.sampler.sample(batch)?;
        self.pipeline.load(&raw)
    }

    pub fn condition(&mut self, data: &Matrix) -> Result<Matrix, StageError> {
        self.pipeline.condition(data)
    }

    pub fn prepare(&self, condition: &Matrix, intermediate: &Matrix) -> Result<Matrix, StageError> {
        self.pipeline.prepare(condition, intermediate)
    }

    pub fn loss(&self, condition: &Matrix, intermediate: &Matrix) -> Result<Matrix, StageError> {
        self.pipeline.loss(condition, intermediate)
    }

    /// Decode discriminable data back to raw columns.
    pub fn unload(&self, data: &Matrix) -> Result<Matrix, StageError> {
        self.pipeline.unload(data)
    }

    pub fn accumulate(&mut self, grads: &Gradients) -> Result<(), StageError> {
        self.pipeline.accumulate(grads)
    }

    pub fn update(&mut self) -> Result<(), StageError> {
        self.pipeline.update()
    }

    pub fn restart(&mut self) {
        self.sampler.restart();
    }

    /// The held-out rows, encoded with the current loader state.
    pub fn holdout(&self) -> Result<Matrix, StageError> {
        self.pipeline.load(self.sampler.holdout())
    }

    pub fn holdout_raw(&self) -> &Matrix {
        self.sampler.holdout()
    }

    pub fn move_to(&mut self, device: &Device) -> Result<(), StageError> {
        self.sampler.move_to(device)?;
        self.pipeline.move_to(device)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::DirectLoader;
    use crate::sampler::{RandomSampler, SamplerConfig};

    fn sampler(cols: usize) -> Box<dyn Sampler> {
        let rows: Vec<Vec<f32>> = (0..10).map(|i| vec![i as f32; cols]).collect();
        let data = Matrix::from_rows(&rows, cols, &Device::Cpu).unwrap();
        let config = SamplerConfig {
            seed: Some(7),
            ..SamplerConfig::default()
        };
        Box::new(RandomSampler::new(&data, &config).unwrap())
    }

    #[test]
    fn test_direct_passes_rows_through() {
        let mut connector = Connector::direct(sampler(2), Box::new(DirectLoader::identity(2))).unwrap();
        assert_eq!(connector.conditions(), Dim::ZERO);
        let batch = connector.sample(4).unwrap();
        assert_eq!(batch.shape().dims(), (4, 2));
        let condition = connector.condition(&batch).unwrap();
        assert_eq!(condition.shape().dims(), (4, 0));
        assert_eq!(connector.holdout().unwrap().shape().dims(), (2, 2));
    }

    #[test]
    fn test_sampler_width_must_match() {
        let result = Connector::direct(sampler(3), Box::new(DirectLoader::identity(2)));
        assert!(matches!(result, Err(StageError::DimensionMismatch { .. })));
    }
}
