//! Feed-forward generator with a step learning-rate schedule.

use candle_nn::{AdamW, Optimizer, ParamsAdamW};
use serde::{Deserialize, Serialize};
use tabgan_core::{Axis, Device, Dim, Gradients, Matrix};
use tracing::debug;

use super::layer::{Activation, Plan, Stack};
use crate::error::TrainError;
use crate::model::Generator;

/// Shape and optimizer settings of a [`SequentialGenerator`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    pub conditions: usize,
    pub latents: usize,
    pub intermediates: usize,
    /// Hidden layer widths.
    pub steps: Vec<usize>,
    pub learning: f64,
    /// Learning rate multiplier applied every `step` updates.
    pub gamma: f64,
    pub step: usize,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            conditions: 0,
            latents: 0,
            intermediates: 0,
            steps: Vec::new(),
            learning: 0.1,
            gamma: 0.99,
            step: 100,
        }
    }
}

/// `[condition | noise]` through ReLU hidden layers to a sigmoid output.
pub struct SequentialGenerator {
    config: GeneratorConfig,
    stack: Stack,
    optimizer: AdamW,
    updates: usize,
}

impl SequentialGenerator {
    pub fn new(config: GeneratorConfig, device: &Device) -> Result<Self, TrainError> {
        if config.latents == 0 || config.intermediates == 0 {
            return Err(TrainError::config(
                "generator needs latent inputs and intermediate outputs",
            ));
        }
        if config.step == 0 {
            return Err(TrainError::config("schedule step must be positive"));
        }
        let stack = Stack::new(
            Plan {
                inputs: config.conditions + config.latents,
                steps: config.steps.clone(),
                outputs: config.intermediates,
                hidden: Activation::Relu,
                finish: Activation::Sigmoid,
                dropout: 0.0,
            },
            device,
        )?;
        let optimizer = Self::optimizer(&config, &stack)?;
        Ok(Self {
            config,
            stack,
            optimizer,
            updates: 0,
        })
    }

    fn optimizer(config: &GeneratorConfig, stack: &Stack) -> Result<AdamW, TrainError> {
        let params = ParamsAdamW {
            lr: config.learning,
            weight_decay: 0.0,
            ..ParamsAdamW::default()
        };
        Ok(AdamW::new(stack.vars(), params)?)
    }

    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }
}

impl Generator for SequentialGenerator {
    fn conditions(&self) -> Dim {
        Dim::new(self.config.conditions)
    }

    fn latents(&self) -> Dim {
        Dim::new(self.config.latents)
    }

    fn intermediates(&self) -> Dim {
        Dim::new(self.config.intermediates)
    }

    fn sample(&self, condition: &Matrix) -> Result<Matrix, TrainError> {
        condition.expect_cols(self.conditions())?;
        let n = condition.rows().get();
        let noise = Matrix::randn((n, self.config.latents), self.stack.device())?;
        let inputs = Matrix::cat(
            &[condition, &noise],
            Axis::Cols,
            (n, self.config.conditions + self.config.latents),
        )?;
        self.stack.forward(&inputs)
    }

    fn update(&mut self, loss: &Matrix) -> Result<Gradients, TrainError> {
        let grads = loss.backward()?;
        self.optimizer.step(grads.store())?;
        self.updates += 1;
        if self.updates % self.config.step == 0 {
            let decays = (self.updates / self.config.step) as i32;
            self.optimizer
                .set_learning_rate(self.config.learning * self.config.gamma.powi(decays));
        }
        Ok(grads)
    }

    fn reset(&mut self) -> Result<(), TrainError> {
        self.stack.reset()?;
        self.optimizer = Self::optimizer(&self.config, &self.stack)?;
        Ok(())
    }

    fn restart(&mut self) -> Result<(), TrainError> {
        self.optimizer = Self::optimizer(&self.config, &self.stack)?;
        self.updates = 0;
        debug!(rate = self.config.learning, "generator optimizer restarted");
        Ok(())
    }

    fn move_to(&mut self, device: &Device) -> Result<(), TrainError> {
        self.stack.move_to(device)?;
        self.optimizer = Self::optimizer(&self.config, &self.stack)?;
        Ok(())
    }

    fn train(&mut self, mode: bool) {
        self.stack.train(mode);
    }

    fn rate(&self) -> f64 {
        self.optimizer.learning_rate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn generator(step: usize) -> SequentialGenerator {
        let config = GeneratorConfig {
            conditions: 2,
            latents: 3,
            intermediates: 4,
            steps: vec![8],
            step,
            ..GeneratorConfig::default()
        };
        SequentialGenerator::new(config, &Device::Cpu).unwrap()
    }

    #[test]
    fn test_sample_shape_and_range() {
        let gen = generator(100);
        let condition = Matrix::zeros((6, 2), &Device::Cpu).unwrap();
        let out = gen.sample(&condition).unwrap();
        assert_eq!(out.shape().dims(), (6, 4));
        assert!(gen.sample(&Matrix::zeros((6, 3), &Device::Cpu).unwrap()).is_err());
    }

    #[test]
    fn test_schedule_decays_rate() {
        let mut gen = generator(2);
        let condition = Matrix::zeros((4, 2), &Device::Cpu).unwrap();
        for _ in 0..4 {
            let loss = gen.sample(&condition).unwrap().sum_all().unwrap();
            gen.update(&loss).unwrap();
        }
        assert_relative_eq!(gen.rate(), 0.1 * 0.99 * 0.99, epsilon = 1e-12);

        gen.restart().unwrap();
        assert_relative_eq!(gen.rate(), 0.1, epsilon = 1e-12);
    }

    #[test]
    fn test_config_defaults_from_json() {
        let config: GeneratorConfig =
            serde_json::from_str(r#"{"conditions": 1, "latents": 2, "intermediates": 3}"#).unwrap();
        assert_eq!(config.step, 100);
        assert_relative_eq!(config.gamma, 0.99);
        assert!(config.steps.is_empty());
    }
}
