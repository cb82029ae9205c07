//! Feed-forward discriminator scored with binary cross entropy on logits.

use candle_nn::{AdamW, Optimizer, ParamsAdamW};
use serde::{Deserialize, Serialize};
use tabgan_core::{Axis, Device, Dim, Gradients, Matrix, Shape};

use super::layer::{Activation, Plan, Stack};
use crate::error::TrainError;
use crate::model::Discriminator;

/// Shape and optimizer settings of a [`StandardDiscriminator`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscriminatorConfig {
    pub conditions: usize,
    pub outputs: usize,
    /// Hidden layer widths.
    pub steps: Vec<usize>,
    pub learning: f64,
    pub weight_decay: f64,
    /// Dropout after every hidden layer; zero disables it.
    pub dropout: f32,
}

impl Default for DiscriminatorConfig {
    fn default() -> Self {
        Self {
            conditions: 0,
            outputs: 0,
            steps: Vec::new(),
            learning: 0.001,
            weight_decay: 0.01,
            dropout: 0.0,
        }
    }
}

/// `[condition | data]` through ReLU hidden layers to one logit.
pub struct StandardDiscriminator {
    config: DiscriminatorConfig,
    stack: Stack,
    optimizer: AdamW,
}

impl StandardDiscriminator {
    pub fn new(config: DiscriminatorConfig, device: &Device) -> Result<Self, TrainError> {
        if config.outputs == 0 {
            return Err(TrainError::config("discriminator needs data columns"));
        }
        let stack = Stack::new(
            Plan {
                inputs: config.conditions + config.outputs,
                steps: config.steps.clone(),
                outputs: 1,
                hidden: Activation::Relu,
                finish: Activation::Identity,
                dropout: config.dropout,
            },
            device,
        )?;
        let optimizer = Self::optimizer(&config, &stack)?;
        Ok(Self {
            config,
            stack,
            optimizer,
        })
    }

    fn optimizer(config: &DiscriminatorConfig, stack: &Stack) -> Result<AdamW, TrainError> {
        let params = ParamsAdamW {
            lr: config.learning,
            weight_decay: config.weight_decay,
            ..ParamsAdamW::default()
        };
        Ok(AdamW::new(stack.vars(), params)?)
    }

    pub fn config(&self) -> &DiscriminatorConfig {
        &self.config
    }
}

/// Mean of `max(x, 0) - x * t + ln(1 + e^{-|x|})` over all rows.
pub fn binary_cross_entropy(logits: &Matrix, target: &Matrix) -> Result<Matrix, TrainError> {
    target.expect_shape(logits.shape())?;
    let n = logits.rows().get();
    if n == 0 {
        return Ok(Matrix::zeros(Shape::scalar(), logits.device())?);
    }
    let softplus = logits.abs()?.affine(-1.0, 0.0)?.exp()?.affine(1.0, 1.0)?.log()?;
    let terms = logits.relu()?.sub(&logits.mul(target)?)?.add(&softplus)?;
    Ok(terms.sum_all()?.affine(1.0 / n as f64, 0.0)?)
}

impl Discriminator for StandardDiscriminator {
    fn conditions(&self) -> Dim {
        Dim::new(self.config.conditions)
    }

    fn outputs(&self) -> Dim {
        Dim::new(self.config.outputs)
    }

    fn predict(&self, condition: &Matrix, data: &Matrix) -> Result<Matrix, TrainError> {
        condition.expect_cols(self.conditions())?;
        data.expect_shape((condition.rows().get(), self.config.outputs))?;
        let inputs = Matrix::cat(
            &[condition, data],
            Axis::Cols,
            (data.rows().get(), self.config.conditions + self.config.outputs),
        )?;
        self.stack.forward(&inputs)
    }

    fn loss(
        &self,
        condition: &Matrix,
        data: &Matrix,
        target: &Matrix,
    ) -> Result<Matrix, TrainError> {
        binary_cross_entropy(&self.predict(condition, data)?, target)
    }

    fn step(
        &mut self,
        condition: &Matrix,
        data: &Matrix,
        target: &Matrix,
    ) -> Result<(Matrix, Gradients), TrainError> {
        let loss = self.loss(condition, data, target)?;
        let grads = loss.backward()?;
        self.optimizer.step(grads.store())?;
        Ok((loss, grads))
    }

    fn reset(&mut self) -> Result<(), TrainError> {
        self.stack.reset()?;
        self.optimizer = Self::optimizer(&self.config, &self.stack)?;
        Ok(())
    }

    fn restart(&mut self) -> Result<(), TrainError> {
        self.optimizer = Self::optimizer(&self.config, &self.stack)?;
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
    use std::f32::consts::LN_2;

    fn column(values: &[f32]) -> Matrix {
        let rows: Vec<Vec<f32>> = values.iter().map(|&v| vec![v]).collect();
        Matrix::from_rows(&rows, 1, &Device::Cpu).unwrap()
    }

    #[test]
    fn test_bce_at_zero_logit_is_ln2() {
        let loss = binary_cross_entropy(&column(&[0.0, 0.0]), &column(&[1.0, 0.0])).unwrap();
        assert_relative_eq!(loss.scalar().unwrap(), LN_2, epsilon = 1e-6);
    }

    #[test]
    fn test_bce_is_stable_for_large_logits() {
        let loss = binary_cross_entropy(&column(&[80.0, -80.0]), &column(&[1.0, 0.0])).unwrap();
        let value = loss.scalar().unwrap();
        assert!(value.is_finite());
        assert!(value < 1e-6);
    }

    #[test]
    fn test_step_lowers_loss_on_separable_data() {
        let config = DiscriminatorConfig {
            conditions: 0,
            outputs: 1,
            steps: vec![8],
            learning: 0.05,
            ..DiscriminatorConfig::default()
        };
        let mut disc = StandardDiscriminator::new(config, &Device::Cpu).unwrap();
        let condition = Matrix::zeros((4, 0), &Device::Cpu).unwrap();
        let data = column(&[2.0, 1.5, -1.5, -2.0]);
        let target = column(&[1.0, 1.0, 0.0, 0.0]);
        let first = disc.loss(&condition, &data, &target).unwrap().scalar().unwrap();
        for _ in 0..200 {
            disc.step(&condition, &data, &target).unwrap();
        }
        let last = disc.loss(&condition, &data, &target).unwrap().scalar().unwrap();
        assert!(last < first);
    }
}
