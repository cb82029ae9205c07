//! Layers and the layer stack shared by the reference models.

use candle_core::{DType, Var};
use candle_nn::{linear, Linear, Module, VarBuilder, VarMap};
use tabgan_core::{Device, Dim, Matrix};

use crate::error::TrainError;
use crate::model::Layer;

/// Elementwise function applied after a linear map.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Activation {
    Identity,
    Relu,
    Sigmoid,
}

impl Activation {
    fn apply(self, data: Matrix) -> Result<Matrix, TrainError> {
        Ok(match self {
            Self::Identity => data,
            Self::Relu => data.relu()?,
            Self::Sigmoid => {
                let shape = data.shape();
                Matrix::new(candle_nn::ops::sigmoid(data.tensor())?, shape)?
            }
        })
    }
}

/// Affine map followed by an activation.
#[derive(Debug, Clone)]
pub struct LinearLayer {
    linear: Linear,
    inputs: Dim,
    outputs: Dim,
    activation: Activation,
}

impl LinearLayer {
    /// Weights are created (or looked up) under `vb`.
    pub fn new(
        inputs: usize,
        outputs: usize,
        activation: Activation,
        vb: VarBuilder,
    ) -> Result<Self, TrainError> {
        Ok(Self {
            linear: linear(inputs, outputs, vb)?,
            inputs: Dim::new(inputs),
            outputs: Dim::new(outputs),
            activation,
        })
    }
}

impl Layer for LinearLayer {
    fn inputs(&self) -> Dim {
        self.inputs
    }

    fn outputs(&self) -> Dim {
        self.outputs
    }

    fn forward(&self, data: &Matrix) -> Result<Matrix, TrainError> {
        data.expect_cols(self.inputs)?;
        let mapped = Matrix::new(
            self.linear.forward(data.tensor())?,
            (data.rows().get(), self.outputs.get()),
        )?;
        self.activation.apply(mapped)
    }
}

/// Zeroes entries with probability `rate` while training; identity otherwise.
#[derive(Debug, Clone)]
pub struct DropoutLayer {
    width: Dim,
    rate: f32,
    training: bool,
}

impl DropoutLayer {
    pub fn new(width: usize, rate: f32) -> Result<Self, TrainError> {
        if !(0.0..1.0).contains(&rate) {
            return Err(TrainError::config(format!(
                "dropout rate must lie in [0, 1), got {rate}"
            )));
        }
        Ok(Self {
            width: Dim::new(width),
            rate,
            training: true,
        })
    }
}

impl Layer for DropoutLayer {
    fn inputs(&self) -> Dim {
        self.width
    }

    fn outputs(&self) -> Dim {
        self.width
    }

    fn forward(&self, data: &Matrix) -> Result<Matrix, TrainError> {
        data.expect_cols(self.width)?;
        if !self.training || self.rate == 0.0 {
            return Ok(data.clone());
        }
        let dropped = candle_nn::ops::dropout(data.tensor(), self.rate)?;
        Ok(Matrix::new(dropped, data.shape())?)
    }

    fn train(&mut self, mode: bool) {
        self.training = mode;
    }
}

// ============================================================================
// Stack
// ============================================================================

/// Widths and activations of a feed-forward stack.
#[derive(Debug, Clone)]
pub(crate) struct Plan {
    pub inputs: usize,
    pub steps: Vec<usize>,
    pub outputs: usize,
    pub hidden: Activation,
    pub finish: Activation,
    pub dropout: f32,
}

/// A feed-forward stack whose weights live in one [`VarMap`].
pub(crate) struct Stack {
    plan: Plan,
    varmap: VarMap,
    device: Device,
    layers: Vec<Box<dyn Layer>>,
    training: bool,
}

impl Stack {
    pub fn new(plan: Plan, device: &Device) -> Result<Self, TrainError> {
        let varmap = VarMap::new();
        let layers = Self::build(&plan, &varmap, device)?;
        Ok(Self {
            plan,
            varmap,
            device: device.clone(),
            layers,
            training: true,
        })
    }

    /// Layers over `varmap`. Existing variables are reused by name.
    fn build(plan: &Plan, varmap: &VarMap, device: &Device) -> Result<Vec<Box<dyn Layer>>, TrainError> {
        let vb = VarBuilder::from_varmap(varmap, DType::F32, device);
        let mut layers: Vec<Box<dyn Layer>> = Vec::with_capacity(2 * plan.steps.len() + 1);
        let mut width = plan.inputs;
        for (i, &step) in plan.steps.iter().enumerate() {
            layers.push(Box::new(LinearLayer::new(
                width,
                step,
                plan.hidden,
                vb.pp(format!("hidden{i}")),
            )?));
            if plan.dropout > 0.0 {
                layers.push(Box::new(DropoutLayer::new(step, plan.dropout)?));
            }
            width = step;
        }
        layers.push(Box::new(LinearLayer::new(
            width,
            plan.outputs,
            plan.finish,
            vb.pp("finish"),
        )?));
        Ok(layers)
    }

    pub fn device(&self) -> &Device {
        &self.device
    }

    pub fn vars(&self) -> Vec<Var> {
        self.varmap.all_vars()
    }

    pub fn forward(&self, data: &Matrix) -> Result<Matrix, TrainError> {
        let mut current = data.clone();
        for layer in &self.layers {
            current = layer.forward(&current)?;
        }
        Ok(current)
    }

    /// Fresh weights, same plan and device.
    pub fn reset(&mut self) -> Result<(), TrainError> {
        self.varmap = VarMap::new();
        self.layers = Self::build(&self.plan, &self.varmap, &self.device)?;
        self.train(self.training);
        Ok(())
    }

    /// Copy every weight to `device` and rebuild the layers over the copies.
    pub fn move_to(&mut self, device: &Device) -> Result<(), TrainError> {
        {
            let mut data = self
                .varmap
                .data()
                .lock()
                .map_err(|_| TrainError::config("variable map lock poisoned"))?;
            for var in data.values_mut() {
                *var = Var::from_tensor(&var.as_tensor().to_device(device)?)?;
            }
        }
        self.device = device.clone();
        self.layers = Self::build(&self.plan, &self.varmap, &self.device)?;
        self.train(self.training);
        Ok(())
    }

    pub fn train(&mut self, mode: bool) {
        self.training = mode;
        for layer in &mut self.layers {
            layer.train(mode);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plan(dropout: f32) -> Plan {
        Plan {
            inputs: 3,
            steps: vec![8, 4],
            outputs: 2,
            hidden: Activation::Relu,
            finish: Activation::Sigmoid,
            dropout,
        }
    }

    #[test]
    fn test_stack_widths() {
        let stack = Stack::new(plan(0.0), &Device::Cpu).unwrap();
        let out = stack.forward(&Matrix::randn((5, 3), &Device::Cpu).unwrap()).unwrap();
        assert_eq!(out.shape().dims(), (5, 2));
        for row in out.to_rows().unwrap() {
            assert!(row.iter().all(|v| (0.0..=1.0).contains(v)));
        }
        // Three linear layers, weight and bias each.
        assert_eq!(stack.vars().len(), 6);
    }

    #[test]
    fn test_reset_changes_weights() {
        let mut stack = Stack::new(plan(0.0), &Device::Cpu).unwrap();
        let input = Matrix::randn((4, 3), &Device::Cpu).unwrap();
        let before = stack.forward(&input).unwrap().to_rows().unwrap();
        stack.reset().unwrap();
        assert_ne!(stack.forward(&input).unwrap().to_rows().unwrap(), before);
    }

    #[test]
    fn test_move_keeps_weights() {
        let mut stack = Stack::new(plan(0.0), &Device::Cpu).unwrap();
        let input = Matrix::randn((4, 3), &Device::Cpu).unwrap();
        let before = stack.forward(&input).unwrap().to_rows().unwrap();
        stack.move_to(&Device::Cpu).unwrap();
        assert_eq!(stack.forward(&input).unwrap().to_rows().unwrap(), before);
    }

    #[test]
    fn test_dropout_is_identity_in_eval() {
        let mut dropout = DropoutLayer::new(4, 0.5).unwrap();
        dropout.train(false);
        let input = Matrix::ones((3, 4), &Device::Cpu).unwrap();
        assert_eq!(
            dropout.forward(&input).unwrap().to_rows().unwrap(),
            input.to_rows().unwrap()
        );
        assert!(DropoutLayer::new(4, 1.0).is_err());
    }
}
