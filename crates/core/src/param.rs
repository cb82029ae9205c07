//! # Parameters and Gradients
//!
//! Stages that learn (random-effect loaders) own their parameter matrices.
//! Gradient computation belongs to the tensor substrate: a backward pass
//! fills a [`Gradients`] store, stages copy their share into their own
//! buffer with [`Parameter::accumulate`], and `update()` later consumes and
//! clears that buffer.

use std::fmt;

use candle_core::backprop::GradStore;
use candle_core::{Device, Tensor, Var};

use crate::error::CoreError;
use crate::matrix::Matrix;
use crate::shape::Shape;

/// Gradients produced by one backward pass.
pub struct Gradients(GradStore);

impl Gradients {
    /// Gradient for a tracked tensor, if it took part in the pass.
    pub fn get(&self, tensor: &Tensor) -> Option<&Tensor> {
        self.0.get(tensor)
    }

    pub fn store(&self) -> &GradStore {
        &self.0
    }
}

impl From<GradStore> for Gradients {
    fn from(store: GradStore) -> Self {
        Self(store)
    }
}

impl fmt::Debug for Gradients {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Gradients").finish_non_exhaustive()
    }
}

/// A learnable matrix with its own gradient buffer.
#[derive(Debug)]
pub struct Parameter {
    var: Var,
    shape: Shape,
    grad: Option<Matrix>,
}

impl Parameter {
    pub fn from_matrix(value: &Matrix) -> Result<Self, CoreError> {
        Ok(Self {
            var: Var::from_tensor(&value.detach().into_tensor())?,
            shape: value.shape(),
            grad: None,
        })
    }

    /// Standard normal initialization.
    pub fn randn(shape: impl Into<Shape>, device: &Device) -> Result<Self, CoreError> {
        Self::from_matrix(&Matrix::randn(shape, device)?)
    }

    pub fn shape(&self) -> Shape {
        self.shape
    }

    /// The tracked value; operations on it feed gradients back here.
    pub fn value(&self) -> Result<Matrix, CoreError> {
        Matrix::new(self.var.as_tensor().clone(), self.shape)
    }

    /// Add this parameter's gradient from `grads` into the buffer.
    ///
    /// Returns whether the pass touched the parameter at all.
    pub fn accumulate(&mut self, grads: &Gradients) -> Result<bool, CoreError> {
        let Some(grad) = grads.get(self.var.as_tensor()) else {
            return Ok(false);
        };
        let grad = Matrix::new(grad.detach(), self.shape)?;
        self.grad = Some(match self.grad.take() {
            Some(prev) => prev.add(&grad)?,
            None => grad,
        });
        Ok(true)
    }

    pub fn gradient(&self) -> Option<&Matrix> {
        self.grad.as_ref()
    }

    /// Drain the gradient buffer.
    pub fn take_gradient(&mut self) -> Option<Matrix> {
        self.grad.take()
    }

    /// Overwrite the value in place.
    pub fn set(&mut self, value: &Matrix) -> Result<(), CoreError> {
        value.expect_shape(self.shape)?;
        self.var.set(&value.detach().into_tensor())?;
        Ok(())
    }

    /// Re-home on `device`. The gradient buffer is dropped.
    pub fn move_to(&mut self, device: &Device) -> Result<(), CoreError> {
        let moved = self.value()?.move_to(device)?;
        self.var = Var::from_tensor(&moved.detach().into_tensor())?;
        self.grad = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accumulate_sums_passes() {
        let device = Device::Cpu;
        let mut p = Parameter::from_matrix(&Matrix::ones((1, 2), &device).unwrap()).unwrap();
        for _ in 0..2 {
            let loss = p.value().unwrap().sum_all().unwrap();
            let grads = loss.backward().unwrap();
            assert!(p.accumulate(&grads).unwrap());
        }
        let grad = p.take_gradient().unwrap();
        assert_eq!(grad.to_rows().unwrap(), vec![vec![2.0, 2.0]]);
        assert!(p.gradient().is_none());
    }

    #[test]
    fn test_untouched_parameter_has_no_gradient() {
        let device = Device::Cpu;
        let mut p = Parameter::randn((2, 2), &device).unwrap();
        let other = Parameter::randn((1, 1), &device).unwrap();
        let grads = other.value().unwrap().sum_all().unwrap().backward().unwrap();
        assert!(!p.accumulate(&grads).unwrap());
        assert!(p.gradient().is_none());
    }

    #[test]
    fn test_set_checks_shape() {
        let device = Device::Cpu;
        let mut p = Parameter::randn((2, 2), &device).unwrap();
        assert!(p.set(&Matrix::zeros((2, 3), &device).unwrap()).is_err());
        p.set(&Matrix::zeros((2, 2), &device).unwrap()).unwrap();
        assert_eq!(p.value().unwrap().sum_all().unwrap().scalar().unwrap(), 0.0);
    }
}
